// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Test utilities for the business layer.

use crate::db;
use crate::driver::Driver;
use crud_core::clocks::testutils::SettableClock;
use crud_core::db::sqlite::SqliteDb;
use crud_core::db::{Db, Executor};
use std::sync::Arc;
use time::macros::datetime;

/// State of a running test.
pub(crate) struct TestContext {
    /// The database backing the driver.
    db: Arc<dyn Db + Send + Sync>,

    /// The clock backing the driver, which tests can adjust at will.
    clock: Arc<SettableClock>,

    /// The driver under test.
    driver: Driver,
}

impl TestContext {
    /// Initializes the driver using an in-memory database and a settable clock.
    pub(crate) async fn setup() -> Self {
        Self::setup_with_db(crud_core::db::sqlite::testutils::setup().await).await
    }

    /// Initializes the driver using an in-memory database whose pool holds at most
    /// `max_connections` connections.
    pub(crate) async fn setup_with_max_connections(max_connections: u32) -> Self {
        let db = crud_core::db::sqlite::testutils::setup_with_max_connections(max_connections);
        Self::setup_with_db(db.await).await
    }

    /// Initializes the schema in `db` and builds a driver on top of it.
    async fn setup_with_db(db: SqliteDb) -> Self {
        let db: Arc<dyn Db + Send + Sync> = Arc::new(db);
        db::init_schema(&mut db.ex().await.unwrap()).await.unwrap();
        let clock = Arc::new(SettableClock::new(datetime!(2024-03-15 12:00:00 UTC)));
        let driver = Driver::new(db.clone(), clock.clone());
        Self { db, clock, driver }
    }

    /// Gets a direct executor against the database.
    pub(crate) async fn ex(&self) -> Executor {
        self.db.ex().await.unwrap()
    }

    /// Gets the clock used by the driver.
    pub(crate) fn clock(&self) -> &SettableClock {
        &self.clock
    }

    /// Gets a copy of the driver in this test context.
    pub(crate) fn driver(&self) -> Driver {
        self.driver.clone()
    }

    /// Makes every further operation fail by dropping the resources table.
    pub(crate) async fn break_storage(&self) {
        match self.ex().await {
            Executor::Sqlite(mut ex) => {
                sqlx::query("DROP TABLE resources").execute(ex.conn()).await.unwrap();
            }
            #[allow(unused)]
            _ => unreachable!(),
        }
    }
}

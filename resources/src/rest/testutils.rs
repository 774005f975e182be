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

//! Test utilities for the REST API.

use crate::db;
use crate::driver::Driver;
use crate::model::*;
use crate::rest::app;
use axum::Router;
use crud_core::clocks::testutils::SettableClock;
use crud_core::clocks::Clock;
use crud_core::db::{Db, DbError, Executor};
use std::sync::Arc;
use time::macros::datetime;
use time::OffsetDateTime;

/// State of a running test.
pub(crate) struct TestContext {
    /// The database backing the app.
    db: Arc<dyn Db + Send + Sync>,

    /// The clock backing the app.
    clock: Arc<SettableClock>,

    /// The app under test.
    app: Router,
}

impl TestContext {
    /// Initializes the app using an in-memory database and a settable clock.
    pub(crate) async fn setup() -> Self {
        let db: Arc<dyn Db + Send + Sync> =
            Arc::new(crud_core::db::sqlite::testutils::setup().await);
        db::init_schema(&mut db.ex().await.unwrap()).await.unwrap();
        let clock = Arc::new(SettableClock::new(datetime!(2024-03-15 12:00:00 UTC)));
        let app = app(Driver::new(db.clone(), clock.clone()));
        Self { db, clock, app }
    }

    /// Gets a clone of the app router.
    pub(crate) fn app(&self) -> Router {
        self.app.clone()
    }

    /// Consumes the context and transforms it into the app router.
    pub(crate) fn into_app(self) -> Router {
        self.app
    }

    /// Returns the current time of the clock that backs the app.
    pub(crate) fn now(&self) -> OffsetDateTime {
        self.clock.now_utc()
    }

    /// Gets the clock that backs the app.
    pub(crate) fn clock(&self) -> &SettableClock {
        &self.clock
    }

    /// Creates a resource by directly modifying the backing database.
    pub(crate) async fn create_resource(
        &self,
        name: &'static str,
        description: Option<&'static str>,
    ) -> Resource {
        let description = description.map(|d| ResourceDescription::new(d).unwrap());
        db::create_resource(
            &mut self.db.ex().await.unwrap(),
            &ResourceName::from(name),
            description.as_ref(),
            self.now(),
        )
        .await
        .unwrap()
    }

    /// Drops the resources table so that every later database operation fails.
    pub(crate) async fn break_storage(&self) {
        match self.db.ex().await.unwrap() {
            Executor::Sqlite(mut ex) => {
                sqlx::query("DROP TABLE resources").execute(ex.conn()).await.unwrap();
            }
            #[allow(unused)]
            _ => unreachable!(),
        }
    }

    /// Gets the resource identified by `id` by directly querying the backing database.
    pub(crate) async fn get_resource(&self, id: ResourceId) -> Option<Resource> {
        match db::get_resource(&mut self.db.ex().await.unwrap(), id).await {
            Ok(resource) => Some(resource),
            Err(DbError::NotFound) => None,
            Err(e) => panic!("{:?}", e),
        }
    }
}

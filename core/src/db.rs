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

//! Backend-independent access to the database.
//!
//! Services run against PostgreSQL in production and against in-memory SQLite in tests.  Each
//! backend lives in its own module behind a feature of the same name.

use crate::model::ModelError;
use async_trait::async_trait;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Failures of the persistence layer.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DbError {
    /// The database returned something unexpected or could not run the query.
    #[error("Database error: {0}")]
    BackendError(String),

    /// Data read back from the database does not satisfy the invariants of the model.
    #[error("Data integrity error: {0}")]
    DataIntegrityError(String),

    /// The requested row does not exist.
    #[error("Not found")]
    NotFound,

    /// No connection could be obtained, typically because the pool or the server is saturated.
    #[error("Unavailable")]
    Unavailable,
}

impl From<ModelError> for DbError {
    fn from(e: ModelError) -> Self {
        DbError::DataIntegrityError(e.to_string())
    }
}

/// Result type for this module.
pub type DbResult<T> = Result<T, DbError>;

/// A connection to one of the supported backends.
///
/// Query functions match on the variant and call `conn()` on it to get a connection of the
/// concrete type that sqlx needs, issuing SQL written for that backend.  The connection may be
/// inside an open transaction.
#[derive(Debug)]
pub enum Executor {
    /// Connection to the production PostgreSQL server.
    #[cfg(feature = "postgres")]
    Postgres(postgres::PostgresExecutor),

    /// Connection to an SQLite database.
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite::SqliteExecutor),
}

/// An `Executor` inside a transaction that rolls back on drop unless committed.
pub struct TxExecutor(Executor);

impl TxExecutor {
    /// Gets the executor to issue queries within the transaction.
    pub fn ex(&mut self) -> &mut Executor {
        &mut self.0
    }

    /// Commits the transaction, consuming it.
    pub async fn commit(self) -> DbResult<()> {
        match self.0 {
            #[cfg(feature = "postgres")]
            Executor::Postgres(e) => e.commit().await,

            #[cfg(feature = "sqlite")]
            Executor::Sqlite(e) => e.commit().await,
        }
    }
}

/// A pool of connections to one of the supported backends.
#[async_trait]
pub trait Db {
    /// Checks out a connection outside of any transaction.  It returns to the pool on drop.
    async fn ex(&self) -> DbResult<Executor>;

    /// Opens a transaction on a connection of its own.
    async fn begin(&self) -> DbResult<TxExecutor>;

    /// Closes the pool once every checked-out connection has come back.
    async fn close(&self);
}

/// Splits a `schema` made of multiple `;`-separated statements into the individual statements,
/// discarding `--` comments and blank chunks.
#[cfg(any(feature = "postgres", feature = "sqlite"))]
pub(crate) fn split_schema(schema: &str) -> Vec<String> {
    let comments = regex::RegexBuilder::new("--.*$")
        .multi_line(true)
        .build()
        .expect("Hardcoded regex must be valid");
    comments
        .replace_all(schema, "")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Macros to help instantiate tests for multiple database systems.
#[cfg(any(test, feature = "testutils"))]
pub mod testutils {
    pub use paste::paste;

    /// Instantiates the `module::name` test for the database configured by `setup`.
    ///
    /// The `extra` metadata parameter can be used to tag the generated tests.
    #[macro_export]
    macro_rules! generate_one_test [
        ( $name:ident, $setup:expr, $module:path $(, #[$extra:meta] )? ) => {
            #[tokio::test]
            $(#[$extra])?
            async fn $name() {
                $crate::db::testutils::paste! {
                    $module :: [< $name >]($setup).await;
                }
            }
        }
    ];

    pub use generate_one_test;

    /// Instantiates a collection of tests for a specific database system.
    ///
    /// The database implementation to run the tests against is determined by the `setup`
    /// expression, which needs to return an `Arc<dyn Db + Send + Sync>`.  The returned database
    /// should also have been initialized with the desired schema.
    ///
    /// The `extra` metadata parameter can be used to tag the generated tests.
    #[macro_export]
    macro_rules! generate_tests [
        ( #[$extra:meta], $setup:expr, $module:path $(, $name:ident)+ ) => {
            $(
                $crate::db::testutils::generate_one_test!($name, $setup, $module, #[$extra]);
            )+
        };

        ( $setup:expr, $module:path $(, $name:ident)+ ) => {
            $(
                $crate::db::testutils::generate_one_test!($name, $setup, $module);
            )+
        };
    ];

    pub use generate_tests;
}

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

//! SQLite backend, used to run tests against in-memory databases.

use crate::db::{split_schema, Db, DbError, DbResult, Executor, TxExecutor};
use async_trait::async_trait;
use log::warn;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Transaction;
use time::OffsetDateTime;

/// Converts an error returned by sqlx while talking to SQLite into a `DbError`.
pub fn map_sqlx_error(e: sqlx::Error) -> DbError {
    match e {
        sqlx::Error::RowNotFound => DbError::NotFound,
        sqlx::Error::PoolTimedOut => DbError::Unavailable,
        sqlx::Error::ColumnDecode { index, source } => {
            DbError::DataIntegrityError(format!("Bad value in column {}: {}", index, source))
        }
        e => DbError::BackendError(e.to_string()),
    }
}

/// Opens a pool against the SQLite database at `conn_str` configured with `pool_options`.
///
/// `:memory:` names an in-memory database shared by all connections of the pool.
pub async fn connect_with(pool_options: SqlitePoolOptions, conn_str: &str) -> DbResult<SqliteDb> {
    let pool = pool_options.connect(conn_str).await.map_err(map_sqlx_error)?;
    Ok(SqliteDb { pool })
}

/// Opens a pool with default settings against the SQLite database at `conn_str`.
pub async fn connect(conn_str: &str) -> DbResult<SqliteDb> {
    connect_with(SqlitePoolOptions::new(), conn_str).await
}

/// A connection checked out of an `SqliteDb`, either on its own or inside a transaction.
#[derive(Debug)]
pub enum SqliteExecutor {
    /// A connection used outside of any transaction.
    PoolExec(PoolConnection<Sqlite>),

    /// A connection with an open transaction.
    TxExec(Transaction<'static, Sqlite>),
}

impl SqliteExecutor {
    /// Gets the raw connection to pass to sqlx queries.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        match self {
            SqliteExecutor::PoolExec(conn) => &mut **conn,
            SqliteExecutor::TxExec(tx) => &mut **tx,
        }
    }

    /// Commits the transaction held by this executor.  Must only be called on `TxExec`.
    pub(super) async fn commit(self) -> DbResult<()> {
        match self {
            SqliteExecutor::PoolExec(_) => unreachable!("No transaction to commit"),
            SqliteExecutor::TxExec(tx) => tx.commit().await.map_err(map_sqlx_error),
        }
    }
}

/// A connection pool against an SQLite database.
pub struct SqliteDb {
    /// The pool; cloning it is cheap and all clones share the same connections.
    pool: SqlitePool,
}

impl SqliteDb {
    /// Checks out a connection without the backend-agnostic `Executor` wrapper.
    pub async fn typed_ex(&self) -> DbResult<SqliteExecutor> {
        let conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        Ok(SqliteExecutor::PoolExec(conn))
    }
}

impl Drop for SqliteDb {
    fn drop(&mut self) {
        if !self.pool.is_closed() {
            warn!("SQLite pool dropped while still open; call close() first");
        }
    }
}

#[async_trait]
impl Db for SqliteDb {
    async fn ex(&self) -> DbResult<Executor> {
        Ok(Executor::Sqlite(self.typed_ex().await?))
    }

    async fn begin(&self) -> DbResult<TxExecutor> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(TxExecutor(Executor::Sqlite(SqliteExecutor::TxExec(tx))))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Runs every statement in `schema` on `ex`, stopping at the first failure.
pub async fn run_schema(ex: &mut SqliteExecutor, schema: &str) -> DbResult<()> {
    for statement in split_schema(schema) {
        sqlx::query(&statement).execute(ex.conn()).await.map_err(map_sqlx_error)?;
    }
    Ok(())
}

/// Encodes `ts` as microseconds since the Unix epoch, which is how timestamps are stored in
/// SQLite columns.
///
/// Fails if `ts` has sub-microsecond precision, as it would not read back identically.
pub fn timestamp_to_micros(ts: OffsetDateTime) -> DbResult<i64> {
    let nanos = ts.unix_timestamp_nanos();
    if nanos % 1000 != 0 {
        return Err(DbError::DataIntegrityError(format!(
            "Timestamp {} is more precise than a microsecond",
            ts
        )));
    }
    i64::try_from(nanos / 1000)
        .map_err(|_| DbError::DataIntegrityError(format!("Timestamp {} is out of range", ts)))
}

/// Decodes a timestamp stored as microseconds since the Unix epoch.
pub fn timestamp_from_micros(micros: i64) -> DbResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1000)
        .map_err(|e| DbError::DataIntegrityError(format!("Invalid timestamp {}: {}", micros, e)))
}

/// Test utilities for the SQLite backend.
#[cfg(any(feature = "testutils", test))]
pub mod testutils {
    use super::*;

    /// Opens an in-memory database whose pool holds at most `max_connections` connections.
    pub async fn setup_with_max_connections(max_connections: u32) -> SqliteDb {
        let _can_fail = env_logger::builder().is_test(true).try_init();
        connect_with(SqlitePoolOptions::new().max_connections(max_connections), ":memory:")
            .await
            .unwrap()
    }

    /// Opens an in-memory database with default pool settings.
    pub async fn setup() -> SqliteDb {
        let _can_fail = env_logger::builder().is_test(true).try_init();
        connect(":memory:").await.unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testutils::*;
    use super::*;
    use crate::db::tests::{generate_db_ro_concurrent_tests, generate_db_rw_tests};
    use std::sync::Arc;
    use time::macros::datetime;

    generate_db_ro_concurrent_tests!(Arc::new(setup().await));

    generate_db_rw_tests!(Arc::new(setup().await));

    #[test]
    fn test_timestamp_micros_epoch() {
        let epoch = datetime!(1970-01-01 00:00:00 UTC);
        assert_eq!(Ok(0), timestamp_to_micros(epoch));
        assert_eq!(Ok(epoch), timestamp_from_micros(0));
    }

    #[test]
    fn test_timestamp_micros_keeps_precision() {
        let ts = datetime!(2024-05-17 06:29:28.123456 UTC);
        let micros = timestamp_to_micros(ts).unwrap();
        assert_eq!(1_715_927_368_123_456, micros);
        assert_eq!(Ok(ts), timestamp_from_micros(micros));
    }

    #[test]
    fn test_timestamp_micros_before_epoch() {
        let ts = datetime!(1969-12-31 23:59:59.5 UTC);
        assert_eq!(Ok(-500_000), timestamp_to_micros(ts));
        assert_eq!(Ok(ts), timestamp_from_micros(-500_000));
    }

    #[test]
    fn test_timestamp_to_micros_rejects_nanos() {
        match timestamp_to_micros(datetime!(2024-05-17 06:29:28.123456789 UTC)) {
            Err(DbError::DataIntegrityError(e)) => assert!(e.contains("more precise")),
            e => panic!("{:?}", e),
        }
    }

    #[test]
    fn test_timestamp_from_micros_out_of_range() {
        match timestamp_from_micros(i64::MAX) {
            Err(DbError::DataIntegrityError(e)) => assert!(e.contains("Invalid timestamp")),
            e => panic!("{:?}", e),
        }
    }

    #[test]
    fn test_map_sqlx_error() {
        assert_eq!(DbError::NotFound, map_sqlx_error(sqlx::Error::RowNotFound));
        assert_eq!(DbError::Unavailable, map_sqlx_error(sqlx::Error::PoolTimedOut));
        match map_sqlx_error(sqlx::Error::Protocol("oops".to_owned())) {
            DbError::BackendError(e) => assert!(e.contains("oops")),
            e => panic!("{:?}", e),
        }
    }

    #[tokio::test]
    async fn test_one_connection_pool_serializes_executors() {
        let db = setup_with_max_connections(1).await;
        {
            let mut ex = db.typed_ex().await.unwrap();
            run_schema(&mut ex, "CREATE TABLE t (i INTEGER)").await.unwrap();
        }
        let mut ex = db.typed_ex().await.unwrap();
        sqlx::query("INSERT INTO t (i) VALUES (1)").execute(ex.conn()).await.unwrap();
        drop(ex);
        db.close().await;
    }
}

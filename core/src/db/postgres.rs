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

//! PostgreSQL backend, used in production.

use crate::db::{split_schema, Db, DbError, DbResult, Executor, TxExecutor};
use crate::env::{get_optional_var, get_required_var};
use async_trait::async_trait;
use derivative::Derivative;
use futures::Future;
use log::warn;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{
    PgConnectOptions, PgConnection, PgDatabaseError, PgPool, PgPoolOptions, Postgres,
};
use sqlx::Transaction;
use std::time::Duration;

/// Number of times to retry acquiring a connection when `<prefix>_MAX_RETRIES` is not set.
const DEFAULT_MAX_RETRIES: u16 = 60;

/// How long to wait for a free connection in the pool before giving up on one attempt.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound of the wait between two connection attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Converts an error returned by sqlx while talking to PostgreSQL into a `DbError`.
pub fn map_sqlx_error(e: sqlx::Error) -> DbError {
    match e {
        sqlx::Error::RowNotFound => DbError::NotFound,
        sqlx::Error::PoolTimedOut => DbError::Unavailable,
        sqlx::Error::ColumnDecode { index, source } => {
            DbError::DataIntegrityError(format!("Bad value in column {}: {}", index, source))
        }
        sqlx::Error::Database(e) => {
            let code = e.try_downcast_ref::<PgDatabaseError>().map(|e| e.code().to_owned());
            match code.as_deref() {
                // too_many_connections and cannot_connect_now.
                Some("53300") | Some("57P03") => DbError::Unavailable,
                Some(code) => DbError::BackendError(format!("PostgreSQL error {}: {}", code, e)),
                None => DbError::BackendError(e.to_string()),
            }
        }
        e => DbError::BackendError(e.to_string()),
    }
}

/// Connection settings for a PostgreSQL server.
#[derive(Derivative)]
#[derivative(Debug)]
#[cfg_attr(test, derivative(PartialEq))]
pub struct PostgresOptions {
    /// Server host name.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Name of the database to use.
    pub database: String,

    /// Role to log in as.
    pub username: String,

    /// Password of `username`.
    #[derivative(Debug = "ignore")]
    pub password: String,

    /// Connections the pool keeps open even when idle, if set.
    pub min_connections: Option<u32>,

    /// Connections the pool may open at most, if set.
    pub max_connections: Option<u32>,

    /// Attempts to acquire a connection while the server reports itself unavailable.
    pub max_retries: u16,
}

impl PostgresOptions {
    /// Reads the settings from `<prefix>_HOST`, `<prefix>_PORT`, `<prefix>_DATABASE`,
    /// `<prefix>_USERNAME` and `<prefix>_PASSWORD`, all required, plus the optional
    /// `<prefix>_MIN_CONNECTIONS`, `<prefix>_MAX_CONNECTIONS` and `<prefix>_MAX_RETRIES`.
    pub fn from_env(prefix: &str) -> Result<PostgresOptions, String> {
        Ok(PostgresOptions {
            host: get_required_var(prefix, "HOST")?,
            port: get_required_var(prefix, "PORT")?,
            database: get_required_var(prefix, "DATABASE")?,
            username: get_required_var(prefix, "USERNAME")?,
            password: get_required_var(prefix, "PASSWORD")?,
            min_connections: get_optional_var(prefix, "MIN_CONNECTIONS")?,
            max_connections: get_optional_var(prefix, "MAX_CONNECTIONS")?,
            max_retries: get_optional_var(prefix, "MAX_RETRIES")?.unwrap_or(DEFAULT_MAX_RETRIES),
        })
    }
}

/// A connection checked out of a `PostgresDb`, either on its own or inside a transaction.
#[derive(Debug)]
pub enum PostgresExecutor {
    /// A connection used outside of any transaction.
    PoolExec(PoolConnection<Postgres>),

    /// A connection with an open transaction.
    TxExec(Transaction<'static, Postgres>),
}

impl PostgresExecutor {
    /// Gets the raw connection to pass to sqlx queries.
    pub fn conn(&mut self) -> &mut PgConnection {
        match self {
            PostgresExecutor::PoolExec(conn) => &mut **conn,
            PostgresExecutor::TxExec(tx) => &mut **tx,
        }
    }

    /// Commits the transaction held by this executor.  Must only be called on `TxExec`.
    pub(super) async fn commit(self) -> DbResult<()> {
        match self {
            PostgresExecutor::PoolExec(_) => unreachable!("No transaction to commit"),
            PostgresExecutor::TxExec(tx) => tx.commit().await.map_err(map_sqlx_error),
        }
    }
}

/// Computes the wait before the next connection attempt given the `previous` one.
///
/// The first wait is between 100ms and 1s and every following one grows by up to 1s more, until
/// it reaches `MAX_RETRY_DELAY`.
fn next_retry_delay(previous: Option<Duration>) -> Duration {
    let jitter = Duration::from_millis(rand::random_range(0..1000));
    match previous {
        None => Duration::from_millis(100) + jitter.mul_f32(0.9),
        Some(previous) => (previous + jitter).min(MAX_RETRY_DELAY),
    }
}

/// Runs `op` until it succeeds, fails with something other than `DbError::Unavailable`, or has
/// been retried `max_retries` times.
async fn with_retries<Op, OpFut, T>(op: Op, max_retries: u16) -> DbResult<T>
where
    Op: Fn() -> OpFut,
    OpFut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut delay = None;
    for attempts_left in (0..=max_retries).rev() {
        match op().await.map_err(map_sqlx_error) {
            Err(DbError::Unavailable) if attempts_left > 0 => {
                let wait = next_retry_delay(delay);
                warn!(
                    "PostgreSQL unavailable; retrying in {}ms ({} attempts left)",
                    wait.as_millis(),
                    attempts_left
                );
                tokio::time::sleep(wait).await;
                delay = Some(wait);
            }
            result => return result,
        }
    }
    unreachable!("The last attempt always returns")
}

/// A connection pool against a PostgreSQL server.
pub struct PostgresDb {
    /// The pool; cloning it is cheap and all clones share the same connections.
    pool: PgPool,

    /// Attempts to acquire a connection while the server reports itself unavailable.
    max_retries: u16,
}

impl PostgresDb {
    /// Prepares a pool against the server described by `opts`.
    ///
    /// Connections are opened lazily, so this does not fail if the server is down.
    pub fn connect(opts: PostgresOptions) -> DbResult<Self> {
        let mut pool_options = PgPoolOptions::new().acquire_timeout(ACQUIRE_TIMEOUT);
        if let Some(min) = opts.min_connections {
            pool_options = pool_options.min_connections(min);
        }
        if let Some(max) = opts.max_connections {
            pool_options = pool_options.max_connections(max);
        }

        let connect_options = PgConnectOptions::new()
            .host(&opts.host)
            .port(opts.port)
            .database(&opts.database)
            .username(&opts.username)
            .password(&opts.password);

        Ok(Self { pool: pool_options.connect_lazy_with(connect_options), max_retries: opts.max_retries })
    }

    /// Checks out a connection without the backend-agnostic `Executor` wrapper.
    pub async fn typed_ex(&self) -> DbResult<PostgresExecutor> {
        let conn = with_retries(|| self.pool.acquire(), self.max_retries).await?;
        Ok(PostgresExecutor::PoolExec(conn))
    }
}

impl Drop for PostgresDb {
    fn drop(&mut self) {
        if !self.pool.is_closed() {
            // Leaking connections hides bugs in tests, so make them loud there.
            if cfg!(debug_assertions) {
                panic!("PostgreSQL pool dropped while still open; call close() first");
            }
            warn!("PostgreSQL pool dropped while still open; call close() first");
        }
    }
}

#[async_trait]
impl Db for PostgresDb {
    async fn ex(&self) -> DbResult<Executor> {
        Ok(Executor::Postgres(self.typed_ex().await?))
    }

    async fn begin(&self) -> DbResult<TxExecutor> {
        let tx = with_retries(|| self.pool.begin(), self.max_retries).await?;
        Ok(TxExecutor(Executor::Postgres(PostgresExecutor::TxExec(tx))))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Runs every statement in `schema` on `ex`, stopping at the first failure.
pub async fn run_schema(ex: &mut PostgresExecutor, schema: &str) -> DbResult<()> {
    for statement in split_schema(schema) {
        sqlx::query(&statement).execute(ex.conn()).await.map_err(map_sqlx_error)?;
    }
    Ok(())
}

/// Test utilities for the PostgreSQL backend.
#[cfg(any(feature = "testutils", test))]
pub mod testutils {
    use super::*;

    /// Connects to the server described by the `PGSQL_TEST_*` variables.
    ///
    /// Tables go into the per-session `pg_temp` schema so that they vanish on disconnection.
    /// This only works because the pool is pinned to exactly one connection.
    pub async fn setup() -> PostgresDb {
        let _can_fail = env_logger::builder().is_test(true).try_init();

        let mut opts = PostgresOptions::from_env("PGSQL_TEST").unwrap();
        opts.min_connections = Some(1);
        opts.max_connections = Some(1);
        let db = PostgresDb::connect(opts).unwrap();

        let mut ex = db.typed_ex().await.unwrap();
        sqlx::query("SET search_path TO pg_temp").execute(ex.conn()).await.unwrap();
        db
    }
}

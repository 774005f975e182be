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

//! Database abstraction to manipulate resources.

use crate::model::{PageRequest, Resource, ResourceDescription, ResourceId, ResourceName};
#[cfg(feature = "postgres")]
use crud_core::db::postgres;
#[cfg(any(feature = "sqlite", test))]
use crud_core::db::sqlite::{self, timestamp_from_micros, timestamp_to_micros};
use crud_core::db::{DbError, DbResult, Executor};
#[cfg(feature = "postgres")]
use sqlx::postgres::PgRow;
#[cfg(any(feature = "sqlite", test))]
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::OffsetDateTime;


/// Initializes the database schema.
pub async fn init_schema(ex: &mut Executor) -> DbResult<()> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => postgres::run_schema(ex, include_str!("postgres.sql")).await,

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => sqlite::run_schema(ex, include_str!("sqlite.sql")).await,

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Builds a `Resource` from the raw column values shared by all backends.
fn build_resource(
    id: i64,
    name: String,
    description: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
) -> DbResult<Resource> {
    let name = ResourceName::new(name)?;
    let description = description.map(ResourceDescription::new).transpose()?;
    if updated_at < created_at {
        return Err(DbError::DataIntegrityError(format!(
            "Resource {} was updated before being created",
            id
        )));
    }
    Ok(Resource::new(ResourceId::new(id), name, description, created_at, updated_at))
}

#[cfg(feature = "postgres")]
impl TryFrom<PgRow> for Resource {
    type Error = DbError;

    fn try_from(row: PgRow) -> DbResult<Self> {
        let id: i64 = row.try_get("id").map_err(postgres::map_sqlx_error)?;
        let name: String = row.try_get("name").map_err(postgres::map_sqlx_error)?;
        let description: Option<String> =
            row.try_get("description").map_err(postgres::map_sqlx_error)?;
        let created_at: OffsetDateTime =
            row.try_get("created_at").map_err(postgres::map_sqlx_error)?;
        let updated_at: OffsetDateTime =
            row.try_get("updated_at").map_err(postgres::map_sqlx_error)?;

        build_resource(id, name, description, created_at, updated_at)
    }
}

#[cfg(any(feature = "sqlite", test))]
impl TryFrom<SqliteRow> for Resource {
    type Error = DbError;

    fn try_from(row: SqliteRow) -> DbResult<Self> {
        let id: i64 = row.try_get("id").map_err(sqlite::map_sqlx_error)?;
        let name: String = row.try_get("name").map_err(sqlite::map_sqlx_error)?;
        let description: Option<String> =
            row.try_get("description").map_err(sqlite::map_sqlx_error)?;
        let created_at: i64 = row.try_get("created_at_micros").map_err(sqlite::map_sqlx_error)?;
        let updated_at: i64 = row.try_get("updated_at_micros").map_err(sqlite::map_sqlx_error)?;

        let created_at = timestamp_from_micros(created_at)?;
        let updated_at = timestamp_from_micros(updated_at)?;

        build_resource(id, name, description, created_at, updated_at)
    }
}

/// Creates a new resource named `name` with an optional `description`, stamping it with `now` as
/// both its creation and modification times.  Returns the stored resource with the identifier
/// assigned by the database.
pub(crate) async fn create_resource(
    ex: &mut Executor,
    name: &ResourceName,
    description: Option<&ResourceDescription>,
    now: OffsetDateTime,
) -> DbResult<Resource> {
    let id = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "
                INSERT INTO resources (name, description, created_at, updated_at)
                VALUES ($1, $2, $3, $3)
                RETURNING id";
            let row = sqlx::query(query_str)
                .bind(name.as_str())
                .bind(description.map(ResourceDescription::as_str))
                .bind(now)
                .fetch_one(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            row.try_get::<i64, _>("id").map_err(postgres::map_sqlx_error)?
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let now_micros = timestamp_to_micros(now)?;

            let query_str = "
                INSERT INTO resources (name, description, created_at_micros, updated_at_micros)
                VALUES (?1, ?2, ?3, ?3)";
            let done = sqlx::query(query_str)
                .bind(name.as_str())
                .bind(description.map(ResourceDescription::as_str))
                .bind(now_micros)
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            done.last_insert_rowid()
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    Ok(Resource::new(ResourceId::new(id), name.clone(), description.cloned(), now, now))
}

/// Gets the resource identified by `id`.
pub(crate) async fn get_resource(ex: &mut Executor, id: ResourceId) -> DbResult<Resource> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "SELECT * FROM resources WHERE id = $1";
            let raw_resource = sqlx::query(query_str)
                .bind(id.as_i64())
                .fetch_one(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            Resource::try_from(raw_resource)
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = "SELECT * FROM resources WHERE id = ?";
            let raw_resource = sqlx::query(query_str)
                .bind(id.as_i64())
                .fetch_one(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            Resource::try_from(raw_resource)
        }

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Gets the resources in `page`, most recently created first.  If `name` is provided, only the
/// resources with exactly that name are considered.
pub(crate) async fn list_resources(
    ex: &mut Executor,
    name: Option<&str>,
    page: &PageRequest,
) -> DbResult<Vec<Resource>> {
    let limit = i64::from(page.limit());
    let offset = page.offset();

    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = match name {
                Some(_) => {
                    "SELECT * FROM resources WHERE name = $1
                    ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
                }
                None => "SELECT * FROM resources ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            };
            let mut query = sqlx::query(query_str);
            if let Some(name) = name {
                query = query.bind(name);
            }
            let raw_resources = query
                .bind(limit)
                .bind(offset)
                .fetch_all(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            raw_resources.into_iter().map(Resource::try_from).collect()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = match name {
                Some(_) => {
                    "SELECT * FROM resources WHERE name = ?
                    ORDER BY created_at_micros DESC, id DESC LIMIT ? OFFSET ?"
                }
                None => {
                    "SELECT * FROM resources
                    ORDER BY created_at_micros DESC, id DESC LIMIT ? OFFSET ?"
                }
            };
            let mut query = sqlx::query(query_str);
            if let Some(name) = name {
                query = query.bind(name);
            }
            let raw_resources = query
                .bind(limit)
                .bind(offset)
                .fetch_all(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            raw_resources.into_iter().map(Resource::try_from).collect()
        }

        #[allow(unused)]
        _ => unreachable!(),
    }
}

/// Counts the resources that exist.  If `name` is provided, only the resources with exactly that
/// name are counted.
pub(crate) async fn count_resources(ex: &mut Executor, name: Option<&str>) -> DbResult<u64> {
    let count: i64 = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = match name {
                Some(_) => "SELECT COUNT(*) AS count FROM resources WHERE name = $1",
                None => "SELECT COUNT(*) AS count FROM resources",
            };
            let mut query = sqlx::query(query_str);
            if let Some(name) = name {
                query = query.bind(name);
            }
            let row = query.fetch_one(ex.conn()).await.map_err(postgres::map_sqlx_error)?;
            row.try_get("count").map_err(postgres::map_sqlx_error)?
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = match name {
                Some(_) => "SELECT COUNT(*) AS count FROM resources WHERE name = ?",
                None => "SELECT COUNT(*) AS count FROM resources",
            };
            let mut query = sqlx::query(query_str);
            if let Some(name) = name {
                query = query.bind(name);
            }
            let row = query.fetch_one(ex.conn()).await.map_err(sqlite::map_sqlx_error)?;
            row.try_get("count").map_err(sqlite::map_sqlx_error)?
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    u64::try_from(count)
        .map_err(|e| DbError::DataIntegrityError(format!("Invalid resource count {}: {}", count, e)))
}

/// Replaces the mutable fields of the resource identified by `id` with `name` and `description`
/// and records `updated_at` as its modification time.
pub(crate) async fn update_resource(
    ex: &mut Executor,
    id: ResourceId,
    name: &ResourceName,
    description: Option<&ResourceDescription>,
    updated_at: OffsetDateTime,
) -> DbResult<()> {
    let rows_affected = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "
                UPDATE resources SET name = $1, description = $2, updated_at = $3
                WHERE id = $4";
            let done = sqlx::query(query_str)
                .bind(name.as_str())
                .bind(description.map(ResourceDescription::as_str))
                .bind(updated_at)
                .bind(id.as_i64())
                .execute(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            done.rows_affected()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let updated_at_micros = timestamp_to_micros(updated_at)?;

            let query_str = "
                UPDATE resources SET name = ?, description = ?, updated_at_micros = ?
                WHERE id = ?";
            let done = sqlx::query(query_str)
                .bind(name.as_str())
                .bind(description.map(ResourceDescription::as_str))
                .bind(updated_at_micros)
                .bind(id.as_i64())
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            done.rows_affected()
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    match rows_affected {
        0 => Err(DbError::NotFound),
        1 => Ok(()),
        _ => Err(DbError::BackendError("Update affected more than one row".to_owned())),
    }
}

/// Deletes the resource identified by `id`.
pub(crate) async fn delete_resource(ex: &mut Executor, id: ResourceId) -> DbResult<()> {
    let rows_affected = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "DELETE FROM resources WHERE id = $1";
            let done = sqlx::query(query_str)
                .bind(id.as_i64())
                .execute(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            done.rows_affected()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = "DELETE FROM resources WHERE id = ?";
            let done = sqlx::query(query_str)
                .bind(id.as_i64())
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            done.rows_affected()
        }

        #[allow(unused)]
        _ => unreachable!(),
    };

    match rows_affected {
        0 => Err(DbError::NotFound),
        1 => Ok(()),
        _ => Err(DbError::BackendError("Deletion affected more than one row".to_owned())),
    }
}

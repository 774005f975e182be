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

//! API to delete a resource.

use crate::driver::Driver;
use crate::model::ResourceId;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http;
use crud_core::rest::{EmptyBody, RestError, RestResult};

/// Deletes the resource named by `id`.
async fn delete(
    driver: Driver,
    id: Result<Path<ResourceId>, PathRejection>,
    body: Result<EmptyBody, RestError>,
) -> RestResult<()> {
    let Path(id) = id?;
    body?;

    Ok(driver.delete_resource(id).await?)
}

/// API handler.  Any failure is reported as a missing resource.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    id: Result<Path<ResourceId>, PathRejection>,
    body: Result<EmptyBody, RestError>,
) -> Result<http::StatusCode, RestError> {
    delete(driver, id, body).await.map_err(RestError::into_not_found)?;

    Ok(http::StatusCode::NO_CONTENT)
}

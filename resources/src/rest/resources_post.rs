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

//! API to create a resource.

use crate::driver::Driver;
use crate::model::{NewResource, Resource};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::{http, Json};
use crud_core::rest::{RestError, RestResult};

/// Creates the resource described by `body`.
async fn create(
    driver: Driver,
    body: Result<Json<NewResource>, JsonRejection>,
) -> RestResult<Resource> {
    let Json(new) = body?;

    Ok(driver.create_resource(new).await?)
}

/// API handler.  Any failure is reported as a bad request.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    body: Result<Json<NewResource>, JsonRejection>,
) -> Result<impl IntoResponse, RestError> {
    let resource = create(driver, body).await.map_err(RestError::into_invalid_request)?;

    Ok((http::StatusCode::CREATED, Json(resource)))
}

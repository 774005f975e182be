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

//! API to update a resource.

use crate::driver::Driver;
use crate::model::{Resource, ResourceId, ResourcePatch};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use crud_core::rest::{RestError, RestResult};

/// Applies the patch in `body` to the resource named by `id`.
async fn update(
    driver: Driver,
    id: Result<Path<ResourceId>, PathRejection>,
    body: Result<Json<ResourcePatch>, JsonRejection>,
) -> RestResult<Resource> {
    let Path(id) = id?;
    let Json(patch) = body?;

    Ok(driver.update_resource(id, patch).await?)
}

/// API handler.  Any failure is reported as a missing resource.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    id: Result<Path<ResourceId>, PathRejection>,
    body: Result<Json<ResourcePatch>, JsonRejection>,
) -> Result<impl IntoResponse, RestError> {
    let resource = update(driver, id, body).await.map_err(RestError::into_not_found)?;

    Ok(Json(resource))
}

#[cfg(test)]
mod tests {
    use crate::model::*;
    use crate::rest::testutils::*;
    use axum::http;
    use crud_core::rest::testutils::*;
    use serde_json::json;
    use std::time::Duration;

    fn route(id: impl ToString) -> (http::Method, String) {
        (http::Method::PUT, format!("/api/resources/{}", id.to_string()))
    }

    #[tokio::test]
    async fn test_update_all_fields() {
        let context = TestContext::setup().await;

        let resource = context.create_resource("before", Some("old")).await;
        context.clock().advance(Duration::from_secs(30));

        let response = OneShotBuilder::new(context.app(), route(resource.id().as_i64()))
            .send_json(json!({"name": "after", "description": "new"}))
            .await
            .expect_json::<Resource>()
            .await;
        let exp_resource = Resource::new(
            *resource.id(),
            ResourceName::from("after"),
            Some(ResourceDescription::new("new").unwrap()),
            *resource.created_at(),
            context.now(),
        );
        assert_eq!(exp_resource, response);
        assert!(response.updated_at() > resource.updated_at());

        assert_eq!(Some(exp_resource), context.get_resource(*resource.id()).await);
    }

    #[tokio::test]
    async fn test_update_keeps_unspecified_fields() {
        let context = TestContext::setup().await;

        let resource = context.create_resource("name", Some("kept")).await;
        context.clock().advance(Duration::from_secs(1));

        let response = OneShotBuilder::new(context.app(), route(resource.id().as_i64()))
            .send_json(json!({"name": "renamed"}))
            .await
            .expect_json::<Resource>()
            .await;
        assert_eq!("renamed", response.name().as_str());
        assert_eq!(resource.description(), response.description());

        let response = OneShotBuilder::new(context.app(), route(resource.id().as_i64()))
            .send_json(json!({}))
            .await
            .expect_json::<Resource>()
            .await;
        assert_eq!("renamed", response.name().as_str());
        assert_eq!(resource.description(), response.description());
    }

    #[tokio::test]
    async fn test_update_null_description_clears_it() {
        let context = TestContext::setup().await;

        let resource = context.create_resource("name", Some("to clear")).await;

        let response = OneShotBuilder::new(context.app(), route(resource.id().as_i64()))
            .send_json(json!({"description": null}))
            .await
            .expect_json::<Resource>()
            .await;
        assert_eq!(&None, response.description());
        assert_eq!(resource.name(), response.name());
    }

    #[tokio::test]
    async fn test_not_found() {
        let context = TestContext::setup().await;

        OneShotBuilder::new(context.app(), route(42))
            .send_json(json!({"name": "irrelevant"}))
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error("^Not found$")
            .await;
    }

    #[tokio::test]
    async fn test_invalid_name() {
        let context = TestContext::setup().await;

        let resource = context.create_resource("valid", None).await;

        OneShotBuilder::new(context.app(), route(resource.id().as_i64()))
            .send_json(json!({"name": ""}))
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error("^Not found$")
            .await;

        assert_eq!(Some(resource.clone()), context.get_resource(*resource.id()).await);
    }

    #[tokio::test]
    async fn test_rejects_server_owned_fields() {
        let context = TestContext::setup().await;

        let resource = context.create_resource("valid", None).await;

        OneShotBuilder::new(context.app(), route(resource.id().as_i64()))
            .send_json(json!({"createdAt": "2020-01-01T00:00:00Z"}))
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error("^Not found$")
            .await;

        assert_eq!(Some(resource.clone()), context.get_resource(*resource.id()).await);
    }

    #[tokio::test]
    async fn test_invalid_id() {
        let context = TestContext::setup().await;

        OneShotBuilder::new(context.app(), route("not-a-number"))
            .send_json(json!({"name": "irrelevant"}))
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error("^Not found$")
            .await;
    }

    #[tokio::test]
    async fn test_payload_not_json() {
        let context = TestContext::setup().await;

        let resource = context.create_resource("valid", None).await;

        OneShotBuilder::new(context.app(), route(resource.id().as_i64()))
            .send_text("this is not json")
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error("^Not found$")
            .await;

        OneShotBuilder::new(context.app(), route(resource.id().as_i64()))
            .with_header(http::header::CONTENT_TYPE, "application/json")
            .send_text("this is not json")
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error("^Not found$")
            .await;
    }

    #[tokio::test]
    async fn test_storage_failure() {
        let context = TestContext::setup().await;

        let resource = context.create_resource("valid", None).await;
        context.break_storage().await;

        OneShotBuilder::new(context.app(), route(resource.id().as_i64()))
            .send_json(json!({"name": "renamed"}))
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error("^Not found$")
            .await;
    }
}

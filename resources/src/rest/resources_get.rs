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

//! API to list resources.

use crate::driver::Driver;
use crate::model::{PageRequest, ResourcePage, DEFAULT_LIMIT, DEFAULT_PAGE};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use crud_core::rest::{EmptyBody, RestError, RestResult};
use serde::Deserialize;

/// Query parameters accepted by this API.
///
/// Values are kept as raw strings so that malformed pagination values fall back to their defaults
/// instead of failing the request.
#[derive(Deserialize)]
pub(crate) struct ListQuery {
    /// One-based page number.
    page: Option<String>,

    /// Maximum number of items per page.
    limit: Option<String>,

    /// Exact name to filter by.  Empty means no filter.
    name: Option<String>,
}

/// Parses `value` as a positive integer, or returns `default` if it is missing or invalid.
fn parse_positive(value: Option<&str>, default: u32) -> u32 {
    match value.map(|v| v.trim().parse::<u32>()) {
        Some(Ok(n)) if n > 0 => n,
        _ => default,
    }
}

/// Fetches the page of resources described by `query`.
async fn list(
    driver: Driver,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> RestResult<ResourcePage> {
    let Query(query) = query?;

    let page = PageRequest::new(
        parse_positive(query.page.as_deref(), DEFAULT_PAGE),
        parse_positive(query.limit.as_deref(), DEFAULT_LIMIT),
    )?;
    let name = query.name.filter(|name| !name.is_empty());

    Ok(driver.list_resources(name, page).await?)
}

/// API handler.  Malformed pagination falls back to the defaults, so any failure other than a
/// non-empty body is reported as an internal error.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    query: Result<Query<ListQuery>, QueryRejection>,
    _: EmptyBody,
) -> Result<impl IntoResponse, RestError> {
    let page = list(driver, query).await.map_err(RestError::into_internal_error)?;

    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::rest::testutils::*;
    use axum::http;
    use crud_core::rest::testutils::*;
    use std::time::Duration;

    fn route() -> (http::Method, String) {
        (http::Method::GET, "/api/resources".to_owned())
    }

    /// Creates `count` resources named `name`, each one second newer than the previous.
    async fn create_many(
        context: &TestContext,
        name: &'static str,
        count: usize,
    ) -> Vec<Resource> {
        let mut resources = Vec::with_capacity(count);
        for _ in 0..count {
            resources.push(context.create_resource(name, None).await);
            context.clock().advance(Duration::from_secs(1));
        }
        resources
    }

    #[test]
    fn test_parse_positive() {
        assert_eq!(7, parse_positive(None, 7));
        assert_eq!(3, parse_positive(Some("3"), 7));
        assert_eq!(7, parse_positive(Some("0"), 7));
        // Negative values fall back to the default instead of failing the request.
        assert_eq!(7, parse_positive(Some("-2"), 7));
        assert_eq!(7, parse_positive(Some("abc"), 7));
        assert_eq!(7, parse_positive(Some(""), 7));
    }

    #[tokio::test]
    async fn test_defaults() {
        let context = TestContext::setup().await;

        let mut resources = create_many(&context, "item", 12).await;
        resources.reverse();
        resources.truncate(10);

        let response = OneShotBuilder::new(context.app(), route())
            .send_empty()
            .await
            .expect_json::<ResourcePage>()
            .await;
        let exp_response = ResourcePage::new(
            resources,
            Pagination::new(12, &PageRequest::new(1, 10).unwrap()),
        );
        assert_eq!(exp_response, response);
    }

    #[tokio::test]
    async fn test_second_page() {
        let context = TestContext::setup().await;

        let mut resources = create_many(&context, "item", 25).await;
        resources.reverse();
        let exp_data = resources[10..20].to_vec();

        let response = OneShotBuilder::new(context.app(), route())
            .with_query([("page", "2"), ("limit", "10")])
            .send_empty()
            .await
            .take_body_as_text()
            .await;
        let response: serde_json::Value = serde_json::from_str(&response).unwrap();
        assert_eq!(
            serde_json::json!({"total": 25, "page": 2, "limit": 10, "totalPages": 3}),
            response["pagination"]
        );
        assert_eq!(serde_json::to_value(exp_data).unwrap(), response["data"]);
    }

    #[tokio::test]
    async fn test_filter_by_name() {
        let context = TestContext::setup().await;

        let mut matches = create_many(&context, "wanted", 2).await;
        create_many(&context, "unwanted", 3).await;
        matches.reverse();

        let response = OneShotBuilder::new(context.app(), route())
            .with_query([("name", "wanted")])
            .send_empty()
            .await
            .expect_json::<ResourcePage>()
            .await;
        let exp_response =
            ResourcePage::new(matches, Pagination::new(2, &PageRequest::default()));
        assert_eq!(exp_response, response);
    }

    #[tokio::test]
    async fn test_empty_name_means_no_filter() {
        let context = TestContext::setup().await;

        create_many(&context, "a", 2).await;
        create_many(&context, "b", 1).await;

        let response = OneShotBuilder::new(context.app(), route())
            .with_query([("name", "")])
            .send_empty()
            .await
            .expect_json::<ResourcePage>()
            .await;
        assert_eq!(3, response.data().len());
    }

    #[tokio::test]
    async fn test_invalid_paging_uses_defaults() {
        let context = TestContext::setup().await;

        create_many(&context, "item", 1).await;

        let response = OneShotBuilder::new(context.app(), route())
            .with_query([("page", "zero"), ("limit", "-5")])
            .send_empty()
            .await
            .expect_json::<ResourcePage>()
            .await;
        assert_eq!(&Pagination::new(1, &PageRequest::default()), response.pagination());
    }

    #[tokio::test]
    async fn test_empty_collection() {
        let context = TestContext::setup().await;

        let response = OneShotBuilder::new(context.app(), route())
            .send_empty()
            .await
            .take_body_as_text()
            .await;
        let response: serde_json::Value = serde_json::from_str(&response).unwrap();
        assert_eq!(
            serde_json::json!({
                "data": [],
                "pagination": {"total": 0, "page": 1, "limit": 10, "totalPages": 0},
            }),
            response
        );
    }

    #[tokio::test]
    async fn test_page_out_of_range() {
        let context = TestContext::setup().await;

        OneShotBuilder::new(context.app(), route())
            .with_query([("page", "4294967295"), ("limit", "4294967295")])
            .send_empty()
            .await
            .expect_status(http::StatusCode::INTERNAL_SERVER_ERROR)
            .expect_error("out of range")
            .await;
    }

    #[tokio::test]
    async fn test_storage_failure() {
        let context = TestContext::setup().await;

        create_many(&context, "item", 1).await;
        context.break_storage().await;

        OneShotBuilder::new(context.app(), route())
            .send_empty()
            .await
            .expect_status(http::StatusCode::INTERNAL_SERVER_ERROR)
            .expect_error("no such table")
            .await;
    }

    test_payload_must_be_empty!(TestContext::setup().await.into_app(), route());
}

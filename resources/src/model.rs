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

//! High-level data types.

use crud_core::model::{ModelError, ModelResult};
use derive_getters::{Dissolve, Getters};
use derive_more::Constructor;
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// Maximum length of a resource name in bytes, as specified in the schema.
pub(crate) const MAX_NAME_LENGTH: usize = 255;

/// Maximum length of a resource description in bytes.
pub(crate) const MAX_DESCRIPTION_LENGTH: usize = 4096;

/// Page number used when the client does not provide a valid one.
pub(crate) const DEFAULT_PAGE: u32 = 1;

/// Page size used when the client does not provide a valid one.
pub(crate) const DEFAULT_LIMIT: u32 = 10;

/// Identifier of a resource, assigned by the database on creation.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ResourceId(i64);

impl ResourceId {
    /// Creates a new identifier from its raw database representation.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the identifier as stored in the database.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// Represents a valid resource name.
///
/// Names are stored trimmed and must not be empty after trimming.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResourceName(String);

impl ResourceName {
    /// Creates a new name from an untrusted string `s`, making sure it is valid.
    pub fn new<S: AsRef<str>>(s: S) -> ModelResult<Self> {
        let s = s.as_ref().trim();

        if s.is_empty() {
            return Err(ModelError("Resource name cannot be empty".to_owned()));
        }
        if s.len() > MAX_NAME_LENGTH {
            return Err(ModelError(format!(
                "Resource name cannot be longer than {} bytes",
                MAX_NAME_LENGTH
            )));
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns a string view of the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
impl From<&'static str> for ResourceName {
    /// Creates a new name from a hardcoded string, which must be valid.
    fn from(name: &'static str) -> Self {
        ResourceName::new(name).expect("Hardcoded names must be valid")
    }
}

/// A deserialization visitor for a `ResourceName`.
struct ResourceNameVisitor;

impl Visitor<'_> for ResourceNameVisitor {
    type Value = ResourceName;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a string")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        ResourceName::new(v).map_err(|e| E::custom(e.to_string()))
    }
}

impl<'de> Deserialize<'de> for ResourceName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_string(ResourceNameVisitor)
    }
}

/// Free-form payload attached to a resource.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceDescription(String);

impl ResourceDescription {
    /// Creates a new description from an untrusted string `s`, making sure it is valid.
    pub fn new<S: Into<String>>(s: S) -> ModelResult<Self> {
        let s = s.into();
        if s.len() > MAX_DESCRIPTION_LENGTH {
            return Err(ModelError(format!(
                "Resource description cannot be longer than {} bytes",
                MAX_DESCRIPTION_LENGTH
            )));
        }
        Ok(Self(s))
    }

    /// Returns a string view of the description.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceDescription {
    type Error = ModelError;

    fn try_from(s: String) -> ModelResult<Self> {
        ResourceDescription::new(s)
    }
}

impl From<ResourceDescription> for String {
    fn from(description: ResourceDescription) -> Self {
        description.0
    }
}

/// A stored resource.
#[derive(Clone, Constructor, Debug, Getters, PartialEq, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Identifier assigned by the database.
    id: ResourceId,

    /// Name of the resource.
    name: ResourceName,

    /// Optional payload of the resource.
    description: Option<ResourceDescription>,

    /// Time when the resource was created.
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,

    /// Time when the resource was last modified.  Never earlier than `created_at`.
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

/// Client-provided contents of a resource to create.
///
/// Fields owned by the server, such as the identifier and the timestamps, are rejected.
#[derive(Debug, Deserialize, Dissolve)]
#[cfg_attr(test, derive(Constructor, Serialize))]
#[serde(deny_unknown_fields)]
pub struct NewResource {
    /// Name of the new resource.
    name: ResourceName,

    /// Optional payload of the new resource.
    #[serde(default)]
    description: Option<ResourceDescription>,
}

/// Deserializes a field that is present in the input as `Some`, including when its value is
/// `null`, so that absent fields can be told apart from explicit nulls.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Partial modification of a resource.  Absent fields keep their stored values.
#[derive(Debug, Deserialize, Dissolve)]
#[cfg_attr(test, derive(Constructor, Serialize))]
#[serde(deny_unknown_fields)]
pub struct ResourcePatch {
    /// New name for the resource, if any.
    #[serde(default)]
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    name: Option<ResourceName>,

    /// New description for the resource, if any.  `Some(None)` clears the stored description.
    #[serde(default, deserialize_with = "deserialize_some")]
    #[cfg_attr(test, serde(skip_serializing_if = "Option::is_none"))]
    description: Option<Option<ResourceDescription>>,
}

/// Page of the collection to return on a listing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageRequest {
    /// One-based page number.
    page: u32,

    /// Maximum number of items per page.
    limit: u32,
}

impl PageRequest {
    /// Creates a new page request, validating that both quantities are positive and that the
    /// first item of the page is addressable by the database.
    pub fn new(page: u32, limit: u32) -> ModelResult<Self> {
        if page == 0 {
            return Err(ModelError("Page must be positive".to_owned()));
        }
        if limit == 0 {
            return Err(ModelError("Limit must be positive".to_owned()));
        }
        let offset = u64::from(page - 1) * u64::from(limit);
        if i64::try_from(offset).is_err() {
            return Err(ModelError("Page is out of range".to_owned()));
        }
        Ok(Self { page, limit })
    }

    /// Returns the one-based page number.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Returns the maximum number of items per page.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Returns the number of items to skip before the first item of this page.
    pub fn offset(&self) -> i64 {
        let offset = u64::from(self.page - 1) * u64::from(self.limit);
        i64::try_from(offset).expect("Range validated at construction time")
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: DEFAULT_PAGE, limit: DEFAULT_LIMIT }
    }
}

/// Pagination details of a listing.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Total number of items matching the filter.
    total: u64,

    /// One-based page number of this listing.
    page: u32,

    /// Maximum number of items per page.
    limit: u32,

    /// Number of pages needed to return all matching items.
    total_pages: u64,
}

impl Pagination {
    /// Computes the pagination details of `page` given the `total` number of matching items.
    pub fn new(total: u64, page: &PageRequest) -> Self {
        Self {
            total,
            page: page.page(),
            limit: page.limit(),
            total_pages: total.div_ceil(u64::from(page.limit())),
        }
    }
}

/// A page of resources.
#[derive(Constructor, Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize, Getters, PartialEq))]
pub struct ResourcePage {
    /// Resources in this page, most recently created first.
    data: Vec<Resource>,

    /// Pagination details.
    pagination: Pagination,
}

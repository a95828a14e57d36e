// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The registry interface the inventory engine is written against

use crate::Error;
use async_trait::async_trait;
use http::Method;
use serde_json::Map;
use serde_json::Value;
use ssot_types::ObjectKind;
use ssot_types::Record;

/// Query parameters narrowing a list request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListFilter {
    params: Vec<(String, String)>,
}

impl ListFilter {
    pub fn new() -> ListFilter {
        ListFilter::default()
    }

    /// Only records carrying the tag with this slug.
    pub fn tag(self, slug: &str) -> ListFilter {
        self.param("tag", slug)
    }

    pub fn param(mut self, key: &str, value: &str) -> ListFilter {
        self.params.push((key.to_owned(), value.to_owned()));
        self
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Values given for `key`, in order.
    pub fn values<'a>(
        &'a self,
        key: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.params
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// CRUD over the registry's collections, one collection per
/// [`ObjectKind`].
///
/// Bodies are JSON values in the registry's write shape: choices as bare
/// values and references as bare ids.  Responses are the registry's read
/// shape.  No operation is retried.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Every record of `kind` matching `filter`, across all pages.
    async fn list(
        &self,
        kind: ObjectKind,
        filter: &ListFilter,
    ) -> Result<Vec<Value>, Error>;

    async fn create(&self, kind: ObjectKind, body: &Value)
        -> Result<Value, Error>;

    /// Partial update of record `id` with only the fields in `body`.
    async fn patch(
        &self,
        kind: ObjectKind,
        id: i64,
        body: &Map<String, Value>,
    ) -> Result<Value, Error>;

    async fn delete(&self, kind: ObjectKind, id: i64) -> Result<(), Error>;
}

fn decode<T: Record>(method: Method, value: Value) -> Result<T, Error> {
    serde_json::from_value(value).map_err(|error| Error::Decode {
        method,
        url: T::KIND.api_path().to_owned(),
        message: error.to_string(),
    })
}

pub async fn list_typed<T: Record>(
    api: &dyn RegistryApi,
    filter: &ListFilter,
) -> Result<Vec<T>, Error> {
    api.list(T::KIND, filter)
        .await?
        .into_iter()
        .map(|value| decode(Method::GET, value))
        .collect()
}

pub async fn create_typed<T: Record>(
    api: &dyn RegistryApi,
    record: &T,
) -> Result<T, Error> {
    let body = serde_json::to_value(record).map_err(|error| {
        Error::Encode { kind: T::KIND, message: error.to_string() }
    })?;
    decode(Method::POST, api.create(T::KIND, &body).await?)
}

pub async fn patch_typed<T: Record>(
    api: &dyn RegistryApi,
    id: i64,
    body: &Map<String, Value>,
) -> Result<T, Error> {
    decode(Method::PATCH, api.patch(T::KIND, id, body).await?)
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An in-memory registry that records every call made against it

use async_trait::async_trait;
use http::Method;
use http::StatusCode;
use netbox_client::Error;
use netbox_client::ListFilter;
use netbox_client::RegistryApi;
use serde_json::Map;
use serde_json::Value;
use ssot_types::ObjectKind;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Op {
    List,
    Create,
    Patch,
    Delete,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub op: Op,
    pub kind: ObjectKind,
    pub id: Option<i64>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    records: BTreeMap<ObjectKind, BTreeMap<i64, Value>>,
    calls: Vec<Call>,
    failures: BTreeSet<(Op, ObjectKind)>,
}

impl Inner {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert(&mut self, kind: ObjectKind, mut value: Value) -> Value {
        let id = match value.get("id").and_then(Value::as_i64) {
            Some(id) if id > 0 => {
                self.next_id = self.next_id.max(id);
                id
            }
            _ => self.allocate_id(),
        };
        if let Value::Object(map) = &mut value {
            map.insert(String::from("id"), Value::from(id));
        }
        self.records.entry(kind).or_default().insert(id, value.clone());
        value
    }

    fn tag_id_by_slug(&self, slug: &str) -> Option<i64> {
        self.records.get(&ObjectKind::Tag)?.iter().find_map(|(id, tag)| {
            (tag.get("slug").and_then(Value::as_str) == Some(slug))
                .then_some(*id)
        })
    }
}

fn tag_ids(record: &Value) -> Vec<i64> {
    record
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|tag| match tag {
                    Value::Object(nested) => {
                        nested.get("id").and_then(Value::as_i64)
                    }
                    other => other.as_i64(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// A [`RegistryApi`] holding records in memory in their write shape:
/// references are bare ids and choices bare values.
///
/// Ids are allocated from a single counter across kinds.  Patches merge the
/// `custom_fields` map the way the real registry does.  A `tag` list filter
/// is honored; other filters are ignored.
#[derive(Default)]
pub struct FakeRegistry {
    inner: Mutex<Inner>,
}

impl FakeRegistry {
    pub fn new() -> FakeRegistry {
        FakeRegistry::default()
    }

    /// Stores `value` as if it already existed in the registry and returns
    /// its id.  Seeding is not recorded as a call.
    pub fn seed(&self, kind: ObjectKind, value: Value) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        let stored = inner.insert(kind, value);
        stored["id"].as_i64().unwrap()
    }

    pub fn records(&self, kind: ObjectKind) -> Vec<Value> {
        let inner = self.inner.lock().unwrap();
        inner
            .records
            .get(&kind)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, kind: ObjectKind, id: i64) -> Option<Value> {
        let inner = self.inner.lock().unwrap();
        inner.records.get(&kind)?.get(&id).cloned()
    }

    /// The stored record of `kind` whose `field` equals `value`.
    pub fn find(
        &self,
        kind: ObjectKind,
        field: &str,
        value: &Value,
    ) -> Option<Value> {
        self.records(kind)
            .into_iter()
            .find(|record| record.get(field) == Some(value))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Calls other than lists.
    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|call| call.op != Op::List).collect()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    /// Makes every later `op` against `kind` fail with a 500.
    pub fn fail(&self, op: Op, kind: ObjectKind) {
        self.inner.lock().unwrap().failures.insert((op, kind));
    }

    fn record_call(
        &self,
        op: Op,
        kind: ObjectKind,
        id: Option<i64>,
        body: Option<Value>,
    ) -> Result<std::sync::MutexGuard<'_, Inner>, Error> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call { op, kind, id, body });
        if inner.failures.contains(&(op, kind)) {
            let method = match op {
                Op::List => Method::GET,
                Op::Create => Method::POST,
                Op::Patch => Method::PATCH,
                Op::Delete => Method::DELETE,
            };
            return Err(Error::Status {
                method,
                url: kind.api_path().to_owned(),
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: String::from("injected failure"),
            });
        }
        Ok(inner)
    }
}

fn not_found(method: Method, kind: ObjectKind, id: i64) -> Error {
    Error::Status {
        method,
        url: format!("{}/{}/", kind.api_path(), id),
        status: StatusCode::NOT_FOUND,
        body: String::from(r#"{"detail": "Not found."}"#),
    }
}

#[async_trait]
impl RegistryApi for FakeRegistry {
    async fn list(
        &self,
        kind: ObjectKind,
        filter: &ListFilter,
    ) -> Result<Vec<Value>, Error> {
        let inner = self.record_call(Op::List, kind, None, None)?;
        let wanted_tags: Option<Vec<i64>> = {
            let slugs: Vec<&str> = filter.values("tag").collect();
            if slugs.is_empty() {
                None
            } else {
                Some(
                    slugs
                        .iter()
                        .map(|slug| inner.tag_id_by_slug(slug).unwrap_or(-1))
                        .collect(),
                )
            }
        };
        let records = inner
            .records
            .get(&kind)
            .map(|records| {
                records
                    .values()
                    .filter(|record| match &wanted_tags {
                        None => true,
                        Some(wanted) => {
                            let have = tag_ids(record);
                            wanted.iter().all(|id| have.contains(id))
                        }
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    async fn create(
        &self,
        kind: ObjectKind,
        body: &Value,
    ) -> Result<Value, Error> {
        let mut inner =
            self.record_call(Op::Create, kind, None, Some(body.clone()))?;
        let mut body = body.clone();
        if let Value::Object(map) = &mut body {
            map.remove("id");
        }
        Ok(inner.insert(kind, body))
    }

    async fn patch(
        &self,
        kind: ObjectKind,
        id: i64,
        body: &Map<String, Value>,
    ) -> Result<Value, Error> {
        let mut inner = self.record_call(
            Op::Patch,
            kind,
            Some(id),
            Some(Value::Object(body.clone())),
        )?;
        let record = inner
            .records
            .get_mut(&kind)
            .and_then(|records| records.get_mut(&id))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| not_found(Method::PATCH, kind, id))?;
        for (key, value) in body {
            let merged = match (value, record.get_mut(key)) {
                (Value::Object(new), Some(Value::Object(existing)))
                    if key == "custom_fields" =>
                {
                    for (field, value) in new {
                        existing.insert(field.clone(), value.clone());
                    }
                    true
                }
                _ => false,
            };
            if !merged {
                record.insert(key.clone(), value.clone());
            }
        }
        Ok(Value::Object(record.clone()))
    }

    async fn delete(&self, kind: ObjectKind, id: i64) -> Result<(), Error> {
        let mut inner = self.record_call(Op::Delete, kind, Some(id), None)?;
        inner
            .records
            .get_mut(&kind)
            .and_then(|records| records.remove(&id))
            .map(|_| ())
            .ok_or_else(|| not_found(Method::DELETE, kind, id))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fake_registry_crud() {
        let registry = FakeRegistry::new();
        let tag = registry.seed(
            ObjectKind::Tag,
            json!({"name": "netbox-ssot", "slug": "netbox-ssot"}),
        );
        let created = registry
            .create(
                ObjectKind::Site,
                &json!({
                    "name": "s1",
                    "tags": [tag],
                    "custom_fields": {"a": 1},
                }),
            )
            .await
            .unwrap();
        let site = created["id"].as_i64().unwrap();
        registry
            .create(ObjectKind::Site, &json!({"name": "s2", "tags": []}))
            .await
            .unwrap();

        let tagged = registry
            .list(ObjectKind::Site, &ListFilter::new().tag("netbox-ssot"))
            .await
            .unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0]["name"], "s1");

        let mut body = Map::new();
        body.insert(String::from("custom_fields"), json!({"b": 2}));
        let patched =
            registry.patch(ObjectKind::Site, site, &body).await.unwrap();
        assert_eq!(patched["custom_fields"], json!({"a": 1, "b": 2}));

        registry.delete(ObjectKind::Site, site).await.unwrap();
        assert_eq!(registry.records(ObjectKind::Site).len(), 1);
        let error = registry.delete(ObjectKind::Site, site).await.unwrap_err();
        assert_eq!(error.status(), Some(StatusCode::NOT_FOUND));

        let ops: Vec<Op> = registry.calls().iter().map(|c| c.op).collect();
        assert_eq!(
            ops,
            [
                Op::Create,
                Op::Create,
                Op::List,
                Op::Patch,
                Op::Delete,
                Op::Delete
            ]
        );
    }

    #[tokio::test]
    async fn test_fake_registry_injected_failure() {
        let registry = FakeRegistry::new();
        registry.fail(Op::Create, ObjectKind::Tenant);
        let error = registry
            .create(ObjectKind::Tenant, &json!({"name": "t"}))
            .await
            .unwrap_err();
        assert_eq!(error.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(registry.records(ObjectKind::Tenant).is_empty());
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Serde helpers for references between records
//!
//! The registry renders a reference as a nested (brief) object on read and
//! accepts a bare integer id on write.  References are held in memory as
//! `Arc<T>` of the referenced record; only its `id` is meaningful when it was
//! read from a nested object.

use crate::record::Record;
use serde::ser::SerializeSeq;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serializer;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(untagged)]
enum RefRepr<T> {
    Id(i64),
    Nested(T),
}

impl<T: Record> RefRepr<T> {
    fn into_record(self) -> Arc<T> {
        match self {
            RefRepr::Id(id) => Arc::new(T::from_id(id)),
            RefRepr::Nested(record) => Arc::new(record),
        }
    }
}

pub(crate) fn is_unset(id: &i64) -> bool {
    *id == 0
}

/// Deserializes `null` as the type's default value.
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Single-reference fields: `Option<Arc<T>>` written as the referenced id.
pub mod one {
    use super::*;

    pub fn serialize<S, T>(
        field: &Option<Arc<T>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Record,
    {
        match field {
            Some(target) => serializer.serialize_i64(target.id()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(
        deserializer: D,
    ) -> Result<Option<Arc<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Record,
    {
        let repr = Option::<RefRepr<T>>::deserialize(deserializer)?;
        Ok(repr.map(RefRepr::into_record))
    }
}

/// Slice-of-reference fields: `Vec<Arc<T>>` written as a list of ids.
pub mod many {
    use super::*;

    pub fn serialize<S, T>(
        field: &[Arc<T>],
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Record,
    {
        let mut seq = serializer.serialize_seq(Some(field.len()))?;
        for target in field {
            seq.serialize_element(&target.id())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D, T>(
        deserializer: D,
    ) -> Result<Vec<Arc<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Record,
    {
        let repr = Option::<Vec<RefRepr<T>>>::deserialize(deserializer)?;
        Ok(repr
            .unwrap_or_default()
            .into_iter()
            .map(RefRepr::into_record)
            .collect())
    }
}

pub(crate) use many::deserialize as deserialize_many;
pub(crate) use many::serialize as serialize_many;

#[cfg(test)]
mod test {
    use crate::dcim::Manufacturer;
    use crate::dcim::Platform;
    use crate::extras::Tag;
    use crate::record::Base;
    use std::sync::Arc;

    #[test]
    fn test_reference_reads_nested_and_bare() {
        let nested: Platform = serde_json::from_str(
            r#"{
                "id": 7,
                "name": "Ubuntu",
                "slug": "ubuntu",
                "manufacturer": {
                    "id": 3,
                    "url": "https://netbox/api/dcim/manufacturers/3/",
                    "display": "Canonical",
                    "name": "Canonical",
                    "slug": "canonical"
                },
                "tags": [
                    {"id": 1, "name": "netbox-ssot", "slug": "netbox-ssot"}
                ],
                "custom_fields": {"source_name": null}
            }"#,
        )
        .unwrap();
        assert_eq!(nested.base.id, 7);
        let manufacturer = nested.manufacturer.as_ref().unwrap();
        assert_eq!(manufacturer.base.id, 3);
        assert_eq!(manufacturer.name, "Canonical");
        assert_eq!(nested.base.tags[0].id, 1);

        let bare: Platform = serde_json::from_str(
            r#"{"id": 8, "name": "Debian", "manufacturer": 3, "tags": [1, 2]}"#,
        )
        .unwrap();
        assert_eq!(bare.manufacturer.as_ref().unwrap().base.id, 3);
        assert_eq!(bare.base.tags.len(), 2);

        let null: Platform = serde_json::from_str(
            r#"{"id": 9, "name": "Other", "manufacturer": null, "tags": null}"#,
        )
        .unwrap();
        assert!(null.manufacturer.is_none());
        assert!(null.base.tags.is_empty());
    }

    #[test]
    fn test_reference_writes_ids() {
        let platform = Platform {
            base: Base {
                tags: vec![Arc::new(Tag { id: 4, ..Default::default() })],
                ..Default::default()
            },
            name: String::from("Ubuntu"),
            slug: String::from("ubuntu"),
            manufacturer: Some(Arc::new(Manufacturer {
                base: Base { id: 11, ..Default::default() },
                name: String::from("Canonical"),
                ..Default::default()
            })),
        };
        let body = serde_json::to_value(&platform).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "tags": [4],
                "description": "",
                "name": "Ubuntu",
                "slug": "ubuntu",
                "manufacturer": 11,
            })
        );
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Behavior shared by every registry record

use crate::extras::Tag;
use crate::kind::ObjectKind;
use crate::refs;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Custom field values keyed by field name.
pub type CustomFields = BTreeMap<String, serde_json::Value>;

/// Fields carried by every taggable record.
///
/// `id` is assigned by the registry on create; zero means the record has not
/// been persisted yet.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Base {
    #[serde(skip_serializing_if = "refs::is_unset")]
    pub id: i64,
    #[serde(
        serialize_with = "refs::serialize_many",
        deserialize_with = "refs::deserialize_many"
    )]
    pub tags: Vec<Arc<Tag>>,
    #[serde(deserialize_with = "refs::null_default")]
    pub description: String,
    #[serde(
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "refs::null_default"
    )]
    pub custom_fields: CustomFields,
}

impl Base {
    pub fn has_tag(&self, tag_id: i64) -> bool {
        self.tags.iter().any(|tag| tag.id == tag_id)
    }

    pub fn custom_field_str(&self, name: &str) -> Option<&str> {
        self.custom_fields
            .get(name)
            .and_then(|value| value.as_str())
            .filter(|value| !value.is_empty())
    }
}

/// A reference from one record to another, by kind and registry id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub id: i64,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, id: i64) -> ObjectRef {
        ObjectRef { kind, id }
    }

    pub fn to<T: Record>(record: &T) -> ObjectRef {
        ObjectRef { kind: T::KIND, id: record.id() }
    }
}

/// A registry record of one [`ObjectKind`].
pub trait Record:
    Clone
    + Debug
    + Default
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    const KIND: ObjectKind;

    /// The natural key the engine indexes this kind by.
    type Key: Clone + Debug + Ord + Send + Sync + 'static;

    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);

    fn natural_key(&self) -> Self::Key;

    /// A second lookup key, tried when the natural key does not match.
    fn alternate_key(&self) -> Option<String> {
        None
    }

    fn base(&self) -> Option<&Base>;

    fn base_mut(&mut self) -> Option<&mut Base>;

    /// Every record this one references, tags excluded.  These must exist
    /// before the record can be written.
    fn references(&self) -> Vec<ObjectRef>;

    /// [`Record::references`] plus references that are written after the
    /// referenced records exist, such as primary addresses.
    fn all_references(&self) -> Vec<ObjectRef> {
        self.references()
    }

    /// A record that only carries a registry id, as produced when the
    /// registry renders a reference as a bare integer.
    fn from_id(id: i64) -> Self {
        let mut record = Self::default();
        record.set_id(id);
        record
    }
}

/// Collects the references of optional single-reference fields.
pub(crate) fn refs_of<T: Record>(
    out: &mut Vec<ObjectRef>,
    field: &Option<Arc<T>>,
) {
    if let Some(target) = field {
        out.push(ObjectRef::to(target.as_ref()));
    }
}

/// Collects the references of a slice-of-reference field.
pub(crate) fn refs_of_many<T: Record>(
    out: &mut Vec<ObjectRef>,
    field: &[Arc<T>],
) {
    out.extend(field.iter().map(|target| ObjectRef::to(target.as_ref())));
}

/// Implements [`Record`] for a taggable record type with a `base` field.
macro_rules! taggable_record {
    (
        $ty:ty, $kind:expr, key = $key:ty,
        |$this:ident| $natural_key:expr,
        refs = |$rthis:ident, $out:ident| $refs:block
    ) => {
        impl $crate::record::Record for $ty {
            const KIND: $crate::kind::ObjectKind = $kind;
            type Key = $key;

            fn id(&self) -> i64 {
                self.base.id
            }

            fn set_id(&mut self, id: i64) {
                self.base.id = id;
            }

            fn natural_key(&self) -> Self::Key {
                let $this = self;
                $natural_key
            }

            fn base(&self) -> Option<&$crate::record::Base> {
                Some(&self.base)
            }

            fn base_mut(&mut self) -> Option<&mut $crate::record::Base> {
                Some(&mut self.base)
            }

            #[allow(unused_mut, unused_variables)]
            fn references(&self) -> Vec<$crate::record::ObjectRef> {
                let $rthis = self;
                let mut $out = Vec::new();
                $refs
                $out
            }
        }
    };
}

pub(crate) use taggable_record;

/// Implements [`Record`] for a reference-only kind that is identified by its
/// name and carries no base.
macro_rules! reference_record {
    ($ty:ty, $kind:expr) => {
        impl $crate::record::Record for $ty {
            const KIND: $crate::kind::ObjectKind = $kind;
            type Key = String;

            fn id(&self) -> i64 {
                self.id
            }

            fn set_id(&mut self, id: i64) {
                self.id = id;
            }

            fn natural_key(&self) -> Self::Key {
                self.name.clone()
            }

            fn base(&self) -> Option<&$crate::record::Base> {
                None
            }

            fn base_mut(&mut self) -> Option<&mut $crate::record::Base> {
                None
            }

            fn references(&self) -> Vec<$crate::record::ObjectRef> {
                Vec::new()
            }
        }
    };
}

pub(crate) use reference_record;

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structural comparison of two records of the same kind
//!
//! [`diff`] yields the minimal patch that turns `existing` into `new` as far
//! as `new` has an opinion.  Empty strings, absent options, empty reference
//! sets and null custom field values in `new` carry no opinion and leave the
//! existing value alone, unless the patch is built in reset mode.  References
//! compare by id, reference sets as sets of ids, and custom fields key by key.
//! The record's `id` is never part of a patch.

mod impls;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use ssot_types::record::CustomFields;
use ssot_types::Base;
use ssot_types::Record;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Records that can be diffed field by field.
pub trait Diff: Record {
    /// Compares the kind-specific fields of `self` against `existing`.
    /// [`Base`] fields are handled by [`diff`].
    fn diff_fields(&self, existing: &Self, patch: &mut PatchBuilder);
}

/// Returns the registry fields of `new` that differ from `existing`, with
/// values taken from `new`.  With `reset`, empty values in `new` overwrite
/// non-empty existing ones.
pub fn diff<T: Diff>(new: &T, existing: &T, reset: bool) -> Map<String, Value> {
    let mut patch = PatchBuilder::new(reset);
    if let (Some(new_base), Some(existing_base)) = (new.base(), existing.base())
    {
        patch.base(new_base, existing_base);
    }
    new.diff_fields(existing, &mut patch);
    patch.build()
}

/// Accumulates the fields of a patch.
pub struct PatchBuilder {
    reset: bool,
    patch: Map<String, Value>,
}

fn to_value<T: Serialize + ?Sized>(value: &T) -> Value {
    // Serializing model scalars cannot fail: they are strings, numbers,
    // booleans and choice values.
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn id_set<T: Record>(records: &[Arc<T>]) -> BTreeSet<i64> {
    records.iter().map(|record| record.id()).collect()
}

impl PatchBuilder {
    pub fn new(reset: bool) -> PatchBuilder {
        PatchBuilder { reset, patch: Map::new() }
    }

    pub fn build(self) -> Map<String, Value> {
        self.patch
    }

    fn set(&mut self, field: &str, value: Value) {
        self.patch.insert(field.to_owned(), value);
    }

    fn base(&mut self, new: &Base, existing: &Base) {
        self.string("description", &new.description, &existing.description);
        self.reference_set("tags", &new.tags, &existing.tags);
        self.custom_fields(&new.custom_fields, &existing.custom_fields);
    }

    /// A value every source has an opinion on: booleans, choices, ids.
    pub fn value<T>(&mut self, field: &str, new: &T, existing: &T)
    where
        T: PartialEq + Serialize,
    {
        if new != existing {
            self.set(field, to_value(new));
        }
    }

    /// A string where empty means "no opinion".
    pub fn string(&mut self, field: &str, new: &str, existing: &str) {
        if new == existing || (new.is_empty() && !self.reset) {
            return;
        }
        self.set(field, Value::String(new.to_owned()));
    }

    /// An optional scalar where `None` means "no opinion".
    pub fn option<T>(
        &mut self,
        field: &str,
        new: &Option<T>,
        existing: &Option<T>,
    ) where
        T: PartialEq + Serialize,
    {
        if new == existing || (new.is_none() && !self.reset) {
            return;
        }
        self.set(field, to_value(new));
    }

    /// A single reference, compared by the referenced record's id.
    pub fn reference<T: Record>(
        &mut self,
        field: &str,
        new: &Option<Arc<T>>,
        existing: &Option<Arc<T>>,
    ) {
        let new_id = new.as_ref().map(|record| record.id());
        let existing_id = existing.as_ref().map(|record| record.id());
        self.option(field, &new_id, &existing_id);
    }

    /// A reference that is never cleared, not even in reset mode.  Sources
    /// write it in a later pass, once the records it points at exist.
    pub fn later_reference<T: Record>(
        &mut self,
        field: &str,
        new: &Option<Arc<T>>,
        existing: &Option<Arc<T>>,
    ) {
        if new.is_some() {
            self.reference(field, new, existing);
        }
    }

    /// A set of references, compared as sets of ids.  The whole new set is
    /// written when the sets differ.
    pub fn reference_set<T: Record>(
        &mut self,
        field: &str,
        new: &[Arc<T>],
        existing: &[Arc<T>],
    ) {
        let new_ids = id_set(new);
        if new_ids == id_set(existing) || (new_ids.is_empty() && !self.reset)
        {
            return;
        }
        self.set(field, Value::from(new_ids.into_iter().collect::<Vec<_>>()));
    }

    /// A set of plain strings, compared as a set.
    pub fn string_set(
        &mut self,
        field: &str,
        new: &[String],
        existing: &[String],
    ) {
        let new_set: BTreeSet<&String> = new.iter().collect();
        let existing_set: BTreeSet<&String> = existing.iter().collect();
        if new_set == existing_set || (new_set.is_empty() && !self.reset) {
            return;
        }
        let values: Vec<String> = new_set.into_iter().cloned().collect();
        self.set(field, Value::from(values));
    }

    /// Custom fields merge: only differing sub-keys are written.
    pub fn custom_fields(
        &mut self,
        new: &CustomFields,
        existing: &CustomFields,
    ) {
        let mut changed = Map::new();
        for (name, value) in new {
            let existing_value = existing.get(name).unwrap_or(&Value::Null);
            let no_opinion = match value {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                _ => false,
            };
            if value == existing_value || (no_opinion && !self.reset) {
                continue;
            }
            changed.insert(name.clone(), value.clone());
        }
        if !changed.is_empty() {
            self.set("custom_fields", Value::Object(changed));
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory index of the records of one kind

use ssot_types::Record;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Every known record of kind `T`, by id, by natural key and by alternate
/// key, together with the ids of the managed records not yet observed this
/// run.
pub(crate) struct KindIndex<T: Record> {
    by_id: BTreeMap<i64, Arc<T>>,
    by_key: BTreeMap<T::Key, i64>,
    by_alt: BTreeMap<String, i64>,
    orphans: BTreeSet<i64>,
}

impl<T: Record> KindIndex<T> {
    pub fn new() -> KindIndex<T> {
        KindIndex {
            by_id: BTreeMap::new(),
            by_key: BTreeMap::new(),
            by_alt: BTreeMap::new(),
            orphans: BTreeSet::new(),
        }
    }

    /// Loads the registry's records at startup.  Records carrying
    /// `owner_tag` start out as orphans.  When several records share a key,
    /// the first keeps it; the others remain reachable by id only.
    pub fn load(&mut self, records: Vec<T>, owner_tag: i64) {
        for record in records {
            let id = record.id();
            if record.base().is_some_and(|base| base.has_tag(owner_tag)) {
                self.orphans.insert(id);
            }
            self.by_key.entry(record.natural_key()).or_insert(id);
            if let Some(alt) = record.alternate_key() {
                self.by_alt.entry(alt).or_insert(id);
            }
            self.by_id.insert(id, Arc::new(record));
        }
    }

    pub fn get(&self, id: i64) -> Option<&Arc<T>> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn get_by_key(&self, key: &T::Key) -> Option<&Arc<T>> {
        self.by_key.get(key).and_then(|id| self.by_id.get(id))
    }

    /// The existing record `new` denotes: the one with its natural key, or
    /// failing that the one with its alternate key.
    pub fn find(&self, new: &T) -> Option<&Arc<T>> {
        self.get_by_key(&new.natural_key()).or_else(|| {
            new.alternate_key()
                .and_then(|alt| self.by_alt.get(&alt))
                .and_then(|id| self.by_id.get(id))
        })
    }

    /// Installs the registry's current version of a record, moving its key
    /// entries if they changed.
    pub fn install(&mut self, record: T) -> Arc<T> {
        let id = record.id();
        if let Some(previous) = self.by_id.get(&id) {
            let old_key = previous.natural_key();
            if self.by_key.get(&old_key) == Some(&id) {
                self.by_key.remove(&old_key);
            }
            if let Some(old_alt) = previous.alternate_key() {
                if self.by_alt.get(&old_alt) == Some(&id) {
                    self.by_alt.remove(&old_alt);
                }
            }
        }
        self.by_key.insert(record.natural_key(), id);
        if let Some(alt) = record.alternate_key() {
            self.by_alt.insert(alt, id);
        }
        let record = Arc::new(record);
        self.by_id.insert(id, Arc::clone(&record));
        record
    }

    pub fn remove(&mut self, id: i64) -> Option<Arc<T>> {
        let record = self.by_id.remove(&id)?;
        let key = record.natural_key();
        if self.by_key.get(&key) == Some(&id) {
            self.by_key.remove(&key);
        }
        if let Some(alt) = record.alternate_key() {
            if self.by_alt.get(&alt) == Some(&id) {
                self.by_alt.remove(&alt);
            }
        }
        self.orphans.remove(&id);
        Some(record)
    }

    /// Records that the run has observed record `id`.
    pub fn mark_seen(&mut self, id: i64) {
        self.orphans.remove(&id);
    }

    pub fn is_orphan(&self, id: i64) -> bool {
        self.orphans.contains(&id)
    }

    pub fn records(&self) -> impl Iterator<Item = &Arc<T>> + '_ {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ssot_types::dcim::Device;
    use ssot_types::dcim::Site;
    use ssot_types::extras::Tag;
    use ssot_types::Base;
    use serde_json::json;

    fn device(id: i64, site: i64, name: &str, uuid: Option<&str>) -> Device {
        let mut device = Device {
            base: Base { id, ..Default::default() },
            name: name.to_owned(),
            site: Some(Arc::new(Site::from_id(site))),
            ..Default::default()
        };
        if let Some(uuid) = uuid {
            device.base.custom_fields.insert(
                String::from("device_uuid"),
                json!(uuid),
            );
        }
        device
    }

    #[test]
    fn test_load_marks_owned_records_as_orphans() {
        let mut index = KindIndex::new();
        let mut owned = device(1, 5, "h1", None);
        owned.base.tags.push(Arc::new(Tag { id: 9, ..Default::default() }));
        index.load(vec![owned, device(2, 5, "h2", None)], 9);
        assert!(index.is_orphan(1));
        assert!(!index.is_orphan(2));
        index.mark_seen(1);
        assert!(!index.is_orphan(1));
    }

    #[test]
    fn test_first_record_keeps_a_duplicate_key() {
        let mut index = KindIndex::new();
        index.load(vec![device(1, 5, "h1", None), device(2, 5, "h1", None)], 9);
        assert_eq!(index.len(), 2);
        let found = index.get_by_key(&(5, String::from("h1"))).unwrap();
        assert_eq!(found.base.id, 1);
    }

    #[test]
    fn test_alternate_key_lookup_and_reinstall() {
        let mut index = KindIndex::new();
        index.load(vec![device(1, 5, "old-name", Some("uuid-1"))], 9);

        // Same machine reported under a new name.
        let renamed = device(0, 5, "new-name", Some("uuid-1"));
        assert_eq!(index.find(&renamed).unwrap().base.id, 1);

        index.install(device(1, 5, "new-name", Some("uuid-1")));
        assert!(index.get_by_key(&(5, String::from("old-name"))).is_none());
        assert_eq!(
            index.get_by_key(&(5, String::from("new-name"))).unwrap().base.id,
            1
        );

        index.remove(1);
        assert!(index.find(&renamed).is_none());
        assert_eq!(index.len(), 0);
    }
}

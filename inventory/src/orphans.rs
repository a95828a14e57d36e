// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The end-of-run sweep over records no source observed

use crate::engine::with_kind;
use crate::engine::Counters;
use crate::engine::Indexed;
use crate::engine::Inventory;
use crate::engine::Writer;
use crate::error::InventoryError;
use crate::error::RegistryOp;
use chrono::DateTime;
use chrono::Utc;
use netbox_client::patch_typed;
use serde_json::Map;
use serde_json::Value;
use slog::debug;
use slog::info;
use slog::warn;
use ssot_common::InlineErrorChain;
use ssot_types::constants::*;
use ssot_types::extras::Tag;
use ssot_types::ipam::IpAddress;
use ssot_types::ObjectKind;
use ssot_types::ObjectRef;

use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// The sources whose records the sweep may touch, by tag id.
///
/// Only records carrying the tag of a source that succeeded are candidates,
/// and a record carrying the tag of any source that failed is left alone.
#[derive(Clone, Debug, Default)]
pub struct CleanupScope {
    pub succeeded: Vec<i64>,
    pub failed: Vec<i64>,
}

/// What the sweep did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: u64,
    /// Orphans kept because a record that stays still references them.
    pub kept_referenced: u64,
    /// Orphans tagged rather than deleted.
    pub tagged: u64,
    /// Orphaned ARP-learned addresses still within their grace period.
    pub arp_retained: u64,
    /// Deletes the registry refused.
    pub failed: u64,
}

/// One record as the sweep sees it.
struct Entry {
    target: ObjectRef,
    key: String,
    references: Vec<ObjectRef>,
    tags: Vec<i64>,
    candidate: bool,
    arp: Option<ArpState>,
}

enum ArpState {
    /// Orphaned for the first time; carries no timestamp yet.
    Unstamped,
    Since(DateTime<Utc>),
}

impl Inventory {
    /// Deletes the managed records no source observed this run, or tags them
    /// with the orphan tag if orphan removal is disabled.
    ///
    /// Kinds are swept leaves first and ids in ascending order within a
    /// kind.  A record that a kept record references is kept too.  A delete
    /// the registry refuses is logged and counted; only an error that makes
    /// the registry unusable ends the sweep.
    pub async fn remove_orphans(
        &self,
        scope: &CleanupScope,
    ) -> Result<CleanupReport, InventoryError> {
        let mut report = CleanupReport::default();
        let mut entries = Vec::new();
        for kind in ObjectKind::cleanup_order() {
            with_kind!(
                kind,
                |T| self.snapshot::<T>(scope, &mut entries).await,
                unmanaged => ()
            );
        }

        if !self.config.remove_orphans {
            return self.tag_orphans(entries, report).await;
        }

        self.retain_arp_entries(&mut entries, &mut report).await?;
        let doomed = reference_guard(&entries, &mut report);
        debug!(self.log, "orphan sweep";
            "candidates" => entries.iter().filter(|e| e.candidate).count(),
            "doomed" => doomed.len(),
        );

        // Targets the registry refused to release, and what they reference.
        let mut pinned: BTreeSet<ObjectRef> = BTreeSet::new();
        for entry in delete_order(&entries, &doomed) {
            if pinned.contains(&entry.target) {
                pinned.extend(entry.references.iter().copied());
                report.kept_referenced += 1;
                continue;
            }
            let ObjectRef { kind, id } = entry.target;
            match self.registry.delete(kind, id).await {
                Ok(()) => {
                    with_kind!(
                        kind,
                        |T| {
                            T::store(self).lock().await.remove(id);
                        },
                        unmanaged => ()
                    );
                    Counters::bump(&self.counters.deleted);
                    report.deleted += 1;
                    info!(self.log, "deleted";
                        "kind" => %kind,
                        "key" => &entry.key,
                        "id" => id,
                    );
                }
                Err(error) if error.is_fatal() => {
                    return Err(InventoryError::registry(
                        kind,
                        RegistryOp::Delete,
                        error,
                    ));
                }
                Err(error) => {
                    let error = InventoryError::registry(
                        kind,
                        RegistryOp::Delete,
                        error,
                    );
                    warn!(self.log, "failed to delete orphan";
                        "kind" => %kind,
                        "key" => &entry.key,
                        "id" => id,
                        "error" => InlineErrorChain::new(&error),
                    );
                    pinned.extend(entry.references.iter().copied());
                    report.failed += 1;
                }
            }
        }
        info!(self.log, "orphan sweep done";
            "deleted" => report.deleted,
            "kept_referenced" => report.kept_referenced,
            "arp_retained" => report.arp_retained,
            "failed" => report.failed,
        );
        Ok(report)
    }

    async fn snapshot<T: Indexed>(
        &self,
        scope: &CleanupScope,
        entries: &mut Vec<Entry>,
    ) {
        let engine_tag = self.engine_tag().id;
        let index = T::store(self).lock().await;
        for record in index.records() {
            let Some(base) = record.base() else {
                continue;
            };
            let tags: Vec<i64> = base.tags.iter().map(|tag| tag.id).collect();
            let candidate = index.is_orphan(record.id())
                && tags.contains(&engine_tag)
                && tags.iter().any(|tag| scope.succeeded.contains(tag))
                && !tags.iter().any(|tag| scope.failed.contains(tag));
            let arp = (T::KIND == ObjectKind::IpAddress
                && base.custom_fields.get(CUSTOM_FIELD_ARP_ENTRY)
                    == Some(&Value::Bool(true)))
            .then(|| {
                match base.custom_field_str(CUSTOM_FIELD_ORPHAN_LAST_SEEN) {
                    Some(since) => DateTime::parse_from_rfc3339(since)
                        .map(|since| ArpState::Since(since.with_timezone(&Utc)))
                        .unwrap_or(ArpState::Unstamped),
                    None => ArpState::Unstamped,
                }
            });
            entries.push(Entry {
                target: ObjectRef::to(record.as_ref()),
                key: format!("{:?}", record.natural_key()),
                references: record.all_references(),
                tags,
                candidate,
                arp,
            });
        }
    }

    /// Withdraws ARP-learned addresses from the sweep while they are within
    /// their grace period, stamping those orphaned for the first time.
    async fn retain_arp_entries(
        &self,
        entries: &mut [Entry],
        report: &mut CleanupReport,
    ) -> Result<(), InventoryError> {
        let span = self.config.arp_data_life_span;
        if span.is_zero() {
            return Ok(());
        }
        let span = chrono::Duration::from_std(span)
            .unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        for entry in entries.iter_mut().filter(|e| e.candidate) {
            let Some(arp) = &entry.arp else {
                continue;
            };
            match arp {
                ArpState::Since(since) if now - *since >= span => continue,
                ArpState::Since(_) => {}
                ArpState::Unstamped => {
                    let mut fields = Map::new();
                    fields.insert(
                        CUSTOM_FIELD_ORPHAN_LAST_SEEN.to_owned(),
                        Value::from(now.to_rfc3339()),
                    );
                    let mut patch = Map::new();
                    patch.insert(
                        String::from("custom_fields"),
                        Value::Object(fields),
                    );
                    self.patch_installed::<IpAddress>(entry.target.id, &patch)
                        .await?;
                    debug!(self.log, "stamped orphaned arp entry";
                        "key" => &entry.key,
                        "id" => entry.target.id,
                    );
                }
            }
            entry.candidate = false;
            report.arp_retained += 1;
        }
        Ok(())
    }

    async fn tag_orphans(
        &self,
        entries: Vec<Entry>,
        mut report: CleanupReport,
    ) -> Result<CleanupReport, InventoryError> {
        let candidates: Vec<&Entry> =
            entries.iter().filter(|e| e.candidate).collect();
        if candidates.is_empty() {
            return Ok(report);
        }
        let orphan_tag = self
            .add_tag(
                &Writer::engine(),
                Tag {
                    name: ORPHAN_TAG.to_owned(),
                    color: ORPHAN_TAG_COLOR.to_owned(),
                    description: ORPHAN_TAG_DESCRIPTION.to_owned(),
                    ..Default::default()
                },
            )
            .await?;
        for entry in candidates {
            if entry.tags.contains(&orphan_tag.id) {
                continue;
            }
            let mut tags = entry.tags.clone();
            tags.push(orphan_tag.id);
            tags.sort_unstable();
            let mut patch = Map::new();
            patch.insert(String::from("tags"), Value::from(tags));
            let ObjectRef { kind, id } = entry.target;
            with_kind!(
                kind,
                |T| self.patch_installed::<T>(id, &patch).await?,
                unmanaged => ()
            );
            info!(self.log, "tagged orphan";
                "kind" => %kind,
                "key" => &entry.key,
                "id" => id,
            );
            report.tagged += 1;
        }
        Ok(report)
    }

    async fn patch_installed<T: Indexed>(
        &self,
        id: i64,
        patch: &Map<String, Value>,
    ) -> Result<(), InventoryError> {
        let updated: T = patch_typed(self.registry.as_ref(), id, patch)
            .await
            .map_err(|e| {
                InventoryError::registry(T::KIND, RegistryOp::Patch, e)
            })?;
        T::store(self).lock().await.install(updated);
        Ok(())
    }
}

/// The candidates that no kept record references, directly or through
/// other kept records.
fn reference_guard(
    entries: &[Entry],
    report: &mut CleanupReport,
) -> BTreeSet<ObjectRef> {
    let by_target: BTreeMap<ObjectRef, &Entry> =
        entries.iter().map(|e| (e.target, e)).collect();
    let mut doomed: BTreeSet<ObjectRef> =
        entries.iter().filter(|e| e.candidate).map(|e| e.target).collect();
    let mut pending: Vec<ObjectRef> = entries
        .iter()
        .filter(|e| !doomed.contains(&e.target))
        .flat_map(|e| e.references.iter().copied())
        .collect();
    while let Some(target) = pending.pop() {
        if doomed.remove(&target) {
            report.kept_referenced += 1;
            if let Some(entry) = by_target.get(&target) {
                pending.extend(entry.references.iter().copied());
            }
        }
    }
    doomed
}

/// The doomed entries in delete order: kinds as swept, and within a kind
/// every record ahead of the records of that kind it references.
fn delete_order<'a>(
    entries: &'a [Entry],
    doomed: &BTreeSet<ObjectRef>,
) -> Vec<&'a Entry> {
    let mut order = Vec::with_capacity(doomed.len());
    let mut rest = entries;
    while let Some(first) = rest.first() {
        let kind = first.target.kind;
        let end = rest
            .iter()
            .position(|e| e.target.kind != kind)
            .unwrap_or(rest.len());
        let (group, tail) = rest.split_at(end);
        order.extend(referrers_first(
            group.iter().filter(|e| doomed.contains(&e.target)).collect(),
        ));
        rest = tail;
    }
    order
}

/// Orders records of one kind so that none precedes a record referencing
/// it.  Ids stay ascending among records that are free to go.
fn referrers_first(mut pending: Vec<&Entry>) -> Vec<&Entry> {
    let mut order = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let held: BTreeSet<ObjectRef> = pending
            .iter()
            .flat_map(|e| e.references.iter().copied())
            .collect();
        let (free, held_back): (Vec<&Entry>, Vec<&Entry>) =
            pending.into_iter().partition(|e| !held.contains(&e.target));
        if free.is_empty() {
            // A reference cycle; the registry decides.
            order.extend(held_back);
            break;
        }
        order.extend(free);
        pending = held_back;
    }
    order
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(
        kind: ObjectKind,
        id: i64,
        candidate: bool,
        references: &[ObjectRef],
    ) -> Entry {
        Entry {
            target: ObjectRef::new(kind, id),
            key: id.to_string(),
            references: references.to_vec(),
            tags: Vec::new(),
            candidate,
            arp: None,
        }
    }

    #[test]
    fn test_reference_guard_reaches_fixed_point() {
        let site = ObjectRef::new(ObjectKind::Site, 1);
        let device = ObjectRef::new(ObjectKind::Device, 2);
        let interface = ObjectRef::new(ObjectKind::Interface, 3);
        let entries = vec![
            // A kept address holds the interface, which holds the device,
            // which holds the site.
            entry(ObjectKind::IpAddress, 4, false, &[interface]),
            entry(ObjectKind::Interface, 3, true, &[device]),
            entry(ObjectKind::Device, 2, true, &[site]),
            entry(ObjectKind::Site, 1, true, &[]),
            entry(ObjectKind::Vlan, 5, true, &[site]),
        ];
        let mut report = CleanupReport::default();
        let doomed = reference_guard(&entries, &mut report);
        assert_eq!(
            doomed.into_iter().collect::<Vec<_>>(),
            vec![ObjectRef::new(ObjectKind::Vlan, 5)]
        );
        assert_eq!(report.kept_referenced, 3);
    }

    #[test]
    fn test_delete_order_puts_children_before_parents() {
        let bond = ObjectRef::new(ObjectKind::Interface, 1);
        let vlan = ObjectRef::new(ObjectKind::Interface, 3);
        let device = ObjectRef::new(ObjectKind::Device, 9);
        let entries = vec![
            // eth0 (2) is a lag member of bond0 (1); bond0.100 (3) hangs
            // off bond0 and has a child of its own (4).
            entry(ObjectKind::Interface, 1, true, &[device]),
            entry(ObjectKind::Interface, 2, true, &[device, bond]),
            entry(ObjectKind::Interface, 3, true, &[device, bond]),
            entry(ObjectKind::Interface, 4, true, &[device, vlan]),
            entry(ObjectKind::Interface, 5, false, &[device]),
            entry(ObjectKind::Device, 9, true, &[]),
        ];
        let doomed: BTreeSet<ObjectRef> = entries
            .iter()
            .filter(|e| e.target.id != 5 && e.target.id != 9)
            .map(|e| e.target)
            .collect();
        let order: Vec<i64> = delete_order(&entries, &doomed)
            .into_iter()
            .map(|e| e.target.id)
            .collect();
        assert_eq!(order, [2, 4, 3, 1]);
    }

    #[test]
    fn test_reference_guard_frees_unreferenced_chains() {
        let vm = ObjectRef::new(ObjectKind::VirtualMachine, 1);
        let entries = vec![
            entry(ObjectKind::VmInterface, 2, true, &[vm]),
            entry(ObjectKind::VirtualMachine, 1, true, &[]),
        ];
        let mut report = CleanupReport::default();
        let doomed = reference_guard(&entries, &mut report);
        assert_eq!(doomed.len(), 2);
        assert_eq!(report.kept_referenced, 0);
    }
}

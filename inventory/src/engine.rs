// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The reconciling inventory engine

use crate::diff::diff;
use crate::diff::Diff;
use crate::error::InventoryError;
use crate::error::RegistryOp;
use crate::index::KindIndex;
use crate::priority::SourcePriority;
use netbox_client::create_typed;
use netbox_client::list_typed;
use netbox_client::patch_typed;
use netbox_client::ListFilter;
use netbox_client::RegistryApi;
use serde_json::Map;
use serde_json::Value;
use slog::debug;
use slog::info;
use slog::o;
use slog::Logger;
use ssot_types::choice::CustomFieldType;
use ssot_types::constants::*;
use ssot_types::dcim::Device;
use ssot_types::dcim::DeviceRole;
use ssot_types::dcim::DeviceType;
use ssot_types::dcim::Interface;
use ssot_types::dcim::Manufacturer;
use ssot_types::dcim::Platform;
use ssot_types::dcim::Site;
use ssot_types::dcim::VirtualDeviceContext;
use ssot_types::extras::CustomField;
use ssot_types::extras::Tag;
use ssot_types::ipam::IpAddress;
use ssot_types::ipam::Prefix;
use ssot_types::ipam::Vlan;
use ssot_types::ipam::VlanGroup;
use ssot_types::tenancy::Tenant;
use ssot_types::virtualization::Cluster;
use ssot_types::virtualization::ClusterGroup;
use ssot_types::virtualization::ClusterType;
use ssot_types::virtualization::VirtualMachine;
use ssot_types::virtualization::VmInterface;
use ssot_types::Base;
use ssot_types::ObjectKind;
use ssot_types::ObjectRef;
use ssot_types::Record;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Engine-wide settings, taken from the `netbox` section of the
/// configuration.
#[derive(Clone, Debug)]
pub struct InventoryConfig {
    /// Name of the tag marking every record the engine manages.
    pub engine_tag: String,
    pub engine_tag_color: String,
    /// Delete orphans at the end of the run, rather than tag them.
    pub remove_orphans: bool,
    /// How long an orphaned ARP-learned address is kept.  Zero disables the
    /// grace period.
    pub arp_data_life_span: Duration,
    /// Source names, highest priority first.
    pub source_priority: Vec<String>,
}

impl Default for InventoryConfig {
    fn default() -> InventoryConfig {
        InventoryConfig {
            engine_tag: DEFAULT_ENGINE_TAG.to_owned(),
            engine_tag_color: DEFAULT_ENGINE_TAG_COLOR.to_owned(),
            remove_orphans: true,
            arp_data_life_span: Duration::ZERO,
            source_priority: Vec::new(),
        }
    }
}

/// On whose behalf a record is written.
///
/// A source writer stamps the records it creates with its name and tags.
/// The engine writer is used for the records the engine itself needs and
/// ranks below every source.
#[derive(Clone, Debug, Default)]
pub struct Writer {
    source: Option<String>,
    tags: Vec<Arc<Tag>>,
}

impl Writer {
    pub fn engine() -> Writer {
        Writer::default()
    }

    pub fn for_source(name: &str, tags: Vec<Arc<Tag>>) -> Writer {
        Writer { source: Some(name.to_owned()), tags }
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn tags(&self) -> &[Arc<Tag>] {
        &self.tags
    }

    pub(crate) fn label(&self) -> &str {
        self.source().unwrap_or("engine")
    }
}

/// Counts of registry writes and no-op adds over the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub deleted: u64,
}

#[derive(Default)]
pub(crate) struct Counters {
    created: AtomicU64,
    updated: AtomicU64,
    unchanged: AtomicU64,
    pub(crate) deleted: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Managed record types, each with its index inside the [`Inventory`].
pub(crate) trait Indexed: Diff {
    fn store(inventory: &Inventory) -> &Mutex<KindIndex<Self>>;
}

macro_rules! stores {
    ($($field:ident: $ty:ty,)+) => {
        struct Stores {
            $($field: Mutex<KindIndex<$ty>>,)+
        }

        impl Stores {
            fn new() -> Stores {
                Stores { $($field: Mutex::new(KindIndex::new()),)+ }
            }
        }

        $(
            impl Indexed for $ty {
                fn store(inventory: &Inventory) -> &Mutex<KindIndex<$ty>> {
                    &inventory.stores.$field
                }
            }
        )+
    };
}

stores! {
    tags: Tag,
    custom_fields: CustomField,
    tenants: Tenant,
    sites: Site,
    manufacturers: Manufacturer,
    platforms: Platform,
    device_types: DeviceType,
    device_roles: DeviceRole,
    cluster_groups: ClusterGroup,
    cluster_types: ClusterType,
    clusters: Cluster,
    vlan_groups: VlanGroup,
    vlans: Vlan,
    devices: Device,
    vdcs: VirtualDeviceContext,
    interfaces: Interface,
    vms: VirtualMachine,
    vm_interfaces: VmInterface,
    prefixes: Prefix,
    ip_addresses: IpAddress,
}

/// Evaluates `$body` with `$t` naming the record type of `$kind`, or
/// `$unmanaged` for kinds the engine does not index.
macro_rules! with_kind {
    ($kind:expr, |$t:ident| $body:expr, unmanaged => $unmanaged:expr) => {
        match $kind {
            ::ssot_types::ObjectKind::Tag => {
                type $t = ::ssot_types::extras::Tag;
                $body
            }
            ::ssot_types::ObjectKind::CustomField => {
                type $t = ::ssot_types::extras::CustomField;
                $body
            }
            ::ssot_types::ObjectKind::Tenant => {
                type $t = ::ssot_types::tenancy::Tenant;
                $body
            }
            ::ssot_types::ObjectKind::Site => {
                type $t = ::ssot_types::dcim::Site;
                $body
            }
            ::ssot_types::ObjectKind::Manufacturer => {
                type $t = ::ssot_types::dcim::Manufacturer;
                $body
            }
            ::ssot_types::ObjectKind::Platform => {
                type $t = ::ssot_types::dcim::Platform;
                $body
            }
            ::ssot_types::ObjectKind::DeviceType => {
                type $t = ::ssot_types::dcim::DeviceType;
                $body
            }
            ::ssot_types::ObjectKind::DeviceRole => {
                type $t = ::ssot_types::dcim::DeviceRole;
                $body
            }
            ::ssot_types::ObjectKind::ClusterGroup => {
                type $t = ::ssot_types::virtualization::ClusterGroup;
                $body
            }
            ::ssot_types::ObjectKind::ClusterType => {
                type $t = ::ssot_types::virtualization::ClusterType;
                $body
            }
            ::ssot_types::ObjectKind::Cluster => {
                type $t = ::ssot_types::virtualization::Cluster;
                $body
            }
            ::ssot_types::ObjectKind::VlanGroup => {
                type $t = ::ssot_types::ipam::VlanGroup;
                $body
            }
            ::ssot_types::ObjectKind::Vlan => {
                type $t = ::ssot_types::ipam::Vlan;
                $body
            }
            ::ssot_types::ObjectKind::Device => {
                type $t = ::ssot_types::dcim::Device;
                $body
            }
            ::ssot_types::ObjectKind::VirtualDeviceContext => {
                type $t = ::ssot_types::dcim::VirtualDeviceContext;
                $body
            }
            ::ssot_types::ObjectKind::Interface => {
                type $t = ::ssot_types::dcim::Interface;
                $body
            }
            ::ssot_types::ObjectKind::VirtualMachine => {
                type $t = ::ssot_types::virtualization::VirtualMachine;
                $body
            }
            ::ssot_types::ObjectKind::VmInterface => {
                type $t = ::ssot_types::virtualization::VmInterface;
                $body
            }
            ::ssot_types::ObjectKind::Prefix => {
                type $t = ::ssot_types::ipam::Prefix;
                $body
            }
            ::ssot_types::ObjectKind::IpAddress => {
                type $t = ::ssot_types::ipam::IpAddress;
                $body
            }
            ::ssot_types::ObjectKind::Region
            | ::ssot_types::ObjectKind::TenantGroup
            | ::ssot_types::ObjectKind::Vrf => $unmanaged,
        }
    };
}

pub(crate) use with_kind;

/// The engine's view of the registry for one run.
///
/// Every managed kind has its own index behind its own lock.  An add holds
/// at most one lock at a time: the locks of referenced kinds are taken
/// briefly and in ascending [`ObjectKind`] order to check prerequisites,
/// then the record's own lock is held across the registry write, which
/// makes each add atomic with respect to its kind.
pub struct Inventory {
    pub(crate) log: Logger,
    pub(crate) registry: Arc<dyn RegistryApi>,
    pub(crate) config: InventoryConfig,
    priority: SourcePriority,
    engine_tag: Arc<Tag>,
    stores: Stores,
    pub(crate) counters: Counters,
}

fn dedup_tags(tags: impl IntoIterator<Item = Arc<Tag>>) -> Vec<Arc<Tag>> {
    let mut seen = BTreeSet::new();
    tags.into_iter().filter(|tag| seen.insert(tag.id)).collect()
}

/// Adds the given sub-keys to the `custom_fields` entry of `patch`.
fn extend_custom_fields(
    patch: &mut Map<String, Value>,
    fields: Map<String, Value>,
) {
    if fields.is_empty() {
        return;
    }
    let entry = patch
        .entry(String::from("custom_fields"))
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(existing) = entry {
        existing.extend(fields);
    }
}

impl Inventory {
    /// Loads every managed kind from the registry and makes sure the
    /// records the engine relies on exist: the engine tag, the custom fields
    /// it writes, and the default device roles.
    pub async fn bootstrap(
        log: &Logger,
        registry: Arc<dyn RegistryApi>,
        config: InventoryConfig,
    ) -> Result<Inventory, InventoryError> {
        let log = log.new(o!("component" => "inventory"));
        let desired_tag = Tag {
            name: config.engine_tag.clone(),
            slug: ssot_types::slugify(&config.engine_tag),
            color: config.engine_tag_color.clone(),
            description: ENGINE_TAG_DESCRIPTION.to_owned(),
            ..Default::default()
        };

        // Everything else is indexed relative to the engine tag, so it is
        // resolved before the engine exists.
        let tags: Vec<Tag> = list_typed(registry.as_ref(), &ListFilter::new())
            .await
            .map_err(|e| {
                InventoryError::registry(ObjectKind::Tag, RegistryOp::List, e)
            })?;
        let counters = Counters::default();
        let engine_tag = match tags.iter().find(|t| t.name == desired_tag.name)
        {
            Some(tag) => tag.clone(),
            None => {
                let created = create_typed(registry.as_ref(), &desired_tag)
                    .await
                    .map_err(|e| {
                        InventoryError::registry(
                            ObjectKind::Tag,
                            RegistryOp::Create,
                            e,
                        )
                    })?;
                info!(log, "created";
                    "kind" => %ObjectKind::Tag,
                    "key" => &created.name,
                    "id" => created.id,
                    "source" => "engine",
                );
                Counters::bump(&counters.created);
                created
            }
        };

        let inventory = Inventory {
            log,
            registry,
            priority: SourcePriority::new(&config.source_priority),
            config,
            engine_tag: Arc::new(engine_tag.clone()),
            stores: Stores::new(),
            counters,
        };
        {
            let mut index = inventory.stores.tags.lock().await;
            index.load(tags, engine_tag.id);
            index.install(engine_tag);
        }
        for kind in ObjectKind::managed().filter(|k| *k != ObjectKind::Tag) {
            with_kind!(kind, |T| inventory.load::<T>().await?, unmanaged => ());
        }

        let writer = Writer::engine();
        inventory.add_tag(&writer, desired_tag).await?;
        inventory.ensure_custom_fields(&writer).await?;
        inventory.ensure_default_roles(&writer).await?;
        info!(inventory.log, "inventory loaded";
            "engine_tag" => &inventory.engine_tag.name,
            "engine_tag_id" => inventory.engine_tag.id,
        );
        Ok(inventory)
    }

    async fn load<T: Indexed>(&self) -> Result<(), InventoryError> {
        let records: Vec<T> =
            list_typed(self.registry.as_ref(), &ListFilter::new())
                .await
                .map_err(|e| {
                    InventoryError::registry(T::KIND, RegistryOp::List, e)
                })?;
        let mut index = T::store(self).lock().await;
        index.load(records, self.engine_tag.id);
        debug!(self.log, "loaded records";
            "kind" => %T::KIND,
            "count" => index.len(),
        );
        Ok(())
    }

    async fn ensure_custom_fields(
        &self,
        writer: &Writer,
    ) -> Result<(), InventoryError> {
        let taggable: Vec<ObjectKind> =
            ObjectKind::managed().filter(ObjectKind::is_taggable).collect();
        let fields = [
            CustomField::for_kinds(
                CUSTOM_FIELD_SOURCE_NAME,
                "Source name",
                CustomFieldType::Text,
                taggable.clone(),
                "Name of the source that last wrote this object",
            ),
            CustomField::for_kinds(
                CUSTOM_FIELD_SOURCE_ID,
                "Source ID",
                CustomFieldType::Text,
                taggable,
                "Identifier of this object in its source",
            ),
            CustomField::for_kinds(
                CUSTOM_FIELD_DEVICE_UUID,
                "Device UUID",
                CustomFieldType::Text,
                [ObjectKind::Device],
                "Unique identifier of the device in its source",
            ),
            CustomField::for_kinds(
                CUSTOM_FIELD_HOST_CPU_CORES,
                "Host CPU cores",
                CustomFieldType::Integer,
                [ObjectKind::Device],
                "Number of CPU cores of the host",
            ),
            CustomField::for_kinds(
                CUSTOM_FIELD_HOST_MEMORY,
                "Host memory",
                CustomFieldType::Text,
                [ObjectKind::Device],
                "Amount of memory of the host",
            ),
            CustomField::for_kinds(
                CUSTOM_FIELD_ARP_ENTRY,
                "ARP entry",
                CustomFieldType::Boolean,
                [ObjectKind::IpAddress],
                "Address learned from an ARP table",
            ),
            CustomField::for_kinds(
                CUSTOM_FIELD_ORPHAN_LAST_SEEN,
                "Orphan last seen",
                CustomFieldType::DateTime,
                [ObjectKind::IpAddress],
                "When the address was first found orphaned",
            ),
        ];
        for field in fields {
            self.add_custom_field(writer, field).await?;
        }
        Ok(())
    }

    async fn ensure_default_roles(
        &self,
        writer: &Writer,
    ) -> Result<(), InventoryError> {
        for (name, color, vm_role) in [
            (ROLE_SERVER, ROLE_SERVER_COLOR, true),
            (ROLE_FIREWALL, ROLE_FIREWALL_COLOR, false),
            (ROLE_SWITCH, ROLE_SWITCH_COLOR, false),
        ] {
            let role = DeviceRole {
                name: name.to_owned(),
                color: color.to_owned(),
                vm_role,
                ..Default::default()
            };
            self.add_device_role(writer, role).await?;
        }
        Ok(())
    }

    pub fn engine_tag(&self) -> &Arc<Tag> {
        &self.engine_tag
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    pub fn stats(&self) -> Stats {
        Stats {
            created: self.counters.created.load(Ordering::Relaxed),
            updated: self.counters.updated.load(Ordering::Relaxed),
            unchanged: self.counters.unchanged.load(Ordering::Relaxed),
            deleted: self.counters.deleted.load(Ordering::Relaxed),
        }
    }

    pub(crate) async fn get<T: Indexed>(&self, key: &T::Key) -> Option<Arc<T>> {
        T::store(self).lock().await.get_by_key(key).cloned()
    }

    pub(crate) async fn get_by_id<T: Indexed>(
        &self,
        id: i64,
    ) -> Option<Arc<T>> {
        T::store(self).lock().await.get(id).cloned()
    }

    async fn contains(&self, target: ObjectRef) -> bool {
        with_kind!(
            target.kind,
            |T| T::store(self).lock().await.contains(target.id),
            unmanaged => true
        )
    }

    pub(crate) async fn tag_id(&self, name: &str) -> Option<i64> {
        self.stores.tags.lock().await.get_by_key(&name.to_owned()).map(|t| t.id)
    }

    /// Converts custom field values to the registered type of their field.
    async fn coerce_custom_fields<T: Record>(&self, record: &mut T) {
        let Some(base) = record.base_mut() else {
            return;
        };
        if base.custom_fields.is_empty() {
            return;
        }
        let fields = self.stores.custom_fields.lock().await;
        for (name, value) in base.custom_fields.iter_mut() {
            if let Some(field) = fields.get_by_key(name) {
                *value = field.field_type.coerce(std::mem::take(value));
            }
        }
    }

    /// Fails unless every record `record` references, tags included, is
    /// persisted and known to the engine.
    async fn check_prerequisites<T: Record>(
        &self,
        record: &T,
    ) -> Result<(), InventoryError> {
        let mut targets = record.references();
        if let Some(base) = record.base() {
            targets.extend(
                base.tags.iter().map(|tag| ObjectRef::to(tag.as_ref())),
            );
        }
        // Ascending kind order is the lock order.
        targets.sort();
        targets.dedup();
        for target in targets {
            if target.id <= 0 || !self.contains(target).await {
                return Err(InventoryError::MissingPrerequisite {
                    kind: T::KIND,
                    key: format!("{:?}", record.natural_key()),
                    missing: target,
                });
            }
        }
        Ok(())
    }

    /// The uniform add operation behind every `add_*`.
    ///
    /// Creates `new` if no record with its key exists.  Otherwise patches the
    /// existing record with the fields of `new` that differ, subject to
    /// source priority, or leaves it alone if nothing differs.  Either way
    /// the record counts as observed for this run.
    pub(crate) async fn add<T: Indexed>(
        &self,
        writer: &Writer,
        mut new: T,
    ) -> Result<Arc<T>, InventoryError> {
        self.coerce_custom_fields(&mut new).await;
        self.check_prerequisites(&new).await?;
        let orphan_tag = self.tag_id(ORPHAN_TAG).await;

        let mut index = T::store(self).lock().await;
        let Some(existing) = index.find(&new).cloned() else {
            return self.create(&mut index, writer, new).await;
        };
        index.mark_seen(existing.id());

        let key = existing.natural_key();
        let stamp = existing
            .base()
            .and_then(|base| base.custom_field_str(CUSTOM_FIELD_SOURCE_NAME));
        if self.priority.suppresses(writer.source(), stamp) {
            debug!(self.log, "update suppressed by source priority";
                "kind" => %T::KIND,
                "key" => ?key,
                "owner" => stamp,
                "source" => writer.label(),
            );
            Counters::bump(&self.counters.unchanged);
            return Ok(existing);
        }
        let reset = self.priority.resets(writer.source(), stamp);

        if let (Some(base), Some(existing_base)) =
            (new.base_mut(), existing.base())
        {
            base.tags =
                self.merged_tags(existing_base, writer, base, orphan_tag);
            base.custom_fields.remove(CUSTOM_FIELD_SOURCE_NAME);
            base.custom_fields.remove(CUSTOM_FIELD_ORPHAN_LAST_SEEN);
        }
        let mut patch = diff(&new, &existing, reset);
        if let Some(existing_base) = existing.base() {
            let mut fields = Map::new();
            if let Some(source) = writer.source() {
                if !patch.is_empty() && stamp != Some(source) {
                    fields.insert(
                        CUSTOM_FIELD_SOURCE_NAME.to_owned(),
                        Value::from(source),
                    );
                }
            }
            let orphaned_since = existing_base
                .custom_fields
                .get(CUSTOM_FIELD_ORPHAN_LAST_SEEN)
                .is_some_and(|value| !value.is_null());
            if orphaned_since {
                fields.insert(
                    CUSTOM_FIELD_ORPHAN_LAST_SEEN.to_owned(),
                    Value::Null,
                );
            }
            extend_custom_fields(&mut patch, fields);
        }
        if patch.is_empty() {
            Counters::bump(&self.counters.unchanged);
            return Ok(existing);
        }

        let fields: Vec<&str> = patch.keys().map(String::as_str).collect();
        let fields = fields.join(",");
        let updated: T =
            patch_typed(self.registry.as_ref(), existing.id(), &patch)
                .await
                .map_err(|e| {
                    InventoryError::registry(T::KIND, RegistryOp::Patch, e)
                })?;
        let updated = index.install(updated);
        info!(self.log, "updated";
            "kind" => %T::KIND,
            "key" => ?key,
            "id" => updated.id(),
            "fields" => fields,
            "source" => writer.label(),
        );
        Counters::bump(&self.counters.updated);
        Ok(updated)
    }

    /// Tags of an existing record after a write: everything it had except
    /// the orphan tag, plus the engine tag, the writer's tags and the new
    /// record's own.
    fn merged_tags(
        &self,
        existing: &Base,
        writer: &Writer,
        new: &Base,
        orphan_tag: Option<i64>,
    ) -> Vec<Arc<Tag>> {
        let kept = existing
            .tags
            .iter()
            .filter(|tag| Some(tag.id) != orphan_tag)
            .cloned();
        dedup_tags(
            kept.chain(std::iter::once(Arc::clone(&self.engine_tag)))
                .chain(writer.tags.iter().cloned())
                .chain(new.tags.iter().cloned()),
        )
    }

    async fn create<T: Indexed>(
        &self,
        index: &mut KindIndex<T>,
        writer: &Writer,
        mut new: T,
    ) -> Result<Arc<T>, InventoryError> {
        if let Some(base) = new.base_mut() {
            base.tags = dedup_tags(
                std::iter::once(Arc::clone(&self.engine_tag))
                    .chain(writer.tags.iter().cloned())
                    .chain(base.tags.drain(..)),
            );
            if let Some(source) = writer.source() {
                base.custom_fields.insert(
                    CUSTOM_FIELD_SOURCE_NAME.to_owned(),
                    Value::from(source),
                );
            }
        }
        new.set_id(0);
        let key = new.natural_key();
        let created = create_typed(self.registry.as_ref(), &new)
            .await
            .map_err(|e| {
                InventoryError::registry(T::KIND, RegistryOp::Create, e)
            })?;
        let created = index.install(created);
        info!(self.log, "created";
            "kind" => %T::KIND,
            "key" => ?key,
            "id" => created.id(),
            "source" => writer.label(),
        );
        Counters::bump(&self.counters.created);
        Ok(created)
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry object kinds

use serde::Deserialize;
use serde::Serialize;
use strum::EnumIter;
use strum::IntoEnumIterator;

/// Every kind of registry object the engine knows about.
///
/// Variants are declared in dependency order: a kind only references kinds
/// declared before it, with the exception of the primary-address fields of
/// devices and virtual machines, which are written after the addresses exist.
/// The derived `Ord` is therefore the engine's topological order.  It fixes
/// the order in which kinds are listed at startup, the order in which kind
/// locks may be taken, and (reversed) the order of orphan deletion.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ObjectKind {
    Tag,
    CustomField,
    Region,
    TenantGroup,
    Tenant,
    Site,
    Manufacturer,
    Platform,
    DeviceType,
    DeviceRole,
    ClusterGroup,
    ClusterType,
    Cluster,
    VlanGroup,
    Vlan,
    Vrf,
    Device,
    VirtualDeviceContext,
    Interface,
    VirtualMachine,
    VmInterface,
    Prefix,
    IpAddress,
}

impl ObjectKind {
    /// Path of the kind's collection below the registry's `/api/` root,
    /// without the trailing slash.
    pub fn api_path(&self) -> &'static str {
        match self {
            ObjectKind::Tag => "extras/tags",
            ObjectKind::CustomField => "extras/custom-fields",
            ObjectKind::Region => "dcim/regions",
            ObjectKind::TenantGroup => "tenancy/tenant-groups",
            ObjectKind::Tenant => "tenancy/tenants",
            ObjectKind::Site => "dcim/sites",
            ObjectKind::Manufacturer => "dcim/manufacturers",
            ObjectKind::Platform => "dcim/platforms",
            ObjectKind::DeviceType => "dcim/device-types",
            ObjectKind::DeviceRole => "dcim/device-roles",
            ObjectKind::ClusterGroup => "virtualization/cluster-groups",
            ObjectKind::ClusterType => "virtualization/cluster-types",
            ObjectKind::Cluster => "virtualization/clusters",
            ObjectKind::VlanGroup => "ipam/vlan-groups",
            ObjectKind::Vlan => "ipam/vlans",
            ObjectKind::Vrf => "ipam/vrfs",
            ObjectKind::Device => "dcim/devices",
            ObjectKind::VirtualDeviceContext => {
                "dcim/virtual-device-contexts"
            }
            ObjectKind::Interface => "dcim/interfaces",
            ObjectKind::VirtualMachine => "virtualization/virtual-machines",
            ObjectKind::VmInterface => "virtualization/interfaces",
            ObjectKind::Prefix => "ipam/prefixes",
            ObjectKind::IpAddress => "ipam/ip-addresses",
        }
    }

    /// The registry's `app_label.model` name for the kind, as used in custom
    /// field object types and polymorphic assignments.
    pub fn content_type(&self) -> &'static str {
        match self {
            ObjectKind::Tag => "extras.tag",
            ObjectKind::CustomField => "extras.customfield",
            ObjectKind::Region => "dcim.region",
            ObjectKind::TenantGroup => "tenancy.tenantgroup",
            ObjectKind::Tenant => "tenancy.tenant",
            ObjectKind::Site => "dcim.site",
            ObjectKind::Manufacturer => "dcim.manufacturer",
            ObjectKind::Platform => "dcim.platform",
            ObjectKind::DeviceType => "dcim.devicetype",
            ObjectKind::DeviceRole => "dcim.devicerole",
            ObjectKind::ClusterGroup => "virtualization.clustergroup",
            ObjectKind::ClusterType => "virtualization.clustertype",
            ObjectKind::Cluster => "virtualization.cluster",
            ObjectKind::VlanGroup => "ipam.vlangroup",
            ObjectKind::Vlan => "ipam.vlan",
            ObjectKind::Vrf => "ipam.vrf",
            ObjectKind::Device => "dcim.device",
            ObjectKind::VirtualDeviceContext => "dcim.virtualdevicecontext",
            ObjectKind::Interface => "dcim.interface",
            ObjectKind::VirtualMachine => "virtualization.virtualmachine",
            ObjectKind::VmInterface => "virtualization.vminterface",
            ObjectKind::Prefix => "ipam.prefix",
            ObjectKind::IpAddress => "ipam.ipaddress",
        }
    }

    /// Whether the engine indexes, writes and cleans up this kind.  The
    /// others can only be referenced by id.
    pub fn is_managed(&self) -> bool {
        !matches!(
            self,
            ObjectKind::Region | ObjectKind::TenantGroup | ObjectKind::Vrf
        )
    }

    /// Whether records of this kind carry tags and custom fields.
    pub fn is_taggable(&self) -> bool {
        !matches!(self, ObjectKind::Tag | ObjectKind::CustomField)
    }

    /// Managed kinds in topological order.
    pub fn managed() -> impl Iterator<Item = ObjectKind> {
        ObjectKind::iter().filter(ObjectKind::is_managed)
    }

    /// Managed kinds in the order the orphan sweep deletes them: leaves
    /// first.
    pub fn cleanup_order() -> impl Iterator<Item = ObjectKind> {
        ObjectKind::iter()
            .rev()
            .filter(|kind| kind.is_managed() && kind.is_taggable())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cleanup_order_starts_with_leaves() {
        let order: Vec<_> = ObjectKind::cleanup_order().collect();
        assert_eq!(order[0], ObjectKind::IpAddress);
        assert_eq!(order[1], ObjectKind::Prefix);
        let position =
            |kind| order.iter().position(|k| *k == kind).unwrap();
        assert!(
            position(ObjectKind::VmInterface)
                < position(ObjectKind::VirtualMachine)
        );
        assert!(position(ObjectKind::Interface) < position(ObjectKind::Device));
        assert!(position(ObjectKind::Device) < position(ObjectKind::Site));
        assert!(!order.contains(&ObjectKind::Tag));
        assert!(!order.contains(&ObjectKind::Region));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ObjectKind::VmInterface.to_string(), "vm_interface");
        assert_eq!(ObjectKind::IpAddress.api_path(), "ipam/ip-addresses");
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Field-by-field comparison for every managed kind

use super::Diff;
use super::PatchBuilder;
use serde_json::Value;
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

impl Diff for Tag {
    fn diff_fields(&self, existing: &Tag, patch: &mut PatchBuilder) {
        patch.string("slug", &self.slug, &existing.slug);
        patch.string("color", &self.color, &existing.color);
        patch.string("description", &self.description, &existing.description);
    }
}

impl Diff for CustomField {
    fn diff_fields(&self, existing: &CustomField, patch: &mut PatchBuilder) {
        patch.string("label", &self.label, &existing.label);
        patch.value("type", &self.field_type, &existing.field_type);
        patch.string_set(
            "object_types",
            &self.content_types,
            &existing.content_types,
        );
        patch.string("description", &self.description, &existing.description);
        patch.value("filter_logic", &self.filter_logic, &existing.filter_logic);
        patch.value("ui_visible", &self.ui_visible, &existing.ui_visible);
        patch.value("ui_editable", &self.ui_editable, &existing.ui_editable);
        patch.option(
            "search_weight",
            &self.search_weight,
            &existing.search_weight,
        );
    }
}

impl Diff for Tenant {
    fn diff_fields(&self, existing: &Tenant, patch: &mut PatchBuilder) {
        patch.string("slug", &self.slug, &existing.slug);
        patch.reference("group", &self.group, &existing.group);
    }
}

impl Diff for Site {
    fn diff_fields(&self, existing: &Site, patch: &mut PatchBuilder) {
        patch.string("slug", &self.slug, &existing.slug);
        patch.value("status", &self.status, &existing.status);
        patch.reference("region", &self.region, &existing.region);
        patch.reference("tenant", &self.tenant, &existing.tenant);
        patch.string("facility", &self.facility, &existing.facility);
        patch.option("time_zone", &self.time_zone, &existing.time_zone);
        patch.string(
            "physical_address",
            &self.physical_address,
            &existing.physical_address,
        );
        patch.option("latitude", &self.latitude, &existing.latitude);
        patch.option("longitude", &self.longitude, &existing.longitude);
    }
}

impl Diff for Manufacturer {
    fn diff_fields(&self, existing: &Manufacturer, patch: &mut PatchBuilder) {
        patch.string("slug", &self.slug, &existing.slug);
    }
}

impl Diff for Platform {
    fn diff_fields(&self, existing: &Platform, patch: &mut PatchBuilder) {
        patch.string("slug", &self.slug, &existing.slug);
        patch.reference(
            "manufacturer",
            &self.manufacturer,
            &existing.manufacturer,
        );
    }
}

impl Diff for DeviceType {
    fn diff_fields(&self, existing: &DeviceType, patch: &mut PatchBuilder) {
        patch.reference(
            "manufacturer",
            &self.manufacturer,
            &existing.manufacturer,
        );
        patch.string("slug", &self.slug, &existing.slug);
        patch.string("part_number", &self.part_number, &existing.part_number);
    }
}

impl Diff for DeviceRole {
    fn diff_fields(&self, existing: &DeviceRole, patch: &mut PatchBuilder) {
        patch.string("slug", &self.slug, &existing.slug);
        patch.string("color", &self.color, &existing.color);
        patch.value("vm_role", &self.vm_role, &existing.vm_role);
    }
}

impl Diff for ClusterGroup {
    fn diff_fields(&self, existing: &ClusterGroup, patch: &mut PatchBuilder) {
        patch.string("slug", &self.slug, &existing.slug);
    }
}

impl Diff for ClusterType {
    fn diff_fields(&self, existing: &ClusterType, patch: &mut PatchBuilder) {
        patch.string("slug", &self.slug, &existing.slug);
    }
}

impl Diff for Cluster {
    fn diff_fields(&self, existing: &Cluster, patch: &mut PatchBuilder) {
        patch.reference("type", &self.cluster_type, &existing.cluster_type);
        patch.value("status", &self.status, &existing.status);
        patch.reference("group", &self.group, &existing.group);
        patch.reference("site", &self.site, &existing.site);
        patch.reference("tenant", &self.tenant, &existing.tenant);
    }
}

impl Diff for VlanGroup {
    fn diff_fields(&self, existing: &VlanGroup, patch: &mut PatchBuilder) {
        patch.string("slug", &self.slug, &existing.slug);
        if self.scope != existing.scope
            && (self.scope.is_some() || patch.reset)
        {
            let (kind, id) = match &self.scope {
                Some(scope) => (
                    Value::from(scope.kind.to_string()),
                    Value::from(scope.id),
                ),
                None => (Value::Null, Value::Null),
            };
            patch.set("scope_type", kind);
            patch.set("scope_id", id);
        }
    }
}

impl Diff for Vlan {
    fn diff_fields(&self, existing: &Vlan, patch: &mut PatchBuilder) {
        patch.reference("group", &self.group, &existing.group);
        patch.reference("site", &self.site, &existing.site);
        patch.reference("tenant", &self.tenant, &existing.tenant);
        patch.string("name", &self.name, &existing.name);
        patch.value("status", &self.status, &existing.status);
        patch.string("comments", &self.comments, &existing.comments);
    }
}

impl Diff for Device {
    fn diff_fields(&self, existing: &Device, patch: &mut PatchBuilder) {
        // The name and site form the key; a device found by its uuid may
        // still have been renamed or moved.
        patch.string("name", &self.name, &existing.name);
        patch.reference("site", &self.site, &existing.site);
        patch.reference("role", &self.role, &existing.role);
        patch.reference(
            "device_type",
            &self.device_type,
            &existing.device_type,
        );
        patch.reference("cluster", &self.cluster, &existing.cluster);
        patch.reference("tenant", &self.tenant, &existing.tenant);
        patch.reference("platform", &self.platform, &existing.platform);
        patch.string("serial", &self.serial_number, &existing.serial_number);
        patch.option("asset_tag", &self.asset_tag, &existing.asset_tag);
        patch.value("status", &self.status, &existing.status);
        patch.string("comments", &self.comments, &existing.comments);
        patch.later_reference(
            "primary_ip4",
            &self.primary_ip4,
            &existing.primary_ip4,
        );
        patch.later_reference(
            "primary_ip6",
            &self.primary_ip6,
            &existing.primary_ip6,
        );
    }
}

impl Diff for VirtualDeviceContext {
    fn diff_fields(
        &self,
        existing: &VirtualDeviceContext,
        patch: &mut PatchBuilder,
    ) {
        patch.value("status", &self.status, &existing.status);
        patch.option("identifier", &self.identifier, &existing.identifier);
    }
}

impl Diff for Interface {
    fn diff_fields(&self, existing: &Interface, patch: &mut PatchBuilder) {
        patch.value("type", &self.interface_type, &existing.interface_type);
        patch.value("enabled", &self.enabled, &existing.enabled);
        patch.reference("parent", &self.parent, &existing.parent);
        patch.reference("lag", &self.lag, &existing.lag);
        patch.option("mtu", &self.mtu, &existing.mtu);
        patch.option("mac_address", &self.mac_address, &existing.mac_address);
        patch.option("speed", &self.speed, &existing.speed);
        patch.option("mode", &self.mode, &existing.mode);
        patch.reference(
            "untagged_vlan",
            &self.untagged_vlan,
            &existing.untagged_vlan,
        );
        patch.reference_set(
            "tagged_vlans",
            &self.tagged_vlans,
            &existing.tagged_vlans,
        );
        patch.reference_set("vdcs", &self.vdcs, &existing.vdcs);
    }
}

impl Diff for VirtualMachine {
    fn diff_fields(
        &self,
        existing: &VirtualMachine,
        patch: &mut PatchBuilder,
    ) {
        patch.value("status", &self.status, &existing.status);
        patch.reference("site", &self.site, &existing.site);
        patch.reference("tenant", &self.tenant, &existing.tenant);
        patch.reference("device", &self.device, &existing.device);
        patch.reference("platform", &self.platform, &existing.platform);
        patch.reference("role", &self.role, &existing.role);
        vcpus(patch, self.vcpus, existing.vcpus);
        patch.option("memory", &self.memory, &existing.memory);
        patch.option("disk", &self.disk, &existing.disk);
        patch.later_reference(
            "primary_ip4",
            &self.primary_ip4,
            &existing.primary_ip4,
        );
        patch.later_reference(
            "primary_ip6",
            &self.primary_ip6,
            &existing.primary_ip6,
        );
        patch.string("comments", &self.comments, &existing.comments);
    }
}

/// The registry stores vcpus as a two-decimal fixed point number.
fn vcpus(patch: &mut PatchBuilder, new: Option<f64>, existing: Option<f64>) {
    let round = |v: f64| (v * 100.0).round() as i64;
    match (new, existing) {
        (Some(new), Some(existing)) if round(new) == round(existing) => {}
        _ => patch.option("vcpus", &new, &existing),
    }
}

impl Diff for VmInterface {
    fn diff_fields(&self, existing: &VmInterface, patch: &mut PatchBuilder) {
        patch.value("enabled", &self.enabled, &existing.enabled);
        patch.option("mtu", &self.mtu, &existing.mtu);
        patch.option("mac_address", &self.mac_address, &existing.mac_address);
        patch.option("mode", &self.mode, &existing.mode);
        patch.reference(
            "untagged_vlan",
            &self.untagged_vlan,
            &existing.untagged_vlan,
        );
        patch.reference_set(
            "tagged_vlans",
            &self.tagged_vlans,
            &existing.tagged_vlans,
        );
    }
}

impl Diff for Prefix {
    fn diff_fields(&self, existing: &Prefix, patch: &mut PatchBuilder) {
        patch.value("status", &self.status, &existing.status);
        patch.reference("vlan", &self.vlan, &existing.vlan);
        patch.reference("tenant", &self.tenant, &existing.tenant);
        patch.reference("vrf", &self.vrf, &existing.vrf);
    }
}

impl Diff for IpAddress {
    fn diff_fields(&self, existing: &IpAddress, patch: &mut PatchBuilder) {
        patch.value("status", &self.status, &existing.status);
        patch.option("role", &self.role, &existing.role);
        patch.string("dns_name", &self.dns_name, &existing.dns_name);
        patch.reference("tenant", &self.tenant, &existing.tenant);
        // Both halves of the assignment always travel together.
        if self.assigned_object != existing.assigned_object
            && (self.assigned_object.is_some() || patch.reset)
        {
            let (kind, id) = match &self.assigned_object {
                Some(assigned) => (
                    Value::from(assigned.kind.to_string()),
                    Value::from(assigned.id),
                ),
                None => (Value::Null, Value::Null),
            };
            patch.set("assigned_object_type", kind);
            patch.set("assigned_object_id", id);
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Data center infrastructure records: sites, hardware and interfaces

use crate::choice::DeviceStatus;
use crate::choice::InterfaceMode;
use crate::choice::InterfaceType;
use crate::choice::SiteStatus;
use crate::choice::VdcStatus;
use crate::constants::CUSTOM_FIELD_DEVICE_UUID;
use crate::ipam::IpAddress;
use crate::ipam::Vlan;
use crate::kind::ObjectKind;
use crate::record::refs_of;
use crate::record::refs_of_many;
use crate::record::reference_record;
use crate::record::taggable_record;
use crate::record::Base;
use crate::record::ObjectRef;
use crate::record::Record;
use crate::refs;
use crate::tenancy::Tenant;
use crate::virtualization::Cluster;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;

/// A region.  Referenced by id only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Region {
    #[serde(skip_serializing_if = "refs::is_unset")]
    pub id: i64,
    pub name: String,
    pub slug: String,
}

reference_record!(Region, ObjectKind::Region);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Site {
    #[serde(flatten)]
    pub base: Base,
    pub name: String,
    pub slug: String,
    pub status: SiteStatus,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub region: Option<Arc<Region>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Arc<Tenant>>,
    #[serde(deserialize_with = "refs::null_default")]
    pub facility: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(deserialize_with = "refs::null_default")]
    pub physical_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

taggable_record!(
    Site, ObjectKind::Site, key = String,
    |this| this.name.clone(),
    refs = |this, out| {
        refs_of(&mut out, &this.region);
        refs_of(&mut out, &this.tenant);
    }
);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manufacturer {
    #[serde(flatten)]
    pub base: Base,
    pub name: String,
    pub slug: String,
}

taggable_record!(
    Manufacturer, ObjectKind::Manufacturer, key = String,
    |this| this.name.clone(),
    refs = |this, out| {}
);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Platform {
    #[serde(flatten)]
    pub base: Base,
    pub name: String,
    pub slug: String,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<Arc<Manufacturer>>,
}

taggable_record!(
    Platform, ObjectKind::Platform, key = String,
    |this| this.name.clone(),
    refs = |this, out| {
        refs_of(&mut out, &this.manufacturer);
    }
);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceType {
    #[serde(flatten)]
    pub base: Base,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<Arc<Manufacturer>>,
    pub model: String,
    pub slug: String,
    #[serde(deserialize_with = "refs::null_default")]
    pub part_number: String,
}

taggable_record!(
    DeviceType, ObjectKind::DeviceType, key = String,
    |this| this.model.clone(),
    refs = |this, out| {
        refs_of(&mut out, &this.manufacturer);
    }
);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceRole {
    #[serde(flatten)]
    pub base: Base,
    pub name: String,
    pub slug: String,
    pub color: String,
    pub vm_role: bool,
}

taggable_record!(
    DeviceRole, ObjectKind::DeviceRole, key = String,
    |this| this.name.clone(),
    refs = |this, out| {}
);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    #[serde(flatten)]
    pub base: Base,
    pub name: String,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub role: Option<Arc<DeviceRole>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub device_type: Option<Arc<DeviceType>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub site: Option<Arc<Site>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub cluster: Option<Arc<Cluster>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Arc<Tenant>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub platform: Option<Arc<Platform>>,
    #[serde(rename = "serial", deserialize_with = "refs::null_default")]
    pub serial_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_tag: Option<String>,
    pub status: DeviceStatus,
    #[serde(deserialize_with = "refs::null_default")]
    pub comments: String,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub primary_ip4: Option<Arc<IpAddress>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub primary_ip6: Option<Arc<IpAddress>>,
}

impl Record for Device {
    const KIND: ObjectKind = ObjectKind::Device;
    /// `(site id, name)`; a device without a site has site id 0.
    type Key = (i64, String);

    fn id(&self) -> i64 {
        self.base.id
    }

    fn set_id(&mut self, id: i64) {
        self.base.id = id;
    }

    fn natural_key(&self) -> (i64, String) {
        (self.site.as_ref().map_or(0, |site| site.id()), self.name.clone())
    }

    fn alternate_key(&self) -> Option<String> {
        self.base.custom_field_str(CUSTOM_FIELD_DEVICE_UUID).map(str::to_owned)
    }

    fn base(&self) -> Option<&Base> {
        Some(&self.base)
    }

    fn base_mut(&mut self) -> Option<&mut Base> {
        Some(&mut self.base)
    }

    // Primary addresses are written after the addresses exist and are not
    // prerequisites of the device itself.
    fn references(&self) -> Vec<ObjectRef> {
        let mut out = Vec::new();
        refs_of(&mut out, &self.role);
        refs_of(&mut out, &self.device_type);
        refs_of(&mut out, &self.site);
        refs_of(&mut out, &self.cluster);
        refs_of(&mut out, &self.tenant);
        refs_of(&mut out, &self.platform);
        out
    }

    fn all_references(&self) -> Vec<ObjectRef> {
        let mut out = self.references();
        refs_of(&mut out, &self.primary_ip4);
        refs_of(&mut out, &self.primary_ip6);
        out
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualDeviceContext {
    #[serde(flatten)]
    pub base: Base,
    pub name: String,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub device: Option<Arc<Device>>,
    pub status: VdcStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<u16>,
}

taggable_record!(
    VirtualDeviceContext, ObjectKind::VirtualDeviceContext,
    key = (i64, String),
    |this| (this.device.as_ref().map_or(0, |d| d.id()), this.name.clone()),
    refs = |this, out| {
        refs_of(&mut out, &this.device);
    }
);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Interface {
    #[serde(flatten)]
    pub base: Base,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub device: Option<Arc<Device>>,
    pub name: String,
    #[serde(rename = "type")]
    pub interface_type: InterfaceType,
    pub enabled: bool,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub parent: Option<Arc<Interface>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub lag: Option<Arc<Interface>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    /// Link speed in kbps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<InterfaceMode>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub untagged_vlan: Option<Arc<Vlan>>,
    #[serde(
        serialize_with = "refs::serialize_many",
        deserialize_with = "refs::deserialize_many"
    )]
    pub tagged_vlans: Vec<Arc<Vlan>>,
    #[serde(
        serialize_with = "refs::serialize_many",
        deserialize_with = "refs::deserialize_many"
    )]
    pub vdcs: Vec<Arc<VirtualDeviceContext>>,
}

impl Interface {
    pub fn device_id(&self) -> i64 {
        self.device.as_ref().map_or(0, |device| device.id())
    }
}

taggable_record!(
    Interface, ObjectKind::Interface, key = (i64, String),
    |this| (this.device_id(), this.name.clone()),
    refs = |this, out| {
        refs_of(&mut out, &this.device);
        refs_of(&mut out, &this.parent);
        refs_of(&mut out, &this.lag);
        refs_of(&mut out, &this.untagged_vlan);
        refs_of_many(&mut out, &this.tagged_vlans);
        refs_of_many(&mut out, &this.vdcs);
    }
);

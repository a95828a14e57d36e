// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clusters, virtual machines and their interfaces

use crate::choice::ClusterStatus;
use crate::choice::InterfaceMode;
use crate::choice::VmStatus;
use crate::dcim::Device;
use crate::dcim::DeviceRole;
use crate::dcim::Platform;
use crate::dcim::Site;
use crate::ipam::IpAddress;
use crate::ipam::Vlan;
use crate::kind::ObjectKind;
use crate::record::refs_of;
use crate::record::refs_of_many;
use crate::record::taggable_record;
use crate::record::Base;
use crate::record::ObjectRef;
use crate::record::Record;
use crate::refs;
use crate::tenancy::Tenant;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterGroup {
    #[serde(flatten)]
    pub base: Base,
    pub name: String,
    pub slug: String,
}

taggable_record!(
    ClusterGroup, ObjectKind::ClusterGroup, key = String,
    |this| this.name.clone(),
    refs = |this, out| {}
);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterType {
    #[serde(flatten)]
    pub base: Base,
    pub name: String,
    pub slug: String,
}

taggable_record!(
    ClusterType, ObjectKind::ClusterType, key = String,
    |this| this.name.clone(),
    refs = |this, out| {}
);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cluster {
    #[serde(flatten)]
    pub base: Base,
    pub name: String,
    #[serde(
        rename = "type",
        with = "refs::one",
        skip_serializing_if = "Option::is_none"
    )]
    pub cluster_type: Option<Arc<ClusterType>>,
    pub status: ClusterStatus,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub group: Option<Arc<ClusterGroup>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub site: Option<Arc<Site>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Arc<Tenant>>,
}

impl Cluster {
    pub fn site_id(&self) -> Option<i64> {
        self.site.as_ref().map(|site| site.id())
    }
}

taggable_record!(
    Cluster, ObjectKind::Cluster, key = String,
    |this| this.name.clone(),
    refs = |this, out| {
        refs_of(&mut out, &this.cluster_type);
        refs_of(&mut out, &this.group);
        refs_of(&mut out, &this.site);
        refs_of(&mut out, &this.tenant);
    }
);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualMachine {
    #[serde(flatten)]
    pub base: Base,
    pub name: String,
    pub status: VmStatus,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub cluster: Option<Arc<Cluster>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub site: Option<Arc<Site>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Arc<Tenant>>,
    /// Host the machine runs on.
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub device: Option<Arc<Device>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub platform: Option<Arc<Platform>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub role: Option<Arc<DeviceRole>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcpus: Option<f64>,
    /// Memory in MB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    /// Disk in GB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<u64>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub primary_ip4: Option<Arc<IpAddress>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub primary_ip6: Option<Arc<IpAddress>>,
    #[serde(deserialize_with = "refs::null_default")]
    pub comments: String,
}

impl VirtualMachine {
    pub fn cluster_id(&self) -> i64 {
        self.cluster.as_ref().map_or(0, |cluster| cluster.id())
    }
}

impl Record for VirtualMachine {
    const KIND: ObjectKind = ObjectKind::VirtualMachine;
    /// `(cluster id, name)`; a machine outside any cluster has cluster id 0.
    type Key = (i64, String);

    fn id(&self) -> i64 {
        self.base.id
    }

    fn set_id(&mut self, id: i64) {
        self.base.id = id;
    }

    fn natural_key(&self) -> (i64, String) {
        (self.cluster_id(), self.name.clone())
    }

    fn base(&self) -> Option<&Base> {
        Some(&self.base)
    }

    fn base_mut(&mut self) -> Option<&mut Base> {
        Some(&mut self.base)
    }

    fn references(&self) -> Vec<ObjectRef> {
        let mut out = Vec::new();
        refs_of(&mut out, &self.cluster);
        refs_of(&mut out, &self.site);
        refs_of(&mut out, &self.tenant);
        refs_of(&mut out, &self.device);
        refs_of(&mut out, &self.platform);
        refs_of(&mut out, &self.role);
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
pub struct VmInterface {
    #[serde(flatten)]
    pub base: Base,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub virtual_machine: Option<Arc<VirtualMachine>>,
    pub name: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<InterfaceMode>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub untagged_vlan: Option<Arc<Vlan>>,
    #[serde(
        serialize_with = "refs::serialize_many",
        deserialize_with = "refs::deserialize_many"
    )]
    pub tagged_vlans: Vec<Arc<Vlan>>,
}

impl VmInterface {
    pub fn vm_id(&self) -> i64 {
        self.virtual_machine.as_ref().map_or(0, |vm| vm.id())
    }
}

taggable_record!(
    VmInterface, ObjectKind::VmInterface, key = (i64, String),
    |this| (this.vm_id(), this.name.clone()),
    refs = |this, out| {
        refs_of(&mut out, &this.virtual_machine);
        refs_of(&mut out, &this.untagged_vlan);
        refs_of_many(&mut out, &this.tagged_vlans);
    }
);

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cluster_type_field_name() {
        let cluster = Cluster {
            name: String::from("C1"),
            cluster_type: Some(Arc::new(ClusterType::from_id(3))),
            ..Default::default()
        };
        let body = serde_json::to_value(&cluster).unwrap();
        assert_eq!(body["type"], json!(3));
        assert_eq!(body["status"], json!("active"));
        assert!(body.get("group").is_none());
    }

    #[test]
    fn test_vm_key_without_cluster() {
        let vm = VirtualMachine {
            name: String::from("vm1"),
            ..Default::default()
        };
        assert_eq!(vm.natural_key(), (0, String::from("vm1")));
    }
}

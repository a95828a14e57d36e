// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IP address management records

use crate::choice::choice;
use crate::choice::IpRole;
use crate::choice::IpStatus;
use crate::choice::PrefixStatus;
use crate::choice::VlanStatus;
use crate::dcim::Site;
use crate::kind::ObjectKind;
use crate::record::refs_of;
use crate::record::reference_record;
use crate::record::taggable_record;
use crate::record::Base;
use crate::record::ObjectRef;
use crate::record::Record;
use crate::refs;
use crate::tenancy::Tenant;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;

choice! {
    /// Kinds a VLAN group can be scoped to.
    pub enum VlanGroupScopeType {
        #[default]
        Site => ("dcim.site", "Site"),
    }
}

impl VlanGroupScopeType {
    pub fn kind(&self) -> ObjectKind {
        match self {
            VlanGroupScopeType::Site => ObjectKind::Site,
        }
    }
}

/// What a VLAN group is limited to, held as a kind and id pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VlanGroupScope {
    #[serde(rename = "scope_type")]
    pub kind: VlanGroupScopeType,
    #[serde(rename = "scope_id")]
    pub id: i64,
}

impl VlanGroupScope {
    pub fn site(site: &Site) -> VlanGroupScope {
        VlanGroupScope { kind: VlanGroupScopeType::Site, id: site.id() }
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.kind.kind(), self.id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VlanGroup {
    #[serde(flatten)]
    pub base: Base,
    pub name: String,
    pub slug: String,
    #[serde(flatten)]
    pub scope: Option<VlanGroupScope>,
}

taggable_record!(
    VlanGroup, ObjectKind::VlanGroup, key = String,
    |this| this.name.clone(),
    refs = |this, out| {
        if let Some(scope) = &this.scope {
            out.push(scope.object_ref());
        }
    }
);

/// Highest VLAN id the registry accepts.
pub const MAX_VID: u16 = 4094;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vlan {
    #[serde(flatten)]
    pub base: Base,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub group: Option<Arc<VlanGroup>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub site: Option<Arc<Site>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Arc<Tenant>>,
    pub vid: u16,
    pub name: String,
    pub status: VlanStatus,
    #[serde(deserialize_with = "refs::null_default")]
    pub comments: String,
}

impl Vlan {
    pub fn group_id(&self) -> i64 {
        self.group.as_ref().map_or(0, |group| group.id())
    }
}

taggable_record!(
    Vlan, ObjectKind::Vlan, key = (i64, u16),
    |this| (this.group_id(), this.vid),
    refs = |this, out| {
        refs_of(&mut out, &this.group);
        refs_of(&mut out, &this.site);
        refs_of(&mut out, &this.tenant);
    }
);

/// A VRF.  Referenced by id only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vrf {
    #[serde(skip_serializing_if = "refs::is_unset")]
    pub id: i64,
    pub name: String,
}

reference_record!(Vrf, ObjectKind::Vrf);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prefix {
    #[serde(flatten)]
    pub base: Base,
    /// Canonical network in `address/length` form.
    pub prefix: String,
    pub status: PrefixStatus,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub vlan: Option<Arc<Vlan>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Arc<Tenant>>,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub vrf: Option<Arc<Vrf>>,
}

taggable_record!(
    Prefix, ObjectKind::Prefix, key = String,
    |this| this.prefix.clone(),
    refs = |this, out| {
        refs_of(&mut out, &this.vlan);
        refs_of(&mut out, &this.tenant);
        refs_of(&mut out, &this.vrf);
    }
);

choice! {
    /// Kinds an IP address can be assigned to.
    pub enum AssignedObjectType {
        #[default]
        DeviceInterface => ("dcim.interface", "Device interface"),
        VmInterface => ("virtualization.vminterface", "VM interface"),
    }
}

impl AssignedObjectType {
    pub fn kind(&self) -> ObjectKind {
        match self {
            AssignedObjectType::DeviceInterface => ObjectKind::Interface,
            AssignedObjectType::VmInterface => ObjectKind::VmInterface,
        }
    }

    pub fn for_kind(kind: ObjectKind) -> Option<AssignedObjectType> {
        match kind {
            ObjectKind::Interface => Some(AssignedObjectType::DeviceInterface),
            ObjectKind::VmInterface => Some(AssignedObjectType::VmInterface),
            _ => None,
        }
    }
}

/// The interface an address is assigned to, held as a kind and id pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignedObject {
    #[serde(rename = "assigned_object_type")]
    pub kind: AssignedObjectType,
    #[serde(rename = "assigned_object_id")]
    pub id: i64,
}

impl AssignedObject {
    pub fn device_interface(id: i64) -> AssignedObject {
        AssignedObject { kind: AssignedObjectType::DeviceInterface, id }
    }

    pub fn vm_interface(id: i64) -> AssignedObject {
        AssignedObject { kind: AssignedObjectType::VmInterface, id }
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.kind.kind(), self.id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpAddress {
    #[serde(flatten)]
    pub base: Base,
    /// Canonical `address/length` form.
    pub address: String,
    pub status: IpStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<IpRole>,
    #[serde(deserialize_with = "refs::null_default")]
    pub dns_name: String,
    #[serde(with = "refs::one", skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Arc<Tenant>>,
    #[serde(flatten)]
    pub assigned_object: Option<AssignedObject>,
}

impl IpAddress {
    /// The host part of the address, without its prefix length.
    pub fn host(&self) -> &str {
        self.address.split('/').next().unwrap_or_default()
    }
}

taggable_record!(
    IpAddress, ObjectKind::IpAddress, key = String,
    |this| this.address.clone(),
    refs = |this, out| {
        refs_of(&mut out, &this.tenant);
        if let Some(assigned) = &this.assigned_object {
            out.push(assigned.object_ref());
        }
    }
);

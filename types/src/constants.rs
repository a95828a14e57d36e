// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Names, colors and other fixed values shared by the engine and the sources

use strum::EnumIter;
use strum::EnumString;

pub const DEFAULT_ENGINE_TAG: &str = "netbox-ssot";
pub const DEFAULT_ENGINE_TAG_COLOR: &str = "00add8";
pub const ENGINE_TAG_DESCRIPTION: &str = "Tag used by netbox-ssot to mark \
    objects it manages";

pub const ORPHAN_TAG: &str = "Orphan";
pub const ORPHAN_TAG_COLOR: &str = "607d8b";
pub const ORPHAN_TAG_DESCRIPTION: &str = "Object is managed by netbox-ssot \
    but was not seen in the last run";

pub const CUSTOM_FIELD_SOURCE_NAME: &str = "source_name";
pub const CUSTOM_FIELD_SOURCE_ID: &str = "source_id";
pub const CUSTOM_FIELD_DEVICE_UUID: &str = "device_uuid";
pub const CUSTOM_FIELD_HOST_CPU_CORES: &str = "host_cpu_cores";
pub const CUSTOM_FIELD_HOST_MEMORY: &str = "host_memory";
pub const CUSTOM_FIELD_ARP_ENTRY: &str = "arp_entry";
pub const CUSTOM_FIELD_ORPHAN_LAST_SEEN: &str = "orphan_last_seen";

pub const ROLE_SERVER: &str = "Server";
pub const ROLE_SERVER_COLOR: &str = "00add8";
pub const ROLE_FIREWALL: &str = "Firewall";
pub const ROLE_FIREWALL_COLOR: &str = "f44336";
pub const ROLE_SWITCH: &str = "Switch";
pub const ROLE_SWITCH_COLOR: &str = "2196f3";
/// Color of device roles the sources name without one.
pub const DEFAULT_ROLE_COLOR: &str = "9e9e9e";

pub const GENERIC_MANUFACTURER: &str = "Generic Manufacturer";
pub const GENERIC_DEVICE_TYPE: &str = "Generic Device Type";
pub const DEFAULT_VLAN_GROUP: &str = "DefaultVlanGroup";

/// Every adapter type a source can be configured with.
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
    EnumString,
    strum::Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum SourceType {
    Ovirt,
    Vmware,
    Dnac,
    Proxmox,
    PaloAlto,
    Fortigate,
    Fmc,
    #[strum(serialize = "ios-xe")]
    IosXe,
}

impl SourceType {
    /// Color of the tag every record from a source of this type carries.
    pub fn tag_color(&self) -> &'static str {
        match self {
            SourceType::Ovirt => "07426b",
            SourceType::Vmware => "e5b040",
            SourceType::Dnac => "85b6e8",
            SourceType::Proxmox => "e56f00",
            SourceType::PaloAlto => "0080ff",
            SourceType::Fortigate => "ff0000",
            SourceType::Fmc => "02346c",
            SourceType::IosXe => "1ba0d7",
        }
    }

    /// Name of the cluster type records of hypervisor sources use.
    pub fn cluster_type_name(&self) -> &'static str {
        match self {
            SourceType::Ovirt => "oVirt",
            SourceType::Vmware => "VMware",
            SourceType::Dnac => "Cisco DNA Center",
            SourceType::Proxmox => "Proxmox",
            SourceType::PaloAlto => "Palo Alto",
            SourceType::Fortigate => "Fortigate",
            SourceType::Fmc => "Cisco FMC",
            SourceType::IosXe => "Cisco IOS-XE",
        }
    }

    /// Types that authenticate with an API token instead of a password.
    pub fn uses_api_token(&self) -> bool {
        matches!(self, SourceType::Fortigate | SourceType::Proxmox)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::extras::is_valid_color;
    use strum::IntoEnumIterator;

    #[test]
    fn test_source_type_names() {
        assert_eq!("ovirt".parse::<SourceType>().unwrap(), SourceType::Ovirt);
        assert_eq!("ios-xe".parse::<SourceType>().unwrap(), SourceType::IosXe);
        assert_eq!(SourceType::PaloAlto.to_string(), "paloalto");
        assert!("unknown".parse::<SourceType>().is_err());
    }

    #[test]
    fn test_fixed_colors_are_valid() {
        for source_type in SourceType::iter() {
            assert!(is_valid_color(source_type.tag_color()), "{source_type}");
        }
        for color in [
            DEFAULT_ENGINE_TAG_COLOR,
            ORPHAN_TAG_COLOR,
            ROLE_SERVER_COLOR,
            ROLE_FIREWALL_COLOR,
            ROLE_SWITCH_COLOR,
            DEFAULT_ROLE_COLOR,
        ] {
            assert!(is_valid_color(color), "{color}");
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Proxmox VE API responses, and parsing of the `netN` configuration
//! strings

use serde::de::Deserializer;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Every response wraps its payload in `data`.
#[derive(Debug, Deserialize)]
pub(crate) struct Data<T> {
    pub data: T,
}

/// Guest agent responses wrap theirs in `result`.
#[derive(Debug, Deserialize)]
pub(crate) struct AgentResult<T> {
    pub result: T,
}

/// The API is inconsistent about numbers: some come back as strings.
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().map(|float| float as u64)),
        Some(Value::String(string)) => string.trim().parse().ok(),
        _ => None,
    })
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_u64(deserializer)?.is_some_and(|value| value != 0))
}

/// An entry of `/cluster/status`: the cluster itself, or one node.
#[derive(Debug, Deserialize)]
pub(crate) struct ClusterStatus {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

/// An entry of `/nodes`.
#[derive(Debug, Deserialize)]
pub(crate) struct NodeSummary {
    pub node: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// `/nodes/{node}/status`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct NodeStatus {
    pub cpuinfo: CpuInfo,
    pub memory: MemoryInfo,
    /// `pve-manager/<version>/<commit>`
    pub pveversion: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CpuInfo {
    #[serde(deserialize_with = "lenient_u64")]
    pub cpus: Option<u64>,
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct MemoryInfo {
    /// Bytes.
    #[serde(deserialize_with = "lenient_u64")]
    pub total: Option<u64>,
}

impl NodeStatus {
    /// The Proxmox VE release, from `pve-manager/8.1.4/ec5affc9`.
    pub fn release(&self) -> Option<&str> {
        let version = self.pveversion.as_deref()?;
        version.split('/').nth(1).filter(|release| !release.is_empty())
    }
}

/// An entry of `/nodes/{node}/network`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct NodeNetwork {
    pub iface: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "flag")]
    pub active: bool,
    pub cidr: Option<String>,
    pub cidr6: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    pub mtu: Option<u64>,
    /// Space separated bond members.
    pub slaves: Option<String>,
    #[serde(rename = "vlan-raw-device")]
    pub vlan_raw_device: Option<String>,
    #[serde(rename = "vlan-id", deserialize_with = "lenient_u64")]
    pub vlan_id: Option<u64>,
    pub comments: Option<String>,
}

impl NodeNetwork {
    pub fn bond_members(&self) -> impl Iterator<Item = &str> + '_ {
        self.slaves.as_deref().unwrap_or_default().split_whitespace()
    }

    /// The device a VLAN interface sits on and its VLAN id, either
    /// explicit or taken from a `<device>.<vid>` name.
    pub fn vlan(&self) -> Option<(String, u16)> {
        if self.kind != "vlan" {
            return None;
        }
        let (name_device, name_vid) = match self.iface.rsplit_once('.') {
            Some((device, vid)) => (Some(device), vid.parse::<u16>().ok()),
            None => (None, None),
        };
        let device = self.vlan_raw_device.as_deref().or(name_device)?;
        let vid = self
            .vlan_id
            .and_then(|vid| u16::try_from(vid).ok())
            .or(name_vid)?;
        Some((device.to_owned(), vid))
    }
}

/// An entry of `/nodes/{node}/qemu` or `/nodes/{node}/lxc`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct GuestSummary {
    #[serde(deserialize_with = "lenient_u64")]
    pub vmid: Option<u64>,
    pub name: Option<String>,
    pub status: String,
    #[serde(deserialize_with = "flag")]
    pub template: bool,
    /// Bytes.
    #[serde(deserialize_with = "lenient_u64")]
    pub maxmem: Option<u64>,
    /// Bytes.
    #[serde(deserialize_with = "lenient_u64")]
    pub maxdisk: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub cpus: Option<u64>,
}

/// A guest configuration.  Only a few keys are fixed; network devices are
/// `net0`, `net1` and so on.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub(crate) struct GuestConfig(pub BTreeMap<String, Value>);

impl GuestConfig {
    pub fn string(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn number(&self, key: &str) -> Option<u64> {
        match self.0.get(key)? {
            Value::Number(number) => number.as_u64(),
            Value::String(string) => string.trim().parse().ok(),
            _ => None,
        }
    }

    /// Whether the QEMU guest agent is enabled: `agent: 1` or
    /// `agent: enabled=1,fstrim_cloned_disks=1`.
    pub fn agent_enabled(&self) -> bool {
        match self.0.get("agent") {
            Some(Value::Number(number)) => number.as_u64() == Some(1),
            Some(Value::String(agent)) => {
                let first = agent.split(',').next().unwrap_or_default();
                first == "1" || first == "enabled=1"
            }
            _ => false,
        }
    }

    /// Network devices by index, in index order.
    pub fn networks(&self) -> Vec<(u32, NetDevice)> {
        let mut networks: Vec<(u32, NetDevice)> = self
            .0
            .iter()
            .filter_map(|(key, value)| {
                let index = key.strip_prefix("net")?.parse::<u32>().ok()?;
                Some((index, NetDevice::parse(value.as_str()?)))
            })
            .collect();
        networks.sort_by_key(|(index, _)| *index);
        networks
    }
}

/// A parsed `netN` value.  QEMU writes
/// `virtio=BC:24:11:5E:2A:01,bridge=vmbr0,tag=20`, LXC writes
/// `name=eth0,bridge=vmbr0,hwaddr=BC:24:11:5E:2A:01,ip=10.0.0.5/24`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct NetDevice {
    /// Interface name inside a container.
    pub name: Option<String>,
    pub mac: Option<String>,
    pub bridge: Option<String>,
    pub tag: Option<u16>,
    pub link_down: bool,
    /// Static addresses of a container, in `address/length` form.
    pub addresses: Vec<String>,
}

/// NIC models QEMU accepts as the key carrying the MAC address.
const NIC_MODELS: &[&str] =
    &["virtio", "e1000", "e1000e", "rtl8139", "vmxnet3", "ne2k_pci", "pcnet"];

impl NetDevice {
    pub fn parse(value: &str) -> NetDevice {
        let mut device = NetDevice::default();
        for option in value.split(',') {
            let Some((key, value)) = option.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "name" => device.name = Some(value.to_owned()),
                "hwaddr" | "macaddr" => device.mac = Some(value.to_owned()),
                "bridge" => device.bridge = Some(value.to_owned()),
                "tag" => device.tag = value.parse().ok(),
                "link_down" => device.link_down = value == "1",
                "ip" | "ip6" => {
                    // `dhcp`, `auto` and `manual` carry no address.
                    if value.contains('/') {
                        device.addresses.push(value.to_owned());
                    }
                }
                model if NIC_MODELS.contains(&model) => {
                    device.mac = Some(value.to_owned());
                }
                _ => {}
            }
        }
        device
    }
}

/// An interface reported by the QEMU guest agent.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct AgentInterface {
    pub name: String,
    #[serde(rename = "hardware-address", default)]
    pub hardware_address: Option<String>,
    #[serde(rename = "ip-addresses", default)]
    pub ip_addresses: Vec<AgentAddress>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct AgentAddress {
    #[serde(rename = "ip-address")]
    pub ip_address: String,
    pub prefix: u8,
}

/// `agent/get-osinfo`
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AgentOsInfo {
    #[serde(rename = "pretty-name")]
    pub pretty_name: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
}

impl AgentOsInfo {
    pub fn platform_name(&self) -> Option<String> {
        if let Some(pretty) = self.pretty_name.as_deref() {
            if !pretty.is_empty() {
                return Some(pretty.to_owned());
            }
        }
        match (self.name.as_deref(), self.version.as_deref()) {
            (Some(name), Some(version)) => Some(format!("{name} {version}")),
            (Some(name), None) => Some(name.to_owned()),
            _ => None,
        }
    }
}

/// Platform name for the `ostype` of a guest configuration.
pub(crate) fn configured_os_name(ostype: &str) -> String {
    let name = match ostype {
        "l24" => "Linux 2.4 Kernel",
        "l26" => "Linux 2.6 - 6.X Kernel",
        "win11" => "Microsoft Windows 11/2022/2025",
        "win10" => "Microsoft Windows 10/2016/2019",
        "win8" => "Microsoft Windows 8.x/2012/2012r2",
        "win7" => "Microsoft Windows 7/2008r2",
        "w2k8" => "Microsoft Windows Vista/2008",
        "wxp" => "Microsoft Windows XP",
        "w2k" => "Microsoft Windows 2000",
        "solaris" => "Solaris Kernel",
        "other" => "Other OS",
        // Containers report the distribution.
        "alpine" => "Alpine Linux",
        "archlinux" => "Arch Linux",
        "centos" => "CentOS",
        "debian" => "Debian",
        "devuan" => "Devuan",
        "fedora" => "Fedora",
        "gentoo" => "Gentoo",
        "nixos" => "NixOS",
        "opensuse" => "openSUSE",
        "ubuntu" => "Ubuntu",
        "unmanaged" => "Unmanaged",
        other => return other.to_owned(),
    };
    name.to_owned()
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_qemu_net_device() {
        let device = NetDevice::parse(
            "virtio=BC:24:11:5E:2A:01,bridge=vmbr0,firewall=1,tag=20",
        );
        assert_eq!(device.mac.as_deref(), Some("BC:24:11:5E:2A:01"));
        assert_eq!(device.bridge.as_deref(), Some("vmbr0"));
        assert_eq!(device.tag, Some(20));
        assert!(device.name.is_none());
        assert!(!device.link_down);
    }

    #[test]
    fn test_parse_lxc_net_device() {
        let device = NetDevice::parse(
            "name=eth0,bridge=vmbr1,hwaddr=BC:24:11:00:00:02,ip=10.0.0.5/24,\
             ip6=auto,type=veth,link_down=1",
        );
        assert_eq!(device.name.as_deref(), Some("eth0"));
        assert_eq!(device.mac.as_deref(), Some("BC:24:11:00:00:02"));
        assert_eq!(device.addresses, vec![String::from("10.0.0.5/24")]);
        assert!(device.link_down);
    }

    #[test]
    fn test_guest_config_networks_in_order() {
        let config: GuestConfig = serde_json::from_value(json!({
            "name": "vm1",
            "net10": "virtio=BC:24:11:00:00:0A,bridge=vmbr0",
            "net2": "virtio=BC:24:11:00:00:02,bridge=vmbr0",
            "agent": "enabled=1,fstrim_cloned_disks=1",
            "memory": "2048",
        }))
        .unwrap();
        let indexes: Vec<u32> =
            config.networks().into_iter().map(|(index, _)| index).collect();
        assert_eq!(indexes, [2, 10]);
        assert!(config.agent_enabled());
        assert_eq!(config.number("memory"), Some(2048));
    }

    #[test]
    fn test_vlan_interface() {
        let named: NodeNetwork = serde_json::from_value(json!({
            "iface": "vmbr0.30",
            "type": "vlan",
        }))
        .unwrap();
        assert_eq!(named.vlan(), Some((String::from("vmbr0"), 30)));

        let explicit: NodeNetwork = serde_json::from_value(json!({
            "iface": "mgmt",
            "type": "vlan",
            "vlan-raw-device": "bond0",
            "vlan-id": "40",
        }))
        .unwrap();
        assert_eq!(explicit.vlan(), Some((String::from("bond0"), 40)));
    }

    #[test]
    fn test_node_release() {
        let status = NodeStatus {
            pveversion: Some(String::from("pve-manager/8.1.4/ec5affc9")),
            ..Default::default()
        };
        assert_eq!(status.release(), Some("8.1.4"));
    }
}

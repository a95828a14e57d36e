// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Turning a Proxmox snapshot into inventory records

use super::api::configured_os_name;
use super::api::AgentInterface;
use super::api::NetDevice;
use super::api::NodeNetwork;
use super::Guest;
use super::GuestKind;
use super::Node;
use super::Snapshot;
use crate::helpers::is_routable;
use crate::helpers::primary_addresses;
use crate::helpers::site_for;
use crate::helpers::skips_vm_interface;
use crate::helpers::tenant_for;
use crate::helpers::vlan_group_for;
use crate::helpers::SubnetFilter;
use crate::SourceError;
use serde_json::json;
use slog::debug;
use slog::warn;
use slog::Logger;
use ssot_common::ErrorKind;
use ssot_common::InlineErrorChain;
use ssot_config::SourceConfig;
use ssot_config::VmOsPreference;
use ssot_inventory::Inventory;
use ssot_inventory::InventoryError;
use ssot_inventory::Writer;
use ssot_types::choice::ClusterStatus;
use ssot_types::choice::DeviceStatus;
use ssot_types::choice::InterfaceMode;
use ssot_types::choice::InterfaceType;
use ssot_types::choice::IpStatus;
use ssot_types::choice::VlanStatus;
use ssot_types::choice::VmStatus;
use ssot_types::constants::SourceType;
use ssot_types::constants::CUSTOM_FIELD_HOST_CPU_CORES;
use ssot_types::constants::CUSTOM_FIELD_HOST_MEMORY;
use ssot_types::constants::ROLE_SERVER;
use ssot_types::dcim::Device;
use ssot_types::dcim::DeviceRole;
use ssot_types::dcim::Interface;
use ssot_types::dcim::Platform;
use ssot_types::ipam::AssignedObject;
use ssot_types::ipam::IpAddress;
use ssot_types::ipam::Vlan;
use ssot_types::tenancy::Tenant;
use ssot_types::virtualization::Cluster;
use ssot_types::virtualization::ClusterGroup;
use ssot_types::virtualization::ClusterType;
use ssot_types::virtualization::VirtualMachine;
use ssot_types::virtualization::VmInterface;
use ssot_types::Base;
use ssot_types::Record;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

const BYTES_PER_MB: u64 = 1024 * 1024;
const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

pub(crate) struct Syncer<'a> {
    log: &'a Logger,
    config: &'a SourceConfig,
    inventory: &'a Inventory,
    writer: &'a Writer,
    subnets: SubnetFilter,
}

impl<'a> Syncer<'a> {
    pub fn new(
        log: &'a Logger,
        config: &'a SourceConfig,
        inventory: &'a Inventory,
        writer: &'a Writer,
    ) -> Syncer<'a> {
        let subnets = SubnetFilter::from_config(config);
        Syncer { log, config, inventory, writer, subnets }
    }

    pub async fn run(&self, snapshot: &Snapshot) -> Result<(), SourceError> {
        let cluster = self.sync_cluster(&snapshot.cluster_name).await?;
        for node in &snapshot.nodes {
            let Some(host) = self.sync_node(&cluster, node).await? else {
                continue;
            };
            for guest in &node.guests {
                self.sync_guest(&cluster, &host, guest).await?;
            }
        }
        Ok(())
    }

    /// Invalid records are logged and left out; anything else ends the
    /// sync.
    fn tolerate<T>(
        &self,
        result: Result<T, InventoryError>,
    ) -> Result<Option<T>, SourceError> {
        match result {
            Ok(record) => Ok(Some(record)),
            Err(error) if error.kind() == ErrorKind::DataQuality => {
                warn!(self.log, "skipping invalid record";
                    "error" => InlineErrorChain::new(&error),
                );
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn tenant(
        &self,
        relations: &ssot_config::RegexRelations,
        name: &str,
    ) -> Option<Arc<Tenant>> {
        tenant_for(self.log, self.inventory, relations, name).await
    }

    async fn sync_cluster(
        &self,
        name: &str,
    ) -> Result<Arc<Cluster>, SourceError> {
        let relations = &self.config.relations;
        let cluster_type = self
            .inventory
            .add_cluster_type(
                self.writer,
                ClusterType {
                    name: SourceType::Proxmox.cluster_type_name().to_owned(),
                    ..Default::default()
                },
            )
            .await?;
        let group = match relations.datacenter_cluster_group.find(name) {
            Some(group) => Some(
                self.inventory
                    .add_cluster_group(
                        self.writer,
                        ClusterGroup {
                            name: group.to_owned(),
                            ..Default::default()
                        },
                    )
                    .await?,
            ),
            None => None,
        };
        let site =
            site_for(self.log, self.inventory, &relations.cluster_site, name)
                .await;
        let tenant = self.tenant(&relations.cluster_tenant, name).await;
        let cluster = self
            .inventory
            .add_cluster(
                self.writer,
                Cluster {
                    name: name.to_owned(),
                    cluster_type: Some(cluster_type),
                    status: ClusterStatus::Active,
                    group,
                    site,
                    tenant,
                    ..Default::default()
                },
            )
            .await?;
        Ok(cluster)
    }

    /// The role a node maps to.  The default roles exist from bootstrap;
    /// other names are created on first use.
    async fn role(&self, name: &str) -> Result<Arc<DeviceRole>, SourceError> {
        let role_name =
            self.config.relations.host_role.find(name).unwrap_or(ROLE_SERVER);
        if let Some(role) = self.inventory.get_device_role(role_name).await {
            return Ok(role);
        }
        let role = self
            .inventory
            .add_device_role(
                self.writer,
                DeviceRole { name: role_name.to_owned(), ..Default::default() },
            )
            .await?;
        Ok(role)
    }

    /// Adds a node with its interfaces and addresses.  Returns `None` when
    /// the node was left out.
    async fn sync_node(
        &self,
        cluster: &Arc<Cluster>,
        node: &Node,
    ) -> Result<Option<Arc<Device>>, SourceError> {
        let relations = &self.config.relations;
        let site = match site_for(
            self.log,
            self.inventory,
            &relations.host_site,
            &node.name,
        )
        .await
        {
            Some(site) => Some(site),
            None => cluster.site.clone(),
        };
        if site.is_none() {
            warn!(self.log, "skipping node without a site";
                "node" => &node.name,
            );
            return Ok(None);
        }

        let role = self.role(&node.name).await?;
        let device_type =
            self.inventory.add_generic_device_type(self.writer).await?;
        let platform = match node.status.release() {
            Some(release) => Some(
                self.inventory
                    .add_platform(
                        self.writer,
                        Platform {
                            name: format!("Proxmox VE {release}"),
                            ..Default::default()
                        },
                    )
                    .await?,
            ),
            None => None,
        };

        let mut base = Base::default();
        if let Some(cpus) = node.status.cpuinfo.cpus {
            base.custom_fields
                .insert(CUSTOM_FIELD_HOST_CPU_CORES.to_owned(), json!(cpus));
        }
        if let Some(total) = node.status.memory.total {
            base.custom_fields.insert(
                CUSTOM_FIELD_HOST_MEMORY.to_owned(),
                json!(format!("{} GB", total / BYTES_PER_GB)),
            );
        }
        let record = Device {
            base,
            name: node.name.clone(),
            role: Some(role),
            device_type: Some(device_type),
            site,
            cluster: Some(Arc::clone(cluster)),
            tenant: self.tenant(&relations.host_tenant, &node.name).await,
            platform,
            status: if node.online {
                DeviceStatus::Active
            } else {
                DeviceStatus::Offline
            },
            ..Default::default()
        };
        let added =
            self.inventory.add_device(self.writer, record.clone()).await;
        let Some(device) = self.tolerate(added)? else {
            return Ok(None);
        };

        let addresses = self.sync_node_networks(&device, node).await?;
        let (primary_ip4, primary_ip6) = primary_addresses(&addresses);
        if primary_ip4.is_none() && primary_ip6.is_none() {
            return Ok(Some(device));
        }
        let device = self
            .inventory
            .add_device(
                self.writer,
                Device { primary_ip4, primary_ip6, ..record },
            )
            .await?;
        Ok(Some(device))
    }

    /// Adds the node's interfaces in two passes, so that bond members and
    /// VLAN interfaces can point at interfaces added in the first, then
    /// their addresses.
    async fn sync_node_networks(
        &self,
        device: &Arc<Device>,
        node: &Node,
    ) -> Result<Vec<Arc<IpAddress>>, SourceError> {
        let mut interfaces: BTreeMap<&str, Arc<Interface>> = BTreeMap::new();
        for network in &node.networks {
            let added = self
                .inventory
                .add_interface(self.writer, node_interface(device, network))
                .await;
            if let Some(interface) = self.tolerate(added)? {
                interfaces.insert(&network.iface, interface);
            }
        }

        for network in &node.networks {
            if network.kind == "bond" {
                let Some(bond) = interfaces.get(network.iface.as_str()).cloned() else {
                    continue;
                };
                for member in network.bond_members() {
                    let Some(network) =
                        node.networks.iter().find(|n| n.iface == member)
                    else {
                        continue;
                    };
                    let interface = Interface {
                        lag: Some(Arc::clone(&bond)),
                        ..node_interface(device, network)
                    };
                    let added =
                        self.inventory.add_interface(self.writer, interface);
                    if let Some(interface) = self.tolerate(added.await)? {
                        interfaces.insert(&network.iface, interface);
                    }
                }
            }
            if let Some((raw_device, vid)) = network.vlan() {
                let Some(parent) = interfaces.get(raw_device.as_str()) else {
                    continue;
                };
                debug!(self.log, "vlan interface";
                    "interface" => &network.iface,
                    "parent" => &raw_device,
                    "vid" => vid,
                );
                let interface = Interface {
                    parent: Some(Arc::clone(parent)),
                    ..node_interface(device, network)
                };
                let added =
                    self.inventory.add_interface(self.writer, interface);
                if let Some(interface) = self.tolerate(added.await)? {
                    interfaces.insert(&network.iface, interface);
                }
            }
        }

        let mut addresses = Vec::new();
        for network in &node.networks {
            let Some(interface) = interfaces.get(network.iface.as_str()) else {
                continue;
            };
            let cidrs = [network.cidr.as_deref(), network.cidr6.as_deref()];
            for cidr in cidrs.into_iter().flatten() {
                let assigned = AssignedObject::device_interface(interface.id());
                let tenant = device.tenant.clone();
                if let Some(address) =
                    self.sync_address(cidr, assigned, tenant).await?
                {
                    addresses.push(address);
                }
            }
        }
        Ok(addresses)
    }

    /// Adds `address` when it is routable and the source's subnets permit
    /// it.
    async fn sync_address(
        &self,
        address: &str,
        assigned: AssignedObject,
        tenant: Option<Arc<Tenant>>,
    ) -> Result<Option<Arc<IpAddress>>, SourceError> {
        let host = address.split('/').next().unwrap_or_default();
        let Ok(ip) = host.parse::<IpAddr>() else {
            warn!(self.log, "skipping unparseable address";
                "address" => address,
            );
            return Ok(None);
        };
        if !is_routable(ip) || !self.subnets.permits(ip) {
            debug!(self.log, "address filtered"; "address" => address);
            return Ok(None);
        }
        let added = self
            .inventory
            .add_ip_address(
                self.writer,
                IpAddress {
                    address: address.to_owned(),
                    status: IpStatus::Active,
                    tenant,
                    assigned_object: Some(assigned),
                    ..Default::default()
                },
            )
            .await;
        self.tolerate(added)
    }

    async fn platform(
        &self,
        guest: &Guest,
    ) -> Result<Option<Arc<Platform>>, SourceError> {
        let reported =
            guest.agent_os.as_ref().and_then(|os| os.platform_name());
        let configured = guest.config.string("ostype").map(configured_os_name);
        let name = match self.config.vm_os_preference {
            VmOsPreference::Guest => reported.or(configured),
            VmOsPreference::Configured => configured.or(reported),
        };
        let Some(name) = name else {
            return Ok(None);
        };
        let added = self
            .inventory
            .add_platform(self.writer, Platform { name, ..Default::default() })
            .await;
        self.tolerate(added)
    }

    async fn sync_guest(
        &self,
        cluster: &Arc<Cluster>,
        host: &Arc<Device>,
        guest: &Guest,
    ) -> Result<(), SourceError> {
        let Some(name) = guest.name() else {
            warn!(self.log, "skipping guest without a name";
                "vmid" => guest.vmid,
            );
            return Ok(());
        };
        let record = VirtualMachine {
            name: name.to_owned(),
            status: if guest.is_running() {
                VmStatus::Active
            } else {
                VmStatus::Offline
            },
            cluster: Some(Arc::clone(cluster)),
            site: cluster.site.clone().or_else(|| host.site.clone()),
            tenant: self.tenant(&self.config.relations.vm_tenant, name).await,
            device: Some(Arc::clone(host)),
            platform: self.platform(guest).await?,
            vcpus: vcpus(guest).map(|vcpus| vcpus as f64),
            memory: guest.config.number("memory").or_else(|| {
                guest.summary.maxmem.map(|bytes| bytes / BYTES_PER_MB)
            }),
            disk: guest
                .summary
                .maxdisk
                .map(|bytes| bytes / BYTES_PER_GB)
                .filter(|gb| *gb > 0),
            comments: guest
                .config
                .string("description")
                .unwrap_or_default()
                .trim()
                .to_owned(),
            ..Default::default()
        };
        let added = self.inventory.add_vm(self.writer, record.clone()).await;
        let Some(vm) = self.tolerate(added)? else {
            return Ok(());
        };

        let mut addresses = Vec::new();
        for (index, net) in guest.config.networks() {
            let agent = agent_interface(guest, &net);
            let interface_name = agent
                .map(|agent| agent.name.clone())
                .or_else(|| net.name.clone())
                .unwrap_or_else(|| format!("net{index}"));
            let vlan = match net.tag {
                Some(vid) => self.sync_vlan(vid).await?,
                None => None,
            };
            let interface = VmInterface {
                virtual_machine: Some(Arc::clone(&vm)),
                name: interface_name,
                enabled: !net.link_down,
                mac_address: net.mac.clone(),
                mode: vlan.as_ref().map(|_| InterfaceMode::Access),
                untagged_vlan: vlan,
                ..Default::default()
            };
            let added =
                self.inventory.add_vm_interface(self.writer, interface).await;
            let Some(interface) = self.tolerate(added)? else {
                continue;
            };

            let filter = self.config.interface_filter.as_ref();
            let candidates: Vec<String> =
                if skips_vm_interface(self.log, filter, &interface.name) {
                    Vec::new()
                } else {
                    match (guest.kind, agent) {
                        (GuestKind::Qemu, Some(agent)) => agent
                            .ip_addresses
                            .iter()
                            .map(|ip| {
                                format!("{}/{}", ip.ip_address, ip.prefix)
                            })
                            .collect(),
                        (GuestKind::Qemu, None) => Vec::new(),
                        (GuestKind::Lxc, _) => net.addresses.clone(),
                    }
                };
            for candidate in &candidates {
                let assigned = AssignedObject::vm_interface(interface.id());
                if let Some(address) = self
                    .sync_address(candidate, assigned, vm.tenant.clone())
                    .await?
                {
                    addresses.push(address);
                }
            }
        }

        let (primary_ip4, primary_ip6) = primary_addresses(&addresses);
        if primary_ip4.is_some() || primary_ip6.is_some() {
            self.inventory
                .add_vm(
                    self.writer,
                    VirtualMachine { primary_ip4, primary_ip6, ..record },
                )
                .await?;
        }
        Ok(())
    }

    /// The VLAN a guest NIC is tagged with.
    async fn sync_vlan(
        &self,
        vid: u16,
    ) -> Result<Option<Arc<Vlan>>, SourceError> {
        let relations = &self.config.relations;
        let name = format!("VLAN {vid}");
        let group = vlan_group_for(
            self.log,
            self.inventory,
            self.writer,
            relations,
            &name,
        )
        .await?;
        let site =
            site_for(self.log, self.inventory, &relations.vlan_site, &name)
                .await;
        let added = self
            .inventory
            .add_vlan(
                self.writer,
                Vlan {
                    group: Some(group),
                    site,
                    tenant: self.tenant(&relations.vlan_tenant, &name).await,
                    vid,
                    name,
                    status: VlanStatus::Active,
                    ..Default::default()
                },
            )
            .await;
        self.tolerate(added)
    }
}

fn node_interface(device: &Arc<Device>, network: &NodeNetwork) -> Interface {
    let interface_type = match network.kind.as_str() {
        "bond" | "OVSBond" => InterfaceType::Lag,
        "bridge" | "OVSBridge" => InterfaceType::Bridge,
        "vlan" | "OVSIntPort" | "alias" => InterfaceType::Virtual,
        _ => InterfaceType::Other,
    };
    Interface {
        base: Base {
            description: network
                .comments
                .as_deref()
                .unwrap_or_default()
                .trim()
                .to_owned(),
            ..Default::default()
        },
        device: Some(Arc::clone(device)),
        name: network.iface.clone(),
        interface_type,
        enabled: network.active,
        mtu: network.mtu.and_then(|mtu| u32::try_from(mtu).ok()),
        ..Default::default()
    }
}

/// Virtual CPUs: the explicit `vcpus` limit, `sockets * cores`, or what the
/// node reports.
fn vcpus(guest: &Guest) -> Option<u64> {
    let config = &guest.config;
    if let Some(vcpus) = config.number("vcpus") {
        return Some(vcpus);
    }
    match (guest.kind, config.number("cores")) {
        (GuestKind::Qemu, Some(cores)) => {
            Some(cores.saturating_mul(config.number("sockets").unwrap_or(1)))
        }
        (GuestKind::Lxc, Some(cores)) => Some(cores),
        (_, None) => guest.summary.cpus,
    }
}

/// The guest agent's view of a NIC, matched by MAC address.
fn agent_interface<'g>(
    guest: &'g Guest,
    net: &NetDevice,
) -> Option<&'g AgentInterface> {
    let mac = net.mac.as_deref()?;
    guest.agent_interfaces.iter().find(|agent| {
        agent
            .hardware_address
            .as_deref()
            .is_some_and(|address| address.eq_ignore_ascii_case(mac))
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::proxmox::api::GuestSummary;

    fn guest(kind: GuestKind, config: serde_json::Value) -> Guest {
        Guest {
            kind,
            vmid: 100,
            summary: GuestSummary { cpus: Some(3), ..Default::default() },
            config: serde_json::from_value(config).unwrap(),
            agent_interfaces: Vec::new(),
            agent_os: None,
        }
    }

    #[test]
    fn test_vcpus() {
        let qemu = |config| vcpus(&guest(GuestKind::Qemu, config));
        assert_eq!(qemu(json!({"vcpus": 3, "cores": 4})), Some(3));
        assert_eq!(qemu(json!({"cores": 4, "sockets": "2"})), Some(8));
        assert_eq!(qemu(json!({"cores": 4})), Some(4));
        assert_eq!(qemu(json!({})), Some(3));
        // Nonsense from upstream saturates instead of overflowing.
        assert_eq!(
            qemu(json!({"cores": u64::MAX, "sockets": 4})),
            Some(u64::MAX)
        );
        let lxc = vcpus(&guest(GuestKind::Lxc, json!({"cores": 2})));
        assert_eq!(lxc, Some(2));
    }
}

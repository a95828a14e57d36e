// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One add operation and one lookup per managed kind
//!
//! Every `add_*` normalises and validates its record before any registry
//! traffic, then goes through [`Inventory::add`].

use crate::engine::Inventory;
use crate::engine::Writer;
use crate::error::InventoryError;
use ssot_types::address::canonical_ip;
use ssot_types::address::canonical_mac;
use ssot_types::address::canonical_prefix;
use ssot_types::constants::DEFAULT_ROLE_COLOR;
use ssot_types::constants::GENERIC_DEVICE_TYPE;
use ssot_types::constants::GENERIC_MANUFACTURER;
use ssot_types::dcim::Device;
use ssot_types::dcim::DeviceRole;
use ssot_types::dcim::DeviceType;
use ssot_types::dcim::Interface;
use ssot_types::dcim::Manufacturer;
use ssot_types::dcim::Platform;
use ssot_types::dcim::Site;
use ssot_types::dcim::VirtualDeviceContext;
use ssot_types::extras::is_valid_color;
use ssot_types::extras::CustomField;
use ssot_types::extras::Tag;
use ssot_types::ipam::IpAddress;
use ssot_types::ipam::Prefix;
use ssot_types::ipam::Vlan;
use ssot_types::ipam::VlanGroup;
use ssot_types::ipam::MAX_VID;
use ssot_types::slugify;
use ssot_types::tenancy::Tenant;
use ssot_types::virtualization::Cluster;
use ssot_types::virtualization::ClusterGroup;
use ssot_types::virtualization::ClusterType;
use ssot_types::virtualization::VirtualMachine;
use ssot_types::virtualization::VmInterface;
use ssot_types::Record;
use std::sync::Arc;

fn require_name<T: Record>(name: &str) -> Result<(), InventoryError> {
    if name.trim().is_empty() {
        return Err(InventoryError::invalid(T::KIND, name, "name is empty"));
    }
    Ok(())
}

fn default_slug(slug: &mut String, name: &str) {
    if slug.is_empty() {
        *slug = slugify(name);
    }
}

/// Accepts `#RRGGBB` and uppercase digits; stores six lowercase digits.
fn normalize_color<T: Record>(
    color: &mut String,
    key: &str,
) -> Result<(), InventoryError> {
    let normalized = color.trim().trim_start_matches('#').to_ascii_lowercase();
    if !is_valid_color(&normalized) {
        return Err(InventoryError::invalid(
            T::KIND,
            key,
            format!("color {color:?} is not six hex digits"),
        ));
    }
    *color = normalized;
    Ok(())
}

fn check_mtu<T: Record>(
    mtu: Option<u32>,
    key: &str,
) -> Result<(), InventoryError> {
    if mtu == Some(0) {
        return Err(InventoryError::invalid(T::KIND, key, "mtu must be > 0"));
    }
    Ok(())
}

fn normalize_mac<T: Record>(
    mac: &mut Option<String>,
    key: &str,
) -> Result<(), InventoryError> {
    if let Some(value) = mac.as_deref() {
        if value.is_empty() {
            *mac = None;
        } else {
            let canonical = canonical_mac(value).map_err(|error| {
                InventoryError::invalid(T::KIND, key, error.to_string())
            })?;
            *mac = Some(canonical);
        }
    }
    Ok(())
}

impl Inventory {
    pub async fn add_tag(
        &self,
        writer: &Writer,
        mut tag: Tag,
    ) -> Result<Arc<Tag>, InventoryError> {
        require_name::<Tag>(&tag.name)?;
        default_slug(&mut tag.slug, &tag.name);
        normalize_color::<Tag>(&mut tag.color, &tag.name)?;
        self.add(writer, tag).await
    }

    pub async fn add_custom_field(
        &self,
        writer: &Writer,
        field: CustomField,
    ) -> Result<Arc<CustomField>, InventoryError> {
        require_name::<CustomField>(&field.name)?;
        self.add(writer, field).await
    }

    pub async fn add_tenant(
        &self,
        writer: &Writer,
        mut tenant: Tenant,
    ) -> Result<Arc<Tenant>, InventoryError> {
        require_name::<Tenant>(&tenant.name)?;
        default_slug(&mut tenant.slug, &tenant.name);
        self.add(writer, tenant).await
    }

    pub async fn add_site(
        &self,
        writer: &Writer,
        mut site: Site,
    ) -> Result<Arc<Site>, InventoryError> {
        require_name::<Site>(&site.name)?;
        default_slug(&mut site.slug, &site.name);
        self.add(writer, site).await
    }

    pub async fn add_manufacturer(
        &self,
        writer: &Writer,
        mut manufacturer: Manufacturer,
    ) -> Result<Arc<Manufacturer>, InventoryError> {
        require_name::<Manufacturer>(&manufacturer.name)?;
        default_slug(&mut manufacturer.slug, &manufacturer.name);
        self.add(writer, manufacturer).await
    }

    pub async fn add_platform(
        &self,
        writer: &Writer,
        mut platform: Platform,
    ) -> Result<Arc<Platform>, InventoryError> {
        require_name::<Platform>(&platform.name)?;
        default_slug(&mut platform.slug, &platform.name);
        self.add(writer, platform).await
    }

    pub async fn add_device_type(
        &self,
        writer: &Writer,
        mut device_type: DeviceType,
    ) -> Result<Arc<DeviceType>, InventoryError> {
        require_name::<DeviceType>(&device_type.model)?;
        default_slug(&mut device_type.slug, &device_type.model);
        self.add(writer, device_type).await
    }

    /// The fallback device type for hosts whose model is unknown, with its
    /// manufacturer.
    pub async fn add_generic_device_type(
        &self,
        writer: &Writer,
    ) -> Result<Arc<DeviceType>, InventoryError> {
        let manufacturer = self
            .add_manufacturer(
                writer,
                Manufacturer {
                    name: GENERIC_MANUFACTURER.to_owned(),
                    ..Default::default()
                },
            )
            .await?;
        self.add_device_type(
            writer,
            DeviceType {
                manufacturer: Some(manufacturer),
                model: GENERIC_DEVICE_TYPE.to_owned(),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn add_device_role(
        &self,
        writer: &Writer,
        mut role: DeviceRole,
    ) -> Result<Arc<DeviceRole>, InventoryError> {
        require_name::<DeviceRole>(&role.name)?;
        default_slug(&mut role.slug, &role.name);
        if role.color.is_empty() {
            role.color = DEFAULT_ROLE_COLOR.to_owned();
        }
        normalize_color::<DeviceRole>(&mut role.color, &role.name)?;
        self.add(writer, role).await
    }

    pub async fn add_cluster_group(
        &self,
        writer: &Writer,
        mut group: ClusterGroup,
    ) -> Result<Arc<ClusterGroup>, InventoryError> {
        require_name::<ClusterGroup>(&group.name)?;
        default_slug(&mut group.slug, &group.name);
        self.add(writer, group).await
    }

    pub async fn add_cluster_type(
        &self,
        writer: &Writer,
        mut cluster_type: ClusterType,
    ) -> Result<Arc<ClusterType>, InventoryError> {
        require_name::<ClusterType>(&cluster_type.name)?;
        default_slug(&mut cluster_type.slug, &cluster_type.name);
        self.add(writer, cluster_type).await
    }

    pub async fn add_cluster(
        &self,
        writer: &Writer,
        cluster: Cluster,
    ) -> Result<Arc<Cluster>, InventoryError> {
        require_name::<Cluster>(&cluster.name)?;
        if cluster.cluster_type.is_none() {
            return Err(InventoryError::invalid(
                Cluster::KIND,
                &cluster.name,
                "cluster has no type",
            ));
        }
        self.add(writer, cluster).await
    }

    pub async fn add_vlan_group(
        &self,
        writer: &Writer,
        mut group: VlanGroup,
    ) -> Result<Arc<VlanGroup>, InventoryError> {
        require_name::<VlanGroup>(&group.name)?;
        default_slug(&mut group.slug, &group.name);
        self.add(writer, group).await
    }

    pub async fn add_vlan(
        &self,
        writer: &Writer,
        vlan: Vlan,
    ) -> Result<Arc<Vlan>, InventoryError> {
        let key = vlan.natural_key();
        if vlan.vid > MAX_VID {
            return Err(InventoryError::invalid(
                Vlan::KIND,
                key,
                format!("vid {} is not between 0 and {MAX_VID}", vlan.vid),
            ));
        }
        if vlan.name.trim().is_empty() {
            return Err(InventoryError::invalid(
                Vlan::KIND,
                key,
                "name is empty",
            ));
        }
        self.add(writer, vlan).await
    }

    pub async fn add_device(
        &self,
        writer: &Writer,
        mut device: Device,
    ) -> Result<Arc<Device>, InventoryError> {
        require_name::<Device>(&device.name)?;
        if device.role.is_none() || device.device_type.is_none() {
            return Err(InventoryError::invalid(
                Device::KIND,
                &device.name,
                "device needs a role and a device type",
            ));
        }
        if device.asset_tag.as_deref() == Some("") {
            device.asset_tag = None;
        }
        self.add(writer, device).await
    }

    pub async fn add_virtual_device_context(
        &self,
        writer: &Writer,
        vdc: VirtualDeviceContext,
    ) -> Result<Arc<VirtualDeviceContext>, InventoryError> {
        require_name::<VirtualDeviceContext>(&vdc.name)?;
        if vdc.device.is_none() {
            return Err(InventoryError::invalid(
                VirtualDeviceContext::KIND,
                &vdc.name,
                "virtual device context has no device",
            ));
        }
        self.add(writer, vdc).await
    }

    /// Adds a device interface.  At most one of `parent` and `lag` may be
    /// set, and it must be an interface of the same device.
    pub async fn add_interface(
        &self,
        writer: &Writer,
        mut interface: Interface,
    ) -> Result<Arc<Interface>, InventoryError> {
        require_name::<Interface>(&interface.name)?;
        let key = interface.name.clone();
        let invalid = |message: String| {
            InventoryError::invalid(Interface::KIND, &key, message)
        };
        if interface.device.is_none() {
            return Err(invalid(String::from("interface has no device")));
        }
        check_mtu::<Interface>(interface.mtu, &key)?;
        normalize_mac::<Interface>(&mut interface.mac_address, &key)?;

        let related = match (&interface.parent, &interface.lag) {
            (Some(_), Some(_)) => {
                return Err(invalid(String::from(
                    "interface cannot have both a parent and a lag",
                )));
            }
            (Some(related), None) | (None, Some(related)) => {
                Some(related.id())
            }
            (None, None) => None,
        };
        if let Some(related_id) = related {
            let related = self.get_by_id::<Interface>(related_id).await;
            match related {
                Some(related)
                    if related.device_id() == interface.device_id() =>
                {
                    if related.natural_key() == interface.natural_key() {
                        return Err(invalid(String::from(
                            "interface cannot be its own parent or lag",
                        )));
                    }
                }
                Some(related) => {
                    return Err(invalid(format!(
                        "parent or lag {:?} belongs to another device",
                        related.name
                    )));
                }
                // Reported as a missing prerequisite by the add.
                None => {}
            }
        }
        self.add(writer, interface).await
    }

    pub async fn add_vm(
        &self,
        writer: &Writer,
        vm: VirtualMachine,
    ) -> Result<Arc<VirtualMachine>, InventoryError> {
        require_name::<VirtualMachine>(&vm.name)?;
        self.add(writer, vm).await
    }

    pub async fn add_vm_interface(
        &self,
        writer: &Writer,
        mut interface: VmInterface,
    ) -> Result<Arc<VmInterface>, InventoryError> {
        require_name::<VmInterface>(&interface.name)?;
        let key = interface.name.clone();
        if interface.virtual_machine.is_none() {
            return Err(InventoryError::invalid(
                VmInterface::KIND,
                &key,
                "interface has no virtual machine",
            ));
        }
        check_mtu::<VmInterface>(interface.mtu, &key)?;
        normalize_mac::<VmInterface>(&mut interface.mac_address, &key)?;
        self.add(writer, interface).await
    }

    pub async fn add_prefix(
        &self,
        writer: &Writer,
        mut prefix: Prefix,
    ) -> Result<Arc<Prefix>, InventoryError> {
        prefix.prefix = canonical_prefix(&prefix.prefix).map_err(|error| {
            InventoryError::invalid(
                Prefix::KIND,
                &prefix.prefix,
                error.to_string(),
            )
        })?;
        self.add(writer, prefix).await
    }

    /// Adds an address in canonical `address/length` form.  A dotted mask is
    /// converted to its length and a bare address gets a host mask.
    pub async fn add_ip_address(
        &self,
        writer: &Writer,
        mut address: IpAddress,
    ) -> Result<Arc<IpAddress>, InventoryError> {
        address.address = canonical_ip(&address.address).map_err(|error| {
            InventoryError::invalid(
                IpAddress::KIND,
                &address.address,
                error.to_string(),
            )
        })?;
        self.add(writer, address).await
    }

    pub async fn get_tag(&self, name: &str) -> Option<Arc<Tag>> {
        self.get::<Tag>(&name.to_owned()).await
    }

    pub async fn get_custom_field(
        &self,
        name: &str,
    ) -> Option<Arc<CustomField>> {
        self.get::<CustomField>(&name.to_owned()).await
    }

    pub async fn get_tenant(&self, name: &str) -> Option<Arc<Tenant>> {
        self.get::<Tenant>(&name.to_owned()).await
    }

    pub async fn get_site(&self, name: &str) -> Option<Arc<Site>> {
        self.get::<Site>(&name.to_owned()).await
    }

    pub async fn get_manufacturer(
        &self,
        name: &str,
    ) -> Option<Arc<Manufacturer>> {
        self.get::<Manufacturer>(&name.to_owned()).await
    }

    pub async fn get_platform(&self, name: &str) -> Option<Arc<Platform>> {
        self.get::<Platform>(&name.to_owned()).await
    }

    pub async fn get_device_type(
        &self,
        model: &str,
    ) -> Option<Arc<DeviceType>> {
        self.get::<DeviceType>(&model.to_owned()).await
    }

    pub async fn get_device_role(&self, name: &str) -> Option<Arc<DeviceRole>> {
        self.get::<DeviceRole>(&name.to_owned()).await
    }

    pub async fn get_cluster_group(
        &self,
        name: &str,
    ) -> Option<Arc<ClusterGroup>> {
        self.get::<ClusterGroup>(&name.to_owned()).await
    }

    pub async fn get_cluster_type(
        &self,
        name: &str,
    ) -> Option<Arc<ClusterType>> {
        self.get::<ClusterType>(&name.to_owned()).await
    }

    pub async fn get_cluster(&self, name: &str) -> Option<Arc<Cluster>> {
        self.get::<Cluster>(&name.to_owned()).await
    }

    pub async fn get_vlan_group(&self, name: &str) -> Option<Arc<VlanGroup>> {
        self.get::<VlanGroup>(&name.to_owned()).await
    }

    pub async fn get_vlan(&self, group_id: i64, vid: u16) -> Option<Arc<Vlan>> {
        self.get::<Vlan>(&(group_id, vid)).await
    }

    pub async fn get_device(
        &self,
        site_id: i64,
        name: &str,
    ) -> Option<Arc<Device>> {
        self.get::<Device>(&(site_id, name.to_owned())).await
    }

    pub async fn get_virtual_device_context(
        &self,
        device_id: i64,
        name: &str,
    ) -> Option<Arc<VirtualDeviceContext>> {
        self.get::<VirtualDeviceContext>(&(device_id, name.to_owned())).await
    }

    pub async fn get_vm(
        &self,
        cluster_id: i64,
        name: &str,
    ) -> Option<Arc<VirtualMachine>> {
        self.get::<VirtualMachine>(&(cluster_id, name.to_owned())).await
    }

    pub async fn get_prefix(&self, prefix: &str) -> Option<Arc<Prefix>> {
        let prefix = canonical_prefix(prefix).ok()?;
        self.get::<Prefix>(&prefix).await
    }

    pub async fn get_ip_address(
        &self,
        address: &str,
    ) -> Option<Arc<IpAddress>> {
        let address = canonical_ip(address).ok()?;
        self.get::<IpAddress>(&address).await
    }

    pub async fn interface_by_device_id_and_name(
        &self,
        device_id: i64,
        name: &str,
    ) -> Option<Arc<Interface>> {
        self.get::<Interface>(&(device_id, name.to_owned())).await
    }

    pub async fn vm_interface_by_vm_id_and_name(
        &self,
        vm_id: i64,
        name: &str,
    ) -> Option<Arc<VmInterface>> {
        self.get::<VmInterface>(&(vm_id, name.to_owned())).await
    }
}

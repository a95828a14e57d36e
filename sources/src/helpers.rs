// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Helpers shared by the adapters

use ipnetwork::IpNetwork;
use regex::Regex;
use slog::debug;
use slog::warn;
use slog::Logger;
use ssot_config::RegexRelations;
use ssot_config::SourceConfig;
use ssot_config::SourceRelations;
use ssot_inventory::Inventory;
use ssot_inventory::InventoryError;
use ssot_inventory::Writer;
use ssot_types::constants::DEFAULT_VLAN_GROUP;
use ssot_types::dcim::Site;
use ssot_types::ipam::IpAddress;
use ssot_types::ipam::VlanGroup;
use ssot_types::ipam::VlanGroupScope;
use ssot_types::tenancy::Tenant;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::LazyLock;

/// Interfaces created by container runtimes and overlay networks inside
/// guests.  Their addresses are never reachable from outside.
static CONTAINER_INTERFACES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(docker\d*|br-[0-9a-f]+|veth.*|cali.*|cilium.*|flannel.*|cni\d*|",
        r"vxlan.*|kube-ipvs\d*|tunl\d*|virbr\d*|lxc.*|lo)$",
    ))
    .expect("valid container interface pattern")
});

/// Looks up the site `name` maps to.  Sites are maintained by hand, so a
/// relation naming an unknown site is logged and ignored.
pub async fn site_for(
    log: &Logger,
    inventory: &Inventory,
    relations: &RegexRelations,
    name: &str,
) -> Option<Arc<Site>> {
    let site_name = relations.find(name)?;
    let site = inventory.get_site(site_name).await;
    if site.is_none() {
        warn!(log, "site relation names an unknown site";
            "object" => name,
            "site" => site_name,
        );
    }
    site
}

/// Looks up the tenant `name` maps to, like [`site_for`].
pub async fn tenant_for(
    log: &Logger,
    inventory: &Inventory,
    relations: &RegexRelations,
    name: &str,
) -> Option<Arc<Tenant>> {
    let tenant_name = relations.find(name)?;
    let tenant = inventory.get_tenant(tenant_name).await;
    if tenant.is_none() {
        warn!(log, "tenant relation names an unknown tenant";
            "object" => name,
            "tenant" => tenant_name,
        );
    }
    tenant
}

/// The VLAN group for VLAN `vlan_name`, [`DEFAULT_VLAN_GROUP`] unless a
/// relation says otherwise.  The group is created when missing, scoped to
/// the site its own name maps to, if any.
pub async fn vlan_group_for(
    log: &Logger,
    inventory: &Inventory,
    writer: &Writer,
    relations: &SourceRelations,
    vlan_name: &str,
) -> Result<Arc<VlanGroup>, InventoryError> {
    let name =
        relations.vlan_group.find(vlan_name).unwrap_or(DEFAULT_VLAN_GROUP);
    let site = site_for(log, inventory, &relations.vlan_group_site, name).await;
    inventory
        .add_vlan_group(
            writer,
            VlanGroup {
                name: name.to_owned(),
                scope: site.as_deref().map(VlanGroupScope::site),
                ..Default::default()
            },
        )
        .await
}

/// Which addresses a source may report.
#[derive(Clone, Debug, Default)]
pub struct SubnetFilter {
    permitted: Vec<IpNetwork>,
    ignored: Vec<IpNetwork>,
}

impl SubnetFilter {
    pub fn new(permitted: Vec<IpNetwork>, ignored: Vec<IpNetwork>) -> Self {
        SubnetFilter { permitted, ignored }
    }

    pub fn from_config(config: &SourceConfig) -> SubnetFilter {
        SubnetFilter::new(
            config.permitted_subnets.clone(),
            config.ignored_subnets.clone(),
        )
    }

    /// An empty permit list permits everything; the ignore list always
    /// applies.
    pub fn permits(&self, ip: IpAddr) -> bool {
        let permitted = self.permitted.is_empty()
            || self.permitted.iter().any(|net| net.contains(ip));
        permitted && !self.ignored.iter().any(|net| net.contains(ip))
    }
}

/// Whether addresses on a guest interface called `name` are skipped:
/// container and overlay interfaces always, others when they match the
/// source's interface filter.
pub fn skips_vm_interface(
    log: &Logger,
    filter: Option<&Regex>,
    name: &str,
) -> bool {
    if CONTAINER_INTERFACES.is_match(name) {
        debug!(log, "skipping container interface"; "interface" => name);
        return true;
    }
    if filter.is_some_and(|filter| filter.is_match(name)) {
        debug!(log, "skipping filtered interface"; "interface" => name);
        return true;
    }
    false
}

/// The primary IPv4 and IPv6 address among `addresses`: the lowest of each
/// family, leaving out loopback and link-local addresses.
pub fn primary_addresses(
    addresses: &[Arc<IpAddress>],
) -> (Option<Arc<IpAddress>>, Option<Arc<IpAddress>>) {
    let mut candidates: Vec<(IpAddr, &Arc<IpAddress>)> = addresses
        .iter()
        .filter_map(|address| {
            let ip = address.host().parse::<IpAddr>().ok()?;
            is_routable(ip).then_some((ip, address))
        })
        .collect();
    candidates.sort_by_key(|(ip, _)| *ip);
    let first = |v4: bool| {
        candidates
            .iter()
            .find(|(ip, _)| ip.is_ipv4() == v4)
            .map(|(_, address)| Arc::clone(address))
    };
    (first(true), first(false))
}

/// Loopback and link-local addresses are never recorded.
pub fn is_routable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => !ip.is_loopback() && !ip.is_link_local(),
        IpAddr::V6(ip) => {
            !ip.is_loopback() && (ip.segments()[0] & 0xffc0) != 0xfe80
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ssot_test_utils::dev::test_setup_log;

    fn address(address: &str) -> Arc<IpAddress> {
        Arc::new(IpAddress {
            address: address.to_owned(),
            ..Default::default()
        })
    }

    #[test]
    fn test_subnet_filter() {
        let all = SubnetFilter::default();
        assert!(all.permits("203.0.113.7".parse().unwrap()));

        let filter = SubnetFilter::new(
            vec!["10.0.0.0/8".parse().unwrap()],
            vec!["10.99.0.0/16".parse().unwrap()],
        );
        assert!(filter.permits("10.1.2.3".parse().unwrap()));
        assert!(!filter.permits("10.99.0.1".parse().unwrap()));
        assert!(!filter.permits("192.168.1.1".parse().unwrap()));

        let ignore_only =
            SubnetFilter::new(Vec::new(), vec!["fd00::/8".parse().unwrap()]);
        assert!(!ignore_only.permits("fd00::1".parse().unwrap()));
        assert!(ignore_only.permits("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_vm_interface_filter() {
        let logctx = test_setup_log("test_vm_interface_filter");
        let log = &logctx.log;
        let filter = Regex::new("^ens19$").unwrap();
        assert!(skips_vm_interface(log, None, "docker0"));
        assert!(skips_vm_interface(log, None, "veth1a2b3c"));
        assert!(skips_vm_interface(log, None, "lo"));
        assert!(!skips_vm_interface(log, None, "eth0"));
        assert!(!skips_vm_interface(log, None, "lonely0"));
        assert!(skips_vm_interface(log, Some(&filter), "ens19"));
        assert!(!skips_vm_interface(log, Some(&filter), "ens18"));
        logctx.cleanup_successful();
    }

    #[test]
    fn test_primary_addresses_pick_lowest() {
        let addresses = [
            address("192.168.1.20/24"),
            address("fe80::1/64"),
            address("127.0.0.1/8"),
            address("2001:db8::20/64"),
            address("192.168.1.3/24"),
            address("2001:db8::5/64"),
        ];
        let (v4, v6) = primary_addresses(&addresses);
        assert_eq!(v4.unwrap().address, "192.168.1.3/24");
        assert_eq!(v6.unwrap().address, "2001:db8::5/64");

        let (v4, v6) = primary_addresses(&[address("fe80::2/64")]);
        assert!(v4.is_none());
        assert!(v6.is_none());
    }
}

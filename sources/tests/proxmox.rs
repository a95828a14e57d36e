// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The Proxmox adapter against a canned Proxmox VE API

use httptest::all_of;
use httptest::matchers::contains;
use httptest::matchers::eq;
use httptest::matchers::request;
use httptest::responders::json_encoded;
use httptest::responders::status_code;
use httptest::Expectation;
use netbox_client::RegistryApi;
use serde_json::json;
use serde_json::Value;
use slog::Logger;
use ssot_config::Config;
use ssot_config::VmOsPreference;
use ssot_inventory::Inventory;
use ssot_inventory::InventoryConfig;
use ssot_sources::AdapterRegistry;
use ssot_sources::RunReport;
use ssot_sources::SourceRunner;
use ssot_test_utils::dev::test_setup_log;
use ssot_test_utils::FakeRegistry;
use ssot_types::ObjectKind;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Binds the mock server to IPv4 loopback: registry and source URLs are
/// built as `host:port`, which doesn't work for a bare IPv6 address.
fn run_server() -> httptest::Server {
    httptest::ServerBuilder::new()
        .bind_addr(([127, 0, 0, 1], 0).into())
        .run()
        .unwrap()
}

const TOKEN: &str = "PVEAPIToken=netbox-ssot@pve!ssot=\
                     6f1e2d3c-4b5a-4968-8776-a5b4c3d2e1f0";

/// Answers `path` under the API root with `data`, as often as asked.
fn respond(server: &httptest::Server, path: &str, data: Value) {
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            eq(format!("/api2/json/{path}")),
        ))
        .times(1..)
        .respond_with(json_encoded(json!({ "data": data }))),
    );
}

/// A two-node cluster: `pve1` runs a VM, a VM template and a container;
/// `pve2` is down.
fn serve_cluster(server: &httptest::Server) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/api2/json/cluster/status"),
            request::headers(contains(("authorization", TOKEN))),
        ])
        .times(1..)
        .respond_with(json_encoded(json!({"data": [
            {"type": "cluster", "name": "pve-lab", "nodes": 2, "quorate": 1},
            {"type": "node", "name": "pve1", "online": 1},
            {"type": "node", "name": "pve2", "online": 0},
        ]}))),
    );
    respond(
        server,
        "nodes",
        json!([
            {"node": "pve2", "status": "offline"},
            {"node": "pve1", "status": "online", "maxcpu": 16},
        ]),
    );
    respond(
        server,
        "nodes/pve1/status",
        json!({
            "cpuinfo": {"cpus": 16, "model": "AMD EPYC 7302P", "sockets": 1},
            "memory": {"total": 68719476736u64, "used": 1024},
            "pveversion": "pve-manager/8.1.4/ec5affc9e41f1d79",
        }),
    );
    respond(
        server,
        "nodes/pve1/network",
        json!([
            {"iface": "vmbr0", "type": "bridge", "active": 1,
             "cidr": "192.168.10.11/24", "cidr6": "2001:db8:10::11/64",
             "bridge_ports": "bond0", "comments": "uplink\n"},
            {"iface": "eno1", "type": "eth", "active": 1, "mtu": "9000"},
            {"iface": "eno2", "type": "eth", "active": 0},
            {"iface": "bond0", "type": "bond", "active": 1,
             "slaves": "eno1 eno2", "bond_mode": "802.3ad"},
            {"iface": "vmbr0.30", "type": "vlan", "active": 1,
             "cidr": "10.30.0.11/24"},
        ]),
    );
    respond(
        server,
        "nodes/pve1/qemu",
        json!([
            {"vmid": 100, "name": "web01", "status": "running",
             "maxmem": 4294967296u64, "maxdisk": 34359738368u64, "cpus": 4},
            {"vmid": 9000, "name": "debian-template", "status": "stopped",
             "template": 1},
        ]),
    );
    respond(
        server,
        "nodes/pve1/qemu/100/config",
        json!({
            "name": "web01",
            "cores": 2,
            "sockets": 2,
            "memory": "4096",
            "ostype": "l26",
            "agent": "1",
            "description": "public web server",
            "net0": "virtio=BC:24:11:5E:2A:01,bridge=vmbr0,tag=20",
            "net1": "virtio=BC:24:11:5E:2A:02,bridge=vmbr0",
        }),
    );
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            "/api2/json/nodes/pve1/qemu/100/agent/network-get-interfaces",
        ))
        .times(1..)
        .respond_with(json_encoded(json!({"data": {"result": [
            {"name": "lo", "hardware-address": "00:00:00:00:00:00",
             "ip-addresses": [
                {"ip-address": "127.0.0.1", "prefix": 8,
                 "ip-address-type": "ipv4"},
             ]},
            {"name": "eth0", "hardware-address": "bc:24:11:5e:2a:01",
             "ip-addresses": [
                {"ip-address": "192.168.20.5", "prefix": 24,
                 "ip-address-type": "ipv4"},
                {"ip-address": "fe80::be24:11ff:fe5e:2a01", "prefix": 64,
                 "ip-address-type": "ipv6"},
             ]},
            {"name": "ens19", "hardware-address": "bc:24:11:5e:2a:02",
             "ip-addresses": [
                {"ip-address": "172.31.0.5", "prefix": 16,
                 "ip-address-type": "ipv4"},
             ]},
            {"name": "docker0", "hardware-address": "02:42:ac:11:00:01",
             "ip-addresses": [
                {"ip-address": "172.17.0.1", "prefix": 16,
                 "ip-address-type": "ipv4"},
             ]},
        ]}}))),
    );
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            "/api2/json/nodes/pve1/qemu/100/agent/get-osinfo",
        ))
        .times(1..)
        .respond_with(json_encoded(json!({"data": {"result": {
            "id": "debian",
            "name": "Debian GNU/Linux",
            "pretty-name": "Debian GNU/Linux 12 (bookworm)",
            "version": "12 (bookworm)",
        }}}))),
    );
    respond(
        server,
        "nodes/pve1/lxc",
        json!([
            {"vmid": "200", "name": "dns01", "status": "stopped",
             "maxmem": 536870912, "maxdisk": 8589934592u64, "cpus": 1},
        ]),
    );
    respond(
        server,
        "nodes/pve1/lxc/200/config",
        json!({
            "hostname": "dns01",
            "cores": 1,
            "memory": 512,
            "ostype": "debian",
            "net0": "name=eth0,bridge=vmbr0,hwaddr=BC:24:11:00:00:02,\
                     ip=192.168.10.53/24,ip6=auto,type=veth",
            "net1": "name=ens19,bridge=vmbr0,hwaddr=BC:24:11:00:00:03,\
                     ip=172.31.0.53/16,type=veth",
        }),
    );
}

fn config_for(server: &httptest::Server) -> Config {
    config_with(server, "")
}

/// The source configuration, with `extra` appended to the source's table.
fn config_with(server: &httptest::Server, extra: &str) -> Config {
    let addr = server.addr();
    Config::from_toml_str(&format!(
        r#"
[netbox]
apiToken = "el1aof5y0u2l7nloalfbaqbq4d7pwo8kvp7c8iyj"
hostname = "netbox.example.com"

[[source]]
name = "pve-lab"
type = "proxmox"
httpScheme = "http"
hostname = "{}"
port = {}
username = "netbox-ssot@pve!ssot"
apiToken = "6f1e2d3c-4b5a-4968-8776-a5b4c3d2e1f0"
interfaceFilter = "^ens19$"
clusterSiteRelations = [".* = Lab"]
{}
"#,
        addr.ip(),
        addr.port(),
        extra,
    ))
    .unwrap()
}

async fn run(
    log: &Logger,
    registry: &Arc<FakeRegistry>,
    config: &Config,
) -> RunReport {
    let api: Arc<dyn RegistryApi> = Arc::clone(registry) as _;
    let inventory = Arc::new(
        Inventory::bootstrap(log, api, InventoryConfig::default())
            .await
            .unwrap(),
    );
    let runner = SourceRunner::new(
        log,
        AdapterRegistry::with_bundled(),
        CancellationToken::new(),
        false,
    );
    runner.run(&inventory, &config.sources).await.unwrap()
}

fn find(registry: &FakeRegistry, kind: ObjectKind, name: &str) -> Value {
    registry
        .find(kind, "name", &json!(name))
        .unwrap_or_else(|| panic!("no {kind} named {name:?}"))
}

fn address_id(registry: &FakeRegistry, address: &str) -> Value {
    registry
        .find(ObjectKind::IpAddress, "address", &json!(address))
        .unwrap_or_else(|| panic!("no address {address}"))["id"]
        .clone()
}

fn interface(registry: &FakeRegistry, device: &Value, name: &str) -> Value {
    registry
        .records(ObjectKind::Interface)
        .into_iter()
        .find(|i| i["device"] == device["id"] && i["name"] == name)
        .unwrap_or_else(|| panic!("no interface {name}"))
}

fn tag_ids(record: &Value) -> Vec<i64> {
    let mut ids: Vec<i64> = record["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tag| tag.as_i64().unwrap())
        .collect();
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn test_proxmox_cluster_sync() {
    let logctx = test_setup_log("test_proxmox_cluster_sync");
    let server = run_server();
    serve_cluster(&server);
    let registry = Arc::new(FakeRegistry::new());
    let lab = registry.seed(
        ObjectKind::Site,
        json!({"name": "Lab", "slug": "lab", "status": "active"}),
    );
    let config = config_for(&server);

    let report = run(&logctx.log, &registry, &config).await;
    assert_eq!(report.outcomes.len(), 1);
    assert!(report.outcomes[0].result.is_ok());

    let tag_id = |name: &str| {
        find(&registry, ObjectKind::Tag, name)["id"].as_i64().unwrap()
    };
    let source_tag = tag_id("Source: pve-lab");
    assert_eq!(report.outcomes[0].tag_id, Some(source_tag));
    let mut tags = vec![tag_id("netbox-ssot"), source_tag, tag_id("proxmox")];
    tags.sort_unstable();

    let cluster_type = find(&registry, ObjectKind::ClusterType, "Proxmox");
    let cluster = find(&registry, ObjectKind::Cluster, "pve-lab");
    assert_eq!(cluster["type"], cluster_type["id"]);
    assert_eq!(cluster["site"], json!(lab));
    assert_eq!(cluster["status"], "active");
    assert_eq!(tag_ids(&cluster), tags);

    // Nodes.
    let server_role = find(&registry, ObjectKind::DeviceRole, "Server");
    let platform = find(&registry, ObjectKind::Platform, "Proxmox VE 8.1.4");
    let pve1 = find(&registry, ObjectKind::Device, "pve1");
    assert_eq!(pve1["status"], "active");
    assert_eq!(pve1["site"], json!(lab));
    assert_eq!(pve1["cluster"], cluster["id"]);
    assert_eq!(pve1["role"], server_role["id"]);
    assert_eq!(pve1["platform"], platform["id"]);
    assert_eq!(pve1["custom_fields"]["host_cpu_cores"], 16);
    assert_eq!(pve1["custom_fields"]["host_memory"], "64 GB");
    assert_eq!(pve1["custom_fields"]["source_name"], "pve-lab");
    assert_eq!(tag_ids(&pve1), tags);
    let pve2 = find(&registry, ObjectKind::Device, "pve2");
    assert_eq!(pve2["status"], "offline");
    assert!(pve2.get("platform").is_none());

    // Node interfaces, with bond membership and VLAN parents.
    let bond = interface(&registry, &pve1, "bond0");
    assert_eq!(bond["type"], "lag");
    let eno1 = interface(&registry, &pve1, "eno1");
    assert_eq!(eno1["lag"], bond["id"]);
    assert_eq!(eno1["mtu"], 9000);
    assert_eq!(eno1["enabled"], true);
    assert_eq!(interface(&registry, &pve1, "eno2")["enabled"], false);
    let vmbr0 = interface(&registry, &pve1, "vmbr0");
    assert_eq!(vmbr0["type"], "bridge");
    assert_eq!(vmbr0["description"], "uplink");
    let vlan30 = interface(&registry, &pve1, "vmbr0.30");
    assert_eq!(vlan30["type"], "virtual");
    assert_eq!(vlan30["parent"], vmbr0["id"]);

    // Node addresses, and the lowest of each family as primary.
    let bridge_v4 = registry
        .find(ObjectKind::IpAddress, "address", &json!("192.168.10.11/24"))
        .unwrap();
    assert_eq!(bridge_v4["assigned_object_type"], "dcim.interface");
    assert_eq!(bridge_v4["assigned_object_id"], vmbr0["id"]);
    assert_eq!(pve1["primary_ip4"], address_id(&registry, "10.30.0.11/24"));
    assert_eq!(
        pve1["primary_ip6"],
        address_id(&registry, "2001:db8:10::11/64")
    );

    // The virtual machine, with what its guest agent reports.
    let web01 = find(&registry, ObjectKind::VirtualMachine, "web01");
    let debian =
        find(&registry, ObjectKind::Platform, "Debian GNU/Linux 12 (bookworm)");
    assert_eq!(web01["status"], "active");
    assert_eq!(web01["cluster"], cluster["id"]);
    assert_eq!(web01["device"], pve1["id"]);
    assert_eq!(web01["site"], json!(lab));
    assert_eq!(web01["platform"], debian["id"]);
    assert_eq!(web01["vcpus"], 4.0);
    assert_eq!(web01["memory"], 4096);
    assert_eq!(web01["disk"], 32);
    assert_eq!(web01["comments"], "public web server");
    assert_eq!(web01["primary_ip4"], address_id(&registry, "192.168.20.5/24"));
    assert!(web01.get("primary_ip6").is_none());
    assert_eq!(tag_ids(&web01), tags);
    assert!(registry
        .find(ObjectKind::VirtualMachine, "name", &json!("debian-template"))
        .is_none());

    let vm_interfaces: Vec<Value> = registry
        .records(ObjectKind::VmInterface)
        .into_iter()
        .filter(|i| i["virtual_machine"] == web01["id"])
        .collect();
    let names: Vec<&str> =
        vm_interfaces.iter().map(|i| i["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["eth0", "ens19"]);
    let vlan_group =
        find(&registry, ObjectKind::VlanGroup, "DefaultVlanGroup");
    let vlan20 = find(&registry, ObjectKind::Vlan, "VLAN 20");
    assert_eq!(vlan20["vid"], 20);
    assert_eq!(vlan20["group"], vlan_group["id"]);
    assert_eq!(vm_interfaces[0]["untagged_vlan"], vlan20["id"]);
    assert_eq!(vm_interfaces[0]["mode"], "access");
    assert!(vm_interfaces[1].get("untagged_vlan").is_none());

    // Loopback, link-local, filtered and container interface addresses are
    // left out.
    for address in [
        "127.0.0.1/8",
        "fe80::be24:11ff:fe5e:2a01/64",
        "172.31.0.5/16",
        "172.17.0.1/16",
        "172.31.0.53/16",
    ] {
        assert!(
            registry
                .find(ObjectKind::IpAddress, "address", &json!(address))
                .is_none(),
            "{address} should not be recorded"
        );
    }

    // The container, with its configured OS and static address.
    let dns01 = find(&registry, ObjectKind::VirtualMachine, "dns01");
    let configured = find(&registry, ObjectKind::Platform, "Debian");
    assert_eq!(dns01["status"], "offline");
    assert_eq!(dns01["platform"], configured["id"]);
    assert_eq!(dns01["vcpus"], 1.0);
    assert_eq!(dns01["memory"], 512);
    assert_eq!(dns01["disk"], 8);
    assert_eq!(dns01["primary_ip4"], address_id(&registry, "192.168.10.53/24"));

    logctx.cleanup_successful();
}

#[tokio::test]
async fn test_proxmox_second_run_writes_nothing() {
    let logctx = test_setup_log("test_proxmox_second_run_writes_nothing");
    let server = run_server();
    serve_cluster(&server);
    let registry = Arc::new(FakeRegistry::new());
    registry.seed(
        ObjectKind::Site,
        json!({"name": "Lab", "slug": "lab", "status": "active"}),
    );
    let config = config_for(&server);

    run(&logctx.log, &registry, &config).await;
    assert!(!registry.writes().is_empty());
    registry.clear_calls();

    let report = run(&logctx.log, &registry, &config).await;
    assert!(report.outcomes[0].result.is_ok());
    assert_eq!(registry.writes(), Vec::new());
    logctx.cleanup_successful();
}

#[tokio::test]
async fn test_proxmox_vlan_groups_are_scoped_by_relation() {
    let logctx =
        test_setup_log("test_proxmox_vlan_groups_are_scoped_by_relation");
    let server = run_server();
    serve_cluster(&server);
    let registry = Arc::new(FakeRegistry::new());
    let lab = registry.seed(
        ObjectKind::Site,
        json!({"name": "Lab", "slug": "lab", "status": "active"}),
    );
    let config = config_with(
        &server,
        r#"vlanGroupRelations = ["^VLAN 20$ = Web VLANs"]
vlanGroupSiteRelations = ["^Web = Lab"]"#,
    );

    let report = run(&logctx.log, &registry, &config).await;
    assert!(report.outcomes[0].result.is_ok());
    let group = find(&registry, ObjectKind::VlanGroup, "Web VLANs");
    assert_eq!(group["scope_type"], "dcim.site");
    assert_eq!(group["scope_id"], json!(lab));
    let vlan20 = find(&registry, ObjectKind::Vlan, "VLAN 20");
    assert_eq!(vlan20["group"], group["id"]);

    // Unchanged on the next run.
    registry.clear_calls();
    run(&logctx.log, &registry, &config).await;
    assert_eq!(registry.writes(), Vec::new());
    logctx.cleanup_successful();
}

#[tokio::test]
async fn test_proxmox_configured_os_preference() {
    let logctx = test_setup_log("test_proxmox_configured_os_preference");
    let server = run_server();
    serve_cluster(&server);
    let registry = Arc::new(FakeRegistry::new());
    registry.seed(
        ObjectKind::Site,
        json!({"name": "Lab", "slug": "lab", "status": "active"}),
    );
    let mut config = config_for(&server);
    config.sources[0].vm_os_preference = VmOsPreference::Configured;

    run(&logctx.log, &registry, &config).await;
    let web01 = find(&registry, ObjectKind::VirtualMachine, "web01");
    let linux = find(&registry, ObjectKind::Platform, "Linux 2.6 - 6.X Kernel");
    assert_eq!(web01["platform"], linux["id"]);
    logctx.cleanup_successful();
}

#[tokio::test]
async fn test_proxmox_nodes_without_site_are_skipped() {
    let logctx = test_setup_log("test_proxmox_nodes_without_site_are_skipped");
    let server = run_server();
    serve_cluster(&server);
    // No site named Lab exists, so neither the cluster nor its nodes have
    // one.
    let registry = Arc::new(FakeRegistry::new());
    let config = config_for(&server);

    let report = run(&logctx.log, &registry, &config).await;
    assert!(report.outcomes[0].result.is_ok());
    let cluster = find(&registry, ObjectKind::Cluster, "pve-lab");
    assert!(cluster.get("site").is_none());
    assert!(registry.records(ObjectKind::Device).is_empty());
    assert!(registry.records(ObjectKind::VirtualMachine).is_empty());
    logctx.cleanup_successful();
}

#[tokio::test]
async fn test_proxmox_rejected_token_fails_the_source() {
    let logctx = test_setup_log("test_proxmox_rejected_token_fails_the_source");
    let server = run_server();
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            "/api2/json/cluster/status",
        ))
        .respond_with(status_code(401)),
    );
    let registry = Arc::new(FakeRegistry::new());
    let config = config_for(&server);

    let report = run(&logctx.log, &registry, &config).await;
    let outcome = &report.outcomes[0];
    assert_eq!(
        outcome.result.as_ref().unwrap_err().kind(),
        ssot_common::ErrorKind::Auth
    );
    // The source's tag exists, so cleanup can tell its records apart.
    assert!(outcome.tag_id.is_some());
    assert_eq!(report.cleanup_scope().failed, [outcome.tag_id.unwrap()]);
    assert!(registry.records(ObjectKind::Cluster).is_empty());
    logctx.cleanup_successful();
}

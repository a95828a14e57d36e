// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loading and validation of configuration files

use assert_matches::assert_matches;
use camino_tempfile::Utf8TempDir;
use ssot_common::logging::LogDestination;
use ssot_config::Config;
use ssot_config::ConfigError;
use ssot_config::HttpScheme;
use ssot_config::VmOsPreference;
use ssot_types::constants::SourceType;
use std::time::Duration;

const VALID: &str = r#"
[logger]
level = 2

[netbox]
apiToken = "el1aof5y0u2l7nloalfbaqbq4d7pwo8kvp7c8iyj"
hostname = "netbox.example.com"

[[source]]
name = "testolvm"
type = "ovirt"
hostname = "olvm.example.com"
username = "admin@internal"
password = "secret"
permittedSubnets = ["172.16.0.0/12", "192.168.0.0/16"]
hostSiteRelations = ["^ovirt-prod-.* = Ljubljana"]

[[source]]
name = "pve"
type = "proxmox"
hostname = "pve.example.com"
port = 8006
username = "root@pam"
apiToken = "ssot=4e1c7a9b"
"#;

fn load(name: &str, contents: &str) -> Result<Config, ConfigError> {
    let dir = Utf8TempDir::new().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    Config::from_file(&path)
}

fn messages(contents: &str) -> Vec<String> {
    let error = load("config.toml", contents).unwrap_err();
    assert_matches!(error, ConfigError::Invalid(_));
    error.validation_errors().iter().map(|e| e.to_string()).collect()
}

fn assert_reports(contents: &str, expected: &str) {
    let messages = messages(contents);
    assert!(
        messages.iter().any(|m| m.contains(expected)),
        "expected {expected:?} among {messages:?}"
    );
}

#[test]
fn test_valid_config_fills_defaults() {
    let config = load("config.toml", VALID).unwrap();

    assert_eq!(config.logger.level, 2);
    assert_eq!(config.logger.dest, LogDestination::Stdout);

    let netbox = &config.netbox;
    assert_eq!(netbox.port, 443);
    assert_eq!(netbox.http_scheme, HttpScheme::Https);
    assert_eq!(netbox.timeout, Duration::from_secs(30));
    assert_eq!(netbox.tag, "netbox-ssot");
    assert_eq!(netbox.tag_color, "00add8");
    assert!(netbox.remove_orphans);
    assert_eq!(netbox.arp_data_life_span, Duration::ZERO);
    assert!(!netbox.concurrent_sources);
    assert!(netbox.source_priority.is_empty());

    let [olvm, pve] = config.sources.as_slice() else {
        panic!("expected two sources, got {:?}", config.sources);
    };
    assert_eq!(olvm.source_type, SourceType::Ovirt);
    assert_eq!(olvm.tag, "Source: testolvm");
    assert_eq!(olvm.tag_color, SourceType::Ovirt.tag_color());
    assert_eq!(olvm.base_url(), "https://olvm.example.com:443");
    assert!(!olvm.validate_cert);
    assert_eq!(olvm.permitted_subnets.len(), 2);
    assert_eq!(olvm.vm_os_preference, VmOsPreference::Guest);
    assert_eq!(
        olvm.relations.host_site.find("ovirt-prod-01"),
        Some("Ljubljana")
    );
    assert!(olvm.relations.host_tenant.is_empty());

    assert_eq!(pve.source_type, SourceType::Proxmox);
    assert_eq!(pve.base_url(), "https://pve.example.com:8006");
    assert_eq!(pve.api_token, "ssot=4e1c7a9b");
}

#[test]
fn test_yaml_config() {
    let contents = r#"
logger:
  level: 0
  dest: /var/log/netbox-ssot.log
netbox:
  apiToken: token
  hostname: netbox.example.com
  httpScheme: http
  port: 8080
  removeOrphans: false
  arpDataLifeSpan: 86400
  sourcePriority: [pve]
source:
  - name: pve
    type: proxmox
    hostname: pve.example.com
    username: root@pam
    apiToken: "ssot=abc"
    vmOsPreference: configured
"#;
    let config = load("config.yaml", contents).unwrap();
    assert_eq!(config.logger.level, 0);
    assert_eq!(
        config.logger.dest,
        LogDestination::File("/var/log/netbox-ssot.log".into())
    );
    assert_eq!(config.netbox.http_scheme, HttpScheme::Http);
    assert_eq!(config.netbox.port, 8080);
    assert!(!config.netbox.remove_orphans);
    assert_eq!(config.netbox.arp_data_life_span, Duration::from_secs(86400));
    assert_eq!(config.netbox.source_priority, vec![String::from("pve")]);
    assert_eq!(
        config.sources[0].vm_os_preference,
        VmOsPreference::Configured
    );
}

#[test]
fn test_missing_file() {
    let dir = Utf8TempDir::new().unwrap();
    let error =
        Config::from_file(&dir.path().join("nonexistent.toml")).unwrap_err();
    assert_matches!(error, ConfigError::Io { .. });
}

#[test]
fn test_unknown_option_is_a_parse_error() {
    let contents = VALID.replace("level = 2", "level = 2\ncolour = true");
    let error = load("config.toml", &contents).unwrap_err();
    assert_matches!(error, ConfigError::Parse { .. });
    assert!(error.to_string().starts_with("error parsing \""));
}

#[test]
fn test_empty_hostname() {
    let contents = VALID.replace(
        "hostname = \"netbox.example.com\"",
        "hostname = \"\"",
    );
    assert_reports(&contents, "netbox.hostname: cannot be empty");
}

#[test]
fn test_port_out_of_range() {
    let contents = VALID.replace(
        "hostname = \"netbox.example.com\"",
        "hostname = \"netbox.example.com\"\nport = 333333",
    );
    assert_reports(
        &contents,
        "netbox.port: must be between 0 and 65535. Is 333333",
    );
}

#[test]
fn test_unknown_source_type() {
    let contents = VALID.replace("type = \"ovirt\"", "type = \"unknown\"");
    assert_reports(&contents, "source[testolvm].type is not valid");
}

#[test]
fn test_bad_http_scheme() {
    let contents = VALID.replace(
        "hostname = \"netbox.example.com\"",
        "hostname = \"netbox.example.com\"\nhttpScheme = \"httpd\"",
    );
    assert_reports(
        &contents,
        "netbox.httpScheme: must be either http or https. Is httpd",
    );
}

#[test]
fn test_malformed_relation() {
    let contents = VALID.replace(
        "hostSiteRelations",
        "hostTenantRelations = [\"This should not work\"]\nhostSiteRelations",
    );
    assert_reports(
        &contents,
        "source[testolvm].hostTenantRelations: invalid regex relation: This \
         should not work. Should be of format: regex = value",
    );
}

#[test]
fn test_invalid_relation_regex() {
    let contents = VALID.replace(
        "hostSiteRelations",
        "hostTenantRelations = [\"[a-z++ = Should not work\"]\n\
         hostSiteRelations",
    );
    assert_reports(&contents, "invalid regex: [a-z++");
}

#[test]
fn test_source_priority_length() {
    let contents = VALID.replace(
        "hostname = \"netbox.example.com\"",
        "hostname = \"netbox.example.com\"\nsourcePriority = [\"pve\"]",
    );
    assert_reports(
        &contents,
        "netbox.sourcePriority: len(config.Netbox.SourcePriority) != \
         len(config.Sources)",
    );
}

#[test]
fn test_source_priority_names() {
    let contents = VALID.replace(
        "hostname = \"netbox.example.com\"",
        "hostname = \"netbox.example.com\"\n\
         sourcePriority = [\"pve\", \"vcenter\"]",
    );
    let messages = messages(&contents);
    assert_eq!(
        messages,
        vec![String::from(
            "netbox.sourcePriority: source vcenter is not configured"
        )]
    );
}

#[test]
fn test_every_problem_is_reported() {
    let contents = r#"
[logger]
level = 7

[netbox]
timeout = -1
tagColor = "FFFFFF"

[[source]]
name = "a"
type = "vmware"
port = -2
permittedSubnets = ["10.0.0.0/33"]
interfaceFilter = "(["

[[source]]
name = "a"
type = "fortigate"
hostname = "fw.example.com"
"#;
    let messages = messages(contents);
    let expected = [
        "logger.level: must be between 0 and 3. Is 7",
        "netbox.apiToken: cannot be empty",
        "netbox.hostname: cannot be empty",
        "netbox.timeout: must be >= 0. Is -1",
        "netbox.tagColor: must be a 6 character lowercase hex color. Is \
         FFFFFF",
        "source[a].hostname: cannot be empty",
        "source[a].port: must be between 0 and 65535. Is -2",
        "source[a].username: cannot be empty",
        "source[a].password: cannot be empty",
        "source[a].permittedSubnets: invalid subnet: 10.0.0.0/33",
        "source[a].interfaceFilter: invalid regex: ([",
        "source[a].apiToken: cannot be empty",
        "source[a].name: duplicate source name",
    ];
    for message in expected {
        assert!(
            messages.iter().any(|m| m == message),
            "expected {message:?} among {messages:?}"
        );
    }
    assert_eq!(messages.len(), expected.len(), "{messages:?}");
}

#[test]
fn test_unnamed_source_uses_its_index() {
    let contents = VALID.replace("name = \"pve\"", "name = \"\"");
    let messages = messages(&contents);
    assert_eq!(messages, vec![String::from("source[1].name: cannot be empty")]);
}

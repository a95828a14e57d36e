// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The validated configuration

use crate::relations::RegexRelations;
use camino::Utf8PathBuf;
use ipnetwork::IpNetwork;
use regex::Regex;
use ssot_common::logging::LogDestination;
use ssot_types::constants::SourceType;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub logger: LoggerConfig,
    pub netbox: NetboxConfig,
    /// In declaration order.
    pub sources: Vec<SourceConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggerConfig {
    /// 0 (debug) through 3 (error).
    pub level: u8,
    pub dest: LogDestination,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum HttpScheme {
    Http,
    #[default]
    Https,
}

#[derive(Clone, Debug)]
pub struct NetboxConfig {
    pub api_token: String,
    pub hostname: String,
    pub port: u16,
    pub http_scheme: HttpScheme,
    pub validate_cert: bool,
    pub ca_file: Option<Utf8PathBuf>,
    pub timeout: Duration,
    /// Name of the engine tag.
    pub tag: String,
    pub tag_color: String,
    pub remove_orphans: bool,
    /// Source names, highest priority first.  Empty, or a permutation of
    /// the configured sources.
    pub source_priority: Vec<String>,
    pub arp_data_life_span: Duration,
    pub concurrent_sources: bool,
}

/// Which operating system a virtual machine reports wins when it has both.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum VmOsPreference {
    /// What the guest agent reports.
    #[default]
    Guest,
    /// What the hypervisor has configured.
    Configured,
}

#[derive(Clone, Debug, Default)]
pub struct SourceRelations {
    pub host_site: RegexRelations,
    pub cluster_site: RegexRelations,
    pub cluster_tenant: RegexRelations,
    pub host_tenant: RegexRelations,
    pub vm_tenant: RegexRelations,
    pub host_role: RegexRelations,
    pub vlan_group: RegexRelations,
    pub vlan_tenant: RegexRelations,
    pub vlan_site: RegexRelations,
    pub vlan_group_site: RegexRelations,
    pub datacenter_cluster_group: RegexRelations,
}

#[derive(Clone, Debug)]
pub struct SourceConfig {
    pub name: String,
    pub source_type: SourceType,
    pub http_scheme: HttpScheme,
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub api_token: String,
    pub validate_cert: bool,
    pub ca_file: Option<Utf8PathBuf>,
    /// Name of the tag every record of this source carries.
    pub tag: String,
    pub tag_color: String,
    pub ignore_serial_numbers: bool,
    pub permitted_subnets: Vec<IpNetwork>,
    pub ignored_subnets: Vec<IpNetwork>,
    /// Interfaces whose name matches are skipped.
    pub interface_filter: Option<Regex>,
    pub collect_arp_data: bool,
    pub vm_os_preference: VmOsPreference,
    pub relations: SourceRelations,
}

impl SourceConfig {
    /// `scheme://hostname:port` of the upstream.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.http_scheme, self.hostname, self.port)
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Turning a [`RawConfig`] into a [`Config`], collecting every problem

use crate::config::*;
use crate::raw::RawConfig;
use crate::raw::RawLogger;
use crate::raw::RawNetbox;
use crate::raw::RawSource;
use crate::relations::RegexRelations;
use camino::Utf8PathBuf;
use ipnetwork::IpNetwork;
use regex::Regex;
use ssot_common::logging::LogDestination;
use ssot_types::constants::SourceType;
use ssot_types::constants::DEFAULT_ENGINE_TAG;
use ssot_types::constants::DEFAULT_ENGINE_TAG_COLOR;
use ssot_types::extras::is_valid_color;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

const DEFAULT_PORT: u16 = 443;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_LOG_LEVEL: u8 = 1;

/// One problem with one option.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// Where the option lives, e.g. `source[pve].port`.
    pub path: String,
    pub problem: Problem,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Problem {
    Message(String),
    /// The value is not one the option accepts.
    NotValid,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            Problem::Message(message) => {
                write!(f, "{}: {}", self.path, message)
            }
            Problem::NotValid => write!(f, "{} is not valid", self.path),
        }
    }
}

#[derive(Default)]
struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    fn error(&mut self, path: String, message: impl Into<String>) {
        self.errors.push(ValidationError {
            path,
            problem: Problem::Message(message.into()),
        });
    }

    fn not_empty(&mut self, path: String, value: Option<String>) -> String {
        let value = value.unwrap_or_default();
        if value.trim().is_empty() {
            self.error(path, "cannot be empty");
        }
        value
    }

    fn port(&mut self, path: String, value: Option<i64>) -> u16 {
        match value {
            None => DEFAULT_PORT,
            Some(port) => match u16::try_from(port) {
                Ok(port) => port,
                Err(_) => {
                    self.error(
                        path,
                        format!("must be between 0 and 65535. Is {port}"),
                    );
                    DEFAULT_PORT
                }
            },
        }
    }

    fn scheme(&mut self, path: String, value: Option<String>) -> HttpScheme {
        let Some(value) = value else {
            return HttpScheme::default();
        };
        value.parse().unwrap_or_else(|_| {
            self.error(
                path,
                format!("must be either http or https. Is {value}"),
            );
            HttpScheme::default()
        })
    }

    fn seconds(
        &mut self,
        path: String,
        value: Option<i64>,
    ) -> Option<Duration> {
        let value = value?;
        match u64::try_from(value) {
            Ok(seconds) => Some(Duration::from_secs(seconds)),
            Err(_) => {
                self.error(path, format!("must be >= 0. Is {value}"));
                None
            }
        }
    }

    fn color(
        &mut self,
        path: String,
        value: Option<String>,
        default: &str,
    ) -> String {
        match value {
            None => default.to_owned(),
            Some(color) if is_valid_color(&color) => color,
            Some(color) => {
                self.error(
                    path,
                    format!(
                        "must be a 6 character lowercase hex color. Is {color}"
                    ),
                );
                default.to_owned()
            }
        }
    }

    fn subnets(
        &mut self,
        path: String,
        value: Option<Vec<String>>,
    ) -> Vec<IpNetwork> {
        let mut subnets = Vec::new();
        for subnet in value.unwrap_or_default() {
            match subnet.trim().parse::<IpNetwork>() {
                Ok(network) => subnets.push(network),
                Err(_) => self
                    .error(path.clone(), format!("invalid subnet: {subnet}")),
            }
        }
        subnets
    }

    fn relations(
        &mut self,
        path: String,
        value: Option<Vec<String>>,
    ) -> RegexRelations {
        let entries = value.unwrap_or_default();
        RegexRelations::parse(entries.as_slice()).unwrap_or_else(|error| {
            self.error(path, error.to_string());
            RegexRelations::default()
        })
    }

    fn logger(&mut self, raw: RawLogger) -> LoggerConfig {
        let level = match raw.level {
            None => DEFAULT_LOG_LEVEL,
            Some(level @ 0..=3) => level as u8,
            Some(level) => {
                self.error(
                    String::from("logger.level"),
                    format!("must be between 0 and 3. Is {level}"),
                );
                DEFAULT_LOG_LEVEL
            }
        };
        let dest = match raw.dest.as_deref().map(str::trim) {
            None | Some("") => LogDestination::Stdout,
            Some(path) => LogDestination::File(Utf8PathBuf::from(path)),
        };
        LoggerConfig { level, dest }
    }

    fn netbox(&mut self, raw: RawNetbox) -> NetboxConfig {
        let path = |field: &str| format!("netbox.{field}");
        NetboxConfig {
            api_token: self.not_empty(path("apiToken"), raw.api_token),
            hostname: self.not_empty(path("hostname"), raw.hostname),
            port: self.port(path("port"), raw.port),
            http_scheme: self.scheme(path("httpScheme"), raw.http_scheme),
            validate_cert: raw.validate_cert.unwrap_or(false),
            ca_file: non_empty_path(raw.ca_file),
            timeout: self
                .seconds(path("timeout"), raw.timeout)
                .unwrap_or(DEFAULT_TIMEOUT),
            tag: raw
                .tag
                .filter(|tag| !tag.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ENGINE_TAG.to_owned()),
            tag_color: self.color(
                path("tagColor"),
                raw.tag_color,
                DEFAULT_ENGINE_TAG_COLOR,
            ),
            remove_orphans: raw.remove_orphans.unwrap_or(true),
            source_priority: raw.source_priority.unwrap_or_default(),
            arp_data_life_span: self
                .seconds(path("arpDataLifeSpan"), raw.arp_data_life_span)
                .unwrap_or(Duration::ZERO),
            concurrent_sources: raw.concurrent_sources.unwrap_or(false),
        }
    }

    fn source(&mut self, index: usize, raw: RawSource) -> SourceConfig {
        let name = raw.name.clone().unwrap_or_default();
        let label = if name.trim().is_empty() {
            index.to_string()
        } else {
            name.clone()
        };
        let path = |field: &str| format!("source[{label}].{field}");
        if name.trim().is_empty() {
            self.error(path("name"), "cannot be empty");
        }

        let source_type = match raw.source_type.as_deref() {
            Some(value) => value.parse::<SourceType>().ok(),
            None => None,
        };
        let source_type = source_type.unwrap_or_else(|| {
            self.errors.push(ValidationError {
                path: path("type"),
                problem: Problem::NotValid,
            });
            SourceType::Ovirt
        });

        let hostname = self.not_empty(path("hostname"), raw.hostname);
        let port = self.port(path("port"), raw.port);
        let http_scheme = self.scheme(path("httpScheme"), raw.http_scheme);
        let (username, password, api_token) = match source_type {
            SourceType::Fortigate => (
                raw.username.unwrap_or_default(),
                raw.password.unwrap_or_default(),
                self.not_empty(path("apiToken"), raw.api_token),
            ),
            // Token sessions are bound to a user.
            SourceType::Proxmox => (
                self.not_empty(path("username"), raw.username),
                raw.password.unwrap_or_default(),
                self.not_empty(path("apiToken"), raw.api_token),
            ),
            _ => (
                self.not_empty(path("username"), raw.username),
                self.not_empty(path("password"), raw.password),
                raw.api_token.unwrap_or_default(),
            ),
        };

        let interface_filter = match raw.interface_filter {
            Some(filter) if !filter.is_empty() => match Regex::new(&filter) {
                Ok(regex) => Some(regex),
                Err(_) => {
                    self.error(
                        path("interfaceFilter"),
                        format!("invalid regex: {filter}"),
                    );
                    None
                }
            },
            _ => None,
        };
        let vm_os_preference = match raw.vm_os_preference {
            None => VmOsPreference::default(),
            Some(value) => value.parse().unwrap_or_else(|_| {
                self.error(
                    path("vmOsPreference"),
                    format!("must be either guest or configured. Is {value}"),
                );
                VmOsPreference::default()
            }),
        };

        let relations = SourceRelations {
            host_site: self
                .relations(path("hostSiteRelations"), raw.host_site_relations),
            cluster_site: self.relations(
                path("clusterSiteRelations"),
                raw.cluster_site_relations,
            ),
            cluster_tenant: self.relations(
                path("clusterTenantRelations"),
                raw.cluster_tenant_relations,
            ),
            host_tenant: self.relations(
                path("hostTenantRelations"),
                raw.host_tenant_relations,
            ),
            vm_tenant: self
                .relations(path("vmTenantRelations"), raw.vm_tenant_relations),
            host_role: self
                .relations(path("hostRoleRelations"), raw.host_role_relations),
            vlan_group: self.relations(
                path("vlanGroupRelations"),
                raw.vlan_group_relations,
            ),
            vlan_tenant: self.relations(
                path("vlanTenantRelations"),
                raw.vlan_tenant_relations,
            ),
            vlan_site: self
                .relations(path("vlanSiteRelations"), raw.vlan_site_relations),
            vlan_group_site: self.relations(
                path("vlanGroupSiteRelations"),
                raw.vlan_group_site_relations,
            ),
            datacenter_cluster_group: self.relations(
                path("datacenterClusterGroupRelations"),
                raw.datacenter_cluster_group_relations,
            ),
        };

        SourceConfig {
            tag: raw
                .tag
                .filter(|tag| !tag.trim().is_empty())
                .unwrap_or_else(|| format!("Source: {name}")),
            tag_color: self.color(
                path("tagColor"),
                raw.tag_color,
                source_type.tag_color(),
            ),
            name,
            source_type,
            http_scheme,
            hostname,
            port,
            username,
            password,
            api_token,
            validate_cert: raw.validate_cert.unwrap_or(false),
            ca_file: non_empty_path(raw.ca_file),
            ignore_serial_numbers: raw.ignore_serial_numbers.unwrap_or(false),
            permitted_subnets: self
                .subnets(path("permittedSubnets"), raw.permitted_subnets),
            ignored_subnets: self
                .subnets(path("ignoredSubnets"), raw.ignored_subnets),
            interface_filter,
            collect_arp_data: raw.collect_arp_data.unwrap_or(false),
            vm_os_preference,
            relations,
        }
    }

    fn source_priority(&mut self, netbox: &NetboxConfig, names: &[String]) {
        let priority = &netbox.source_priority;
        if priority.is_empty() {
            return;
        }
        let path = String::from("netbox.sourcePriority");
        if priority.len() != names.len() {
            self.error(
                path.clone(),
                "len(config.Netbox.SourcePriority) != len(config.Sources)",
            );
        }
        for name in priority {
            if !names.contains(name) {
                self.error(
                    path.clone(),
                    format!("source {name} is not configured"),
                );
            }
        }
    }
}

fn non_empty_path(value: Option<String>) -> Option<Utf8PathBuf> {
    value.filter(|path| !path.trim().is_empty()).map(Utf8PathBuf::from)
}

pub(crate) fn validate(raw: RawConfig) -> Result<Config, Vec<ValidationError>> {
    let mut validator = Validator::default();
    let logger = validator.logger(raw.logger);
    let netbox = validator.netbox(raw.netbox);

    let mut sources = Vec::with_capacity(raw.source.len());
    let mut seen = BTreeSet::new();
    for (index, raw_source) in raw.source.into_iter().enumerate() {
        let source = validator.source(index, raw_source);
        if !source.name.is_empty() && !seen.insert(source.name.clone()) {
            validator.error(
                format!("source[{}].name", source.name),
                "duplicate source name",
            );
        }
        sources.push(source);
    }
    let names: Vec<String> = sources.iter().map(|s| s.name.clone()).collect();
    validator.source_priority(&netbox, &names);

    if validator.errors.is_empty() {
        Ok(Config { logger, netbox, sources })
    } else {
        Err(validator.errors)
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The configuration file as written, before validation

use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RawConfig {
    pub logger: RawLogger,
    pub netbox: RawNetbox,
    pub source: Vec<RawSource>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RawLogger {
    pub level: Option<i64>,
    pub dest: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub(crate) struct RawNetbox {
    pub api_token: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<i64>,
    pub http_scheme: Option<String>,
    pub validate_cert: Option<bool>,
    pub ca_file: Option<String>,
    pub timeout: Option<i64>,
    pub tag: Option<String>,
    pub tag_color: Option<String>,
    pub remove_orphans: Option<bool>,
    pub source_priority: Option<Vec<String>>,
    pub arp_data_life_span: Option<i64>,
    pub concurrent_sources: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub(crate) struct RawSource {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub source_type: Option<String>,
    pub http_scheme: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<i64>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_token: Option<String>,
    pub validate_cert: Option<bool>,
    pub ca_file: Option<String>,
    pub tag: Option<String>,
    pub tag_color: Option<String>,
    pub ignore_serial_numbers: Option<bool>,
    pub permitted_subnets: Option<Vec<String>>,
    pub ignored_subnets: Option<Vec<String>>,
    pub interface_filter: Option<String>,
    pub collect_arp_data: Option<bool>,
    pub vm_os_preference: Option<String>,

    pub host_site_relations: Option<Vec<String>>,
    pub cluster_site_relations: Option<Vec<String>>,
    pub cluster_tenant_relations: Option<Vec<String>>,
    pub host_tenant_relations: Option<Vec<String>>,
    pub vm_tenant_relations: Option<Vec<String>>,
    pub host_role_relations: Option<Vec<String>>,
    pub vlan_group_relations: Option<Vec<String>>,
    pub vlan_tenant_relations: Option<Vec<String>>,
    pub vlan_site_relations: Option<Vec<String>>,
    pub vlan_group_site_relations: Option<Vec<String>>,
    pub datacenter_cluster_group_relations: Option<Vec<String>>,
}

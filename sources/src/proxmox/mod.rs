// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Proxmox VE: the cluster, its nodes with their networks, and the QEMU
//! virtual machines and LXC containers running on them

mod api;
mod sync;

use crate::http::UpstreamClient;
use crate::Source;
use crate::SourceContext;
use crate::SourceError;
use api::AgentInterface;
use api::AgentOsInfo;
use api::AgentResult;
use api::ClusterStatus;
use api::Data;
use api::GuestConfig;
use api::GuestSummary;
use api::NodeNetwork;
use api::NodeStatus;
use api::NodeSummary;
use async_trait::async_trait;
use http::header;
use http::HeaderMap;
use http::HeaderValue;
use serde::de::DeserializeOwned;
use slog::debug;
use slog::info;
use slog::Logger;
use ssot_config::SourceConfig;
use ssot_inventory::Inventory;
use ssot_inventory::Writer;

const API_ROOT: &str = "/api2/json/";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum GuestKind {
    Qemu,
    Lxc,
}

impl GuestKind {
    fn path(&self) -> &'static str {
        match self {
            GuestKind::Qemu => "qemu",
            GuestKind::Lxc => "lxc",
        }
    }
}

/// A virtual machine or container, with what its guest agent reported.
#[derive(Debug)]
pub(crate) struct Guest {
    pub kind: GuestKind,
    pub vmid: u64,
    pub summary: GuestSummary,
    pub config: GuestConfig,
    pub agent_interfaces: Vec<AgentInterface>,
    pub agent_os: Option<AgentOsInfo>,
}

impl Guest {
    pub fn name(&self) -> Option<&str> {
        let configured = match self.kind {
            GuestKind::Qemu => self.config.string("name"),
            GuestKind::Lxc => self.config.string("hostname"),
        };
        configured
            .or(self.summary.name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn is_running(&self) -> bool {
        self.summary.status == "running"
    }
}

#[derive(Debug)]
pub(crate) struct Node {
    pub name: String,
    pub online: bool,
    pub status: NodeStatus,
    pub networks: Vec<NodeNetwork>,
    pub guests: Vec<Guest>,
}

#[derive(Debug, Default)]
pub(crate) struct Snapshot {
    pub cluster_name: String,
    pub nodes: Vec<Node>,
}

pub struct ProxmoxSource {
    log: Logger,
    config: SourceConfig,
    client: UpstreamClient,
    snapshot: Snapshot,
}

impl ProxmoxSource {
    pub fn new(context: SourceContext) -> Result<ProxmoxSource, SourceError> {
        let SourceContext { log, config, cancel } = context;
        let token =
            format!("PVEAPIToken={}={}", config.username, config.api_token);
        let mut authorization =
            HeaderValue::from_str(&token).map_err(|_| SourceError::Init {
                source_name: config.name.clone(),
                message: String::from(
                    "api token contains invalid header characters",
                ),
            })?;
        authorization.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, authorization);
        let accept = HeaderValue::from_static("application/json");
        headers.insert(header::ACCEPT, accept);

        let client =
            UpstreamClient::new(&log, &config, API_ROOT, headers, cancel)?;
        Ok(ProxmoxSource { log, config, client, snapshot: Snapshot::default() })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, SourceError> {
        let data: Data<T> = self
            .client
            .get(path)
            .await
            .map_err(|e| SourceError::upstream(&self.config.name, e))?;
        Ok(data.data)
    }

    async fn get_agent<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, SourceError> {
        let data: Option<Data<AgentResult<T>>> = self
            .client
            .get_optional(path)
            .await
            .map_err(|e| SourceError::upstream(&self.config.name, e))?;
        Ok(data.map(|data| data.data.result))
    }

    async fn fetch_node(
        &self,
        summary: NodeSummary,
    ) -> Result<Node, SourceError> {
        let name = summary.node;
        let online = summary.status.as_deref() == Some("online");
        let mut node = Node {
            name,
            online,
            status: NodeStatus::default(),
            networks: Vec::new(),
            guests: Vec::new(),
        };
        if !online {
            // Offline nodes answer nothing but their name.
            debug!(self.log, "node is offline"; "node" => &node.name);
            return Ok(node);
        }
        let prefix = format!("nodes/{}", node.name);
        node.status = self.get(&format!("{prefix}/status")).await?;
        node.networks = self.get(&format!("{prefix}/network")).await?;
        node.networks.sort_by(|a, b| a.iface.cmp(&b.iface));
        for kind in [GuestKind::Qemu, GuestKind::Lxc] {
            let summaries: Vec<GuestSummary> =
                self.get(&format!("{prefix}/{}", kind.path())).await?;
            for summary in summaries {
                if summary.template {
                    continue;
                }
                let Some(vmid) = summary.vmid else {
                    continue;
                };
                let guest =
                    self.fetch_guest(&prefix, kind, vmid, summary).await?;
                node.guests.push(guest);
            }
        }
        node.guests
            .sort_by_key(|guest| (guest.kind == GuestKind::Lxc, guest.vmid));
        Ok(node)
    }

    async fn fetch_guest(
        &self,
        node_prefix: &str,
        kind: GuestKind,
        vmid: u64,
        summary: GuestSummary,
    ) -> Result<Guest, SourceError> {
        let prefix = format!("{node_prefix}/{}/{vmid}", kind.path());
        let config: GuestConfig = self.get(&format!("{prefix}/config")).await?;
        let mut guest = Guest {
            kind,
            vmid,
            summary,
            config,
            agent_interfaces: Vec::new(),
            agent_os: None,
        };
        if kind == GuestKind::Qemu
            && guest.is_running()
            && guest.config.agent_enabled()
        {
            guest.agent_interfaces = self
                .get_agent(&format!("{prefix}/agent/network-get-interfaces"))
                .await?
                .unwrap_or_default();
            guest.agent_os =
                self.get_agent(&format!("{prefix}/agent/get-osinfo")).await?;
        }
        Ok(guest)
    }
}

#[async_trait]
impl Source for ProxmoxSource {
    async fn init(&mut self) -> Result<(), SourceError> {
        let status: Vec<ClusterStatus> = self.get("cluster/status").await?;
        let mut nodes: Vec<NodeSummary> = self.get("nodes").await?;
        nodes.sort_by(|a, b| a.node.cmp(&b.node));

        // A standalone node has no cluster entry and is its own cluster.
        let cluster_name = status
            .into_iter()
            .find(|entry| entry.kind == "cluster")
            .map(|entry| entry.name)
            .or_else(|| nodes.first().map(|node| node.node.clone()))
            .ok_or_else(|| SourceError::Init {
                source_name: self.config.name.clone(),
                message: String::from("cluster has neither a name nor nodes"),
            })?;

        let mut snapshot = Snapshot { cluster_name, nodes: Vec::new() };
        for summary in nodes {
            snapshot.nodes.push(self.fetch_node(summary).await?);
        }
        info!(self.log, "fetched proxmox inventory";
            "cluster" => &snapshot.cluster_name,
            "nodes" => snapshot.nodes.len(),
            "guests" => snapshot
                .nodes
                .iter()
                .map(|node| node.guests.len())
                .sum::<usize>(),
        );
        self.snapshot = snapshot;
        Ok(())
    }

    async fn sync(
        &self,
        inventory: &Inventory,
        writer: &Writer,
    ) -> Result<(), SourceError> {
        sync::Syncer::new(&self.log, &self.config, inventory, writer)
            .run(&self.snapshot)
            .await
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One run of netbox-ssot: load the registry, run every configured source
//! against it, then clean up what no source reported any more.

use anyhow::anyhow;
use anyhow::Context;
use netbox_client::Client;
use netbox_client::ClientConfig;
use netbox_client::RegistryApi;
use slog::info;
use slog::o;
use slog::warn;
use slog::Logger;
use ssot_config::Config;
use ssot_config::NetboxConfig;
use ssot_inventory::CleanupReport;
use ssot_inventory::Inventory;
use ssot_inventory::InventoryConfig;
use ssot_inventory::Stats;
use ssot_sources::AdapterRegistry;
use ssot_sources::RunReport;
use ssot_sources::SourceRunner;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// What one run did.
#[derive(Debug)]
pub struct RunSummary {
    pub report: RunReport,
    pub cleanup: CleanupReport,
    pub stats: Stats,
}

impl RunSummary {
    /// Whether every source ran to completion.  Records skipped or refused
    /// along the way do not count against a source.
    pub fn succeeded(&self) -> bool {
        self.report.failed().next().is_none()
    }
}

pub fn client_config(netbox: &NetboxConfig) -> ClientConfig {
    ClientConfig {
        scheme: netbox.http_scheme.to_string(),
        hostname: netbox.hostname.clone(),
        port: netbox.port,
        api_token: netbox.api_token.clone(),
        validate_cert: netbox.validate_cert,
        ca_file: netbox.ca_file.clone(),
        timeout: netbox.timeout,
    }
}

pub fn inventory_config(netbox: &NetboxConfig) -> InventoryConfig {
    InventoryConfig {
        engine_tag: netbox.tag.clone(),
        engine_tag_color: netbox.tag_color.clone(),
        remove_orphans: netbox.remove_orphans,
        arp_data_life_span: netbox.arp_data_life_span,
        source_priority: netbox.source_priority.clone(),
    }
}

/// Runs every configured source against the NetBox instance `config`
/// names, with the bundled adapters.
pub async fn run(
    log: &Logger,
    config: &Config,
    cancel: CancellationToken,
) -> Result<RunSummary, anyhow::Error> {
    let registry_config = client_config(&config.netbox);
    let client = Client::new(log, &registry_config, cancel.clone())
        .context("failed to create registry client")?;
    run_with_registry(
        log,
        config,
        Arc::new(client),
        AdapterRegistry::with_bundled(),
        cancel,
    )
    .await
}

/// Runs every configured source against `registry`.
///
/// An `Err` means the run could not finish: the registry was unusable or
/// the run was cancelled.  Sources that failed on their own are reported
/// in the summary instead, and their records are spared by the cleanup.
pub async fn run_with_registry(
    log: &Logger,
    config: &Config,
    registry: Arc<dyn RegistryApi>,
    adapters: AdapterRegistry,
    cancel: CancellationToken,
) -> Result<RunSummary, anyhow::Error> {
    let log = log.new(o!("component" => "netbox-ssot"));
    let started = Instant::now();

    let inventory =
        Inventory::bootstrap(&log, registry, inventory_config(&config.netbox))
            .await
            .context("failed to load the registry")?;
    let inventory = Arc::new(inventory);
    info!(log, "registry loaded";
        "elapsed_ms" => started.elapsed().as_millis(),
    );

    let runner = SourceRunner::new(
        &log,
        adapters,
        cancel.clone(),
        config.netbox.concurrent_sources,
    );
    let report = runner
        .run(&inventory, &config.sources)
        .await
        .context("run aborted")?;

    if cancel.is_cancelled() {
        return Err(anyhow!("run cancelled before orphan cleanup"));
    }
    let cleanup = inventory
        .remove_orphans(&report.cleanup_scope())
        .await
        .context("orphan cleanup failed")?;
    if cleanup.failed > 0 {
        warn!(log, "some orphans could not be deleted";
            "failed" => cleanup.failed,
        );
    }

    let stats = inventory.stats();
    info!(log, "run complete";
        "created" => stats.created,
        "updated" => stats.updated,
        "unchanged" => stats.unchanged,
        "deleted" => stats.deleted,
        "orphans_tagged" => cleanup.tagged,
        "orphans_kept" => cleanup.kept_referenced + cleanup.arp_retained,
        "failed_sources" => report.failed().count(),
        "elapsed_ms" => started.elapsed().as_millis(),
    );
    Ok(RunSummary { report, cleanup, stats })
}

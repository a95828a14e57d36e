// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driving the configured sources

use crate::proxmox::ProxmoxSource;
use crate::Source;
use crate::SourceContext;
use crate::SourceError;
use slog::error;
use slog::info;
use slog::o;
use slog::Logger;
use ssot_common::InlineErrorChain;
use ssot_config::SourceConfig;
use ssot_inventory::CleanupScope;
use ssot_inventory::Inventory;
use ssot_inventory::Writer;
use ssot_types::constants::SourceType;
use ssot_types::extras::Tag;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Builds the adapter for one configured source.
pub type AdapterFactory = Box<
    dyn Fn(SourceContext) -> Result<Box<dyn Source>, SourceError> + Send + Sync,
>;

/// The adapters available to the runner, by source type.
#[derive(Default)]
pub struct AdapterRegistry {
    factories: BTreeMap<SourceType, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> AdapterRegistry {
        AdapterRegistry::default()
    }

    /// A registry with every adapter this crate ships.
    pub fn with_bundled() -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        registry.register(
            SourceType::Proxmox,
            Box::new(|context| {
                let source: Box<dyn Source> =
                    Box::new(ProxmoxSource::new(context)?);
                Ok(source)
            }),
        );
        registry
    }

    pub fn register(
        &mut self,
        source_type: SourceType,
        factory: AdapterFactory,
    ) {
        self.factories.insert(source_type, factory);
    }

    pub fn build(
        &self,
        context: SourceContext,
    ) -> Result<Box<dyn Source>, SourceError> {
        let source_type = context.config.source_type;
        let factory = self.factories.get(&source_type).ok_or_else(|| {
            SourceError::Unsupported {
                source_name: context.config.name.clone(),
                source_type,
            }
        })?;
        factory(context)
    }
}

/// How one source fared.
#[derive(Debug)]
pub struct SourceOutcome {
    pub name: String,
    /// Id of the source's tag, when it exists.
    pub tag_id: Option<i64>,
    pub result: Result<(), SourceError>,
    pub init_time: Duration,
    pub sync_time: Duration,
}

impl SourceOutcome {
    fn new(name: &str) -> SourceOutcome {
        SourceOutcome {
            name: name.to_owned(),
            tag_id: None,
            result: Ok(()),
            init_time: Duration::ZERO,
            sync_time: Duration::ZERO,
        }
    }

    /// Splits off an error that ends the whole run.
    fn check_run_fatal(self) -> Result<SourceOutcome, SourceError> {
        match self.result {
            Err(error) if error.ends_run() => Err(error),
            result => Ok(SourceOutcome { result, ..self }),
        }
    }
}

/// Outcomes of every source, in declaration order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl RunReport {
    /// Source tags orphan cleanup may consider, and those it must not.
    pub fn cleanup_scope(&self) -> CleanupScope {
        let mut scope = CleanupScope::default();
        for outcome in &self.outcomes {
            let Some(tag_id) = outcome.tag_id else {
                continue;
            };
            if outcome.result.is_ok() {
                scope.succeeded.push(tag_id);
            } else {
                scope.failed.push(tag_id);
            }
        }
        scope
    }

    pub fn failed(&self) -> impl Iterator<Item = &SourceOutcome> + '_ {
        self.outcomes.iter().filter(|outcome| outcome.result.is_err())
    }
}

pub struct SourceRunner {
    log: Logger,
    adapters: Arc<AdapterRegistry>,
    cancel: CancellationToken,
    concurrent: bool,
}

impl SourceRunner {
    pub fn new(
        log: &Logger,
        adapters: AdapterRegistry,
        cancel: CancellationToken,
        concurrent: bool,
    ) -> SourceRunner {
        SourceRunner {
            log: log.new(o!("component" => "source-runner")),
            adapters: Arc::new(adapters),
            cancel,
            concurrent,
        }
    }

    /// Runs every source.  A failing source is recorded in the report and
    /// the others still run, unless the failure leaves the registry unusable
    /// or the run was cancelled, which ends the run with that error.
    pub async fn run(
        &self,
        inventory: &Arc<Inventory>,
        sources: &[SourceConfig],
    ) -> Result<RunReport, SourceError> {
        let started = Instant::now();
        let report = if self.concurrent {
            self.run_concurrently(inventory, sources).await?
        } else {
            self.run_sequentially(inventory, sources).await?
        };
        info!(self.log, "sources done";
            "sources" => report.outcomes.len(),
            "failed" => report.failed().count(),
            "elapsed_ms" => started.elapsed().as_millis(),
        );
        Ok(report)
    }

    async fn run_sequentially(
        &self,
        inventory: &Arc<Inventory>,
        sources: &[SourceConfig],
    ) -> Result<RunReport, SourceError> {
        let mut report = RunReport::default();
        for config in sources {
            let outcome = run_source(
                &self.log,
                &self.adapters,
                &self.cancel,
                inventory,
                config.clone(),
            )
            .await;
            report.outcomes.push(outcome.check_run_fatal()?);
        }
        Ok(report)
    }

    async fn run_concurrently(
        &self,
        inventory: &Arc<Inventory>,
        sources: &[SourceConfig],
    ) -> Result<RunReport, SourceError> {
        let mut tasks = JoinSet::new();
        for (index, config) in sources.iter().cloned().enumerate() {
            let log = self.log.clone();
            let adapters = Arc::clone(&self.adapters);
            let cancel = self.cancel.clone();
            let inventory = Arc::clone(inventory);
            tasks.spawn(async move {
                let outcome =
                    run_source(&log, &adapters, &cancel, &inventory, config)
                        .await;
                (index, outcome)
            });
        }

        let mut outcomes = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = match joined {
                Ok(joined) => joined,
                Err(error) if error.is_panic() => {
                    std::panic::resume_unwind(error.into_panic())
                }
                Err(_) => return Err(SourceError::Cancelled),
            };
            match outcome.check_run_fatal() {
                Ok(outcome) => {
                    outcomes.insert(index, outcome);
                }
                Err(error) => {
                    tasks.abort_all();
                    return Err(error);
                }
            }
        }
        Ok(RunReport { outcomes: outcomes.into_values().collect() })
    }
}

async fn run_source(
    log: &Logger,
    adapters: &AdapterRegistry,
    cancel: &CancellationToken,
    inventory: &Inventory,
    config: SourceConfig,
) -> SourceOutcome {
    let log = log.new(o!(
        "source" => config.name.clone(),
        "type" => config.source_type.to_string(),
    ));
    let mut outcome = SourceOutcome::new(&config.name);
    let source_tag = config.tag.clone();
    let context =
        SourceContext { log: log.clone(), config, cancel: cancel.clone() };
    let result =
        drive(&log, adapters, inventory, context, &mut outcome).await;
    outcome.result = result;
    if outcome.tag_id.is_none() {
        let tag = inventory.get_tag(&source_tag).await;
        outcome.tag_id = tag.map(|tag| tag.id);
    }

    match &outcome.result {
        Ok(()) => info!(log, "source synced";
            "init_ms" => outcome.init_time.as_millis(),
            "sync_ms" => outcome.sync_time.as_millis(),
        ),
        Err(error) => error!(log, "source failed";
            "error" => InlineErrorChain::new(error),
        ),
    }
    outcome
}

async fn drive(
    log: &Logger,
    adapters: &AdapterRegistry,
    inventory: &Inventory,
    context: SourceContext,
    outcome: &mut SourceOutcome,
) -> Result<(), SourceError> {
    if context.cancel.is_cancelled() {
        return Err(SourceError::Cancelled);
    }
    let config = &context.config;
    let engine = Writer::engine();
    let source_tag = inventory
        .add_tag(
            &engine,
            Tag {
                name: config.tag.clone(),
                color: config.tag_color.clone(),
                description: format!(
                    "Automatically created tag by netbox-ssot for source {}",
                    config.name
                ),
                ..Default::default()
            },
        )
        .await?;
    outcome.tag_id = Some(source_tag.id);
    let type_tag = inventory
        .add_tag(
            &engine,
            Tag {
                name: config.source_type.to_string(),
                color: config.source_type.tag_color().to_owned(),
                description: format!(
                    "Automatically created tag by netbox-ssot for {} sources",
                    config.source_type
                ),
                ..Default::default()
            },
        )
        .await?;
    let writer = Writer::for_source(&config.name, vec![source_tag, type_tag]);

    let mut source = adapters.build(context)?;
    let started = Instant::now();
    source.init().await?;
    outcome.init_time = started.elapsed();
    info!(log, "source initialized";
        "elapsed_ms" => outcome.init_time.as_millis(),
    );

    let started = Instant::now();
    let synced = source.sync(inventory, &writer).await;
    outcome.sync_time = started.elapsed();
    synced
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Executable program to synchronize infrastructure sources into NetBox

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use slog::warn;
use ssot_common::logging::level_from_config;
use ssot_common::logging::root_logger;
use ssot_config::Config;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[clap(
    name = "netbox-ssot",
    about = "Synchronize infrastructure sources into NetBox",
    version
)]
struct Args {
    /// Configuration file, TOML or (with a .yaml extension) YAML
    #[clap(short, long, default_value = "config.yaml", action)]
    config: Utf8PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    match do_run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("error: {:#}", error);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every source succeeded.
async fn do_run() -> Result<bool, anyhow::Error> {
    let args = Args::parse();

    // Nothing is logged until the configuration is known to be good.
    let config = Config::from_file(&args.config)
        .with_context(|| format!("failed to load {:?}", args.config))?;
    let log = root_logger(
        level_from_config(config.logger.level),
        &config.logger.dest,
    )
    .context("failed to create logger")?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let log = log.clone();
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(log, "interrupted, cancelling the run");
                cancel.cancel();
            }
        }
    });

    let summary = netbox_ssot::run(&log, &config, cancel).await?;
    Ok(summary.succeeded())
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Source adapters and the runner that feeds them into the inventory
//!
//! An adapter snapshots one upstream system in [`Source::init`] and turns
//! the snapshot into inventory records in [`Source::sync`].  The
//! [`SourceRunner`] creates each source's tags, drives its adapter and
//! works out which sources' records orphan cleanup may touch.

mod error;
pub mod helpers;
mod http;
pub mod proxmox;
mod runner;

pub use error::SourceError;
pub use error::UpstreamError;
pub use runner::AdapterFactory;
pub use runner::AdapterRegistry;
pub use runner::RunReport;
pub use runner::SourceOutcome;
pub use runner::SourceRunner;

use async_trait::async_trait;
use slog::Logger;
use ssot_config::SourceConfig;
use ssot_inventory::Inventory;
use ssot_inventory::Writer;
use tokio_util::sync::CancellationToken;

/// What an adapter is built from.
#[derive(Clone)]
pub struct SourceContext {
    pub log: Logger,
    pub config: SourceConfig,
    pub cancel: CancellationToken,
}

#[async_trait]
pub trait Source: Send + Sync {
    /// Fetches the upstream inventory into memory.  Must not touch the
    /// inventory.
    async fn init(&mut self) -> Result<(), SourceError>;

    /// Adds the fetched records to `inventory`, dependencies first.
    async fn sync(
        &self,
        inventory: &Inventory,
        writer: &Writer,
    ) -> Result<(), SourceError>;
}

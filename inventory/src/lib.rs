// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The reconciling inventory engine
//!
//! An [`Inventory`] holds an indexed copy of every record the registry has
//! of the managed kinds.  Sources feed it desired records through the
//! `add_*` operations, each of which creates, patches or leaves alone the
//! registry's record so that it matches.  Records nobody added during the
//! run are orphans; [`Inventory::remove_orphans`] sweeps them at the end.

mod add;
pub mod diff;
mod engine;
mod error;
mod index;
mod orphans;
pub mod priority;

pub use engine::Inventory;
pub use engine::InventoryConfig;
pub use engine::Stats;
pub use engine::Writer;
pub use error::InventoryError;
pub use error::RegistryOp;
pub use orphans::CleanupReport;
pub use orphans::CleanupScope;
pub use priority::SourcePriority;

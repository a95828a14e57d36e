// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client for the NetBox REST API
//!
//! [`RegistryApi`] is the untyped CRUD surface the inventory engine depends
//! on; [`Client`] implements it over HTTP.  The `*_typed` helpers decode
//! responses into [`ssot_types`] records.

mod api;
mod client;
mod error;

pub use api::create_typed;
pub use api::list_typed;
pub use api::patch_typed;
pub use api::ListFilter;
pub use api::RegistryApi;
pub use client::Client;
pub use client::ClientConfig;
pub use error::Error;
pub use error::ErrorClass;

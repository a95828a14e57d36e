// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Records of the inventory registry, as read from and written to its API
//!
//! Every record type implements [`Record`], which gives the inventory engine
//! its kind, its natural key and its references.  Records reference each
//! other through `Arc`s of the referenced record and are written to the
//! registry as bare ids.

pub mod address;
pub mod choice;
pub mod constants;
pub mod dcim;
pub mod extras;
pub mod ipam;
pub mod kind;
pub mod record;
mod refs;
pub mod slug;
pub mod tenancy;
pub mod virtualization;

pub use choice::Choice;
pub use kind::ObjectKind;
pub use record::Base;
pub use record::CustomFields;
pub use record::ObjectRef;
pub use record::Record;
pub use slug::slugify;

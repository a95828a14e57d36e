// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tenants and their groups

use crate::kind::ObjectKind;
use crate::record::refs_of;
use crate::record::reference_record;
use crate::record::taggable_record;
use crate::record::Base;
use crate::refs;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;

/// A tenant group.  Referenced by id only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantGroup {
    #[serde(skip_serializing_if = "refs::is_unset")]
    pub id: i64,
    pub name: String,
    pub slug: String,
}

reference_record!(TenantGroup, ObjectKind::TenantGroup);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tenant {
    #[serde(flatten)]
    pub base: Base,
    pub name: String,
    pub slug: String,
    #[serde(
        with = "refs::one",
        skip_serializing_if = "Option::is_none"
    )]
    pub group: Option<Arc<TenantGroup>>,
}

taggable_record!(
    Tenant, ObjectKind::Tenant, key = String,
    |this| this.name.clone(),
    refs = |this, out| {
        refs_of(&mut out, &this.group);
    }
);

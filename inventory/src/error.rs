// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use ssot_common::ErrorKind;
use ssot_types::ObjectKind;
use ssot_types::ObjectRef;

/// Registry operations the engine performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RegistryOp {
    List,
    Create,
    Patch,
    Delete,
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("{op} {kind}")]
    Registry {
        kind: ObjectKind,
        op: RegistryOp,
        #[source]
        source: netbox_client::Error,
    },

    #[error(
        "{kind} {key}: references {} {} which is not in the inventory",
        missing.kind, missing.id
    )]
    MissingPrerequisite { kind: ObjectKind, key: String, missing: ObjectRef },

    #[error("invalid {kind} {key}: {message}")]
    InvalidRecord { kind: ObjectKind, key: String, message: String },
}

impl InventoryError {
    pub(crate) fn registry(
        kind: ObjectKind,
        op: RegistryOp,
        source: netbox_client::Error,
    ) -> InventoryError {
        InventoryError::Registry { kind, op, source }
    }

    pub(crate) fn invalid(
        kind: ObjectKind,
        key: impl std::fmt::Debug,
        message: impl Into<String>,
    ) -> InventoryError {
        InventoryError::InvalidRecord {
            kind,
            key: format!("{key:?}"),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::Registry { source, .. } => match source.class() {
                netbox_client::ErrorClass::Config => ErrorKind::Config,
                netbox_client::ErrorClass::Transport => ErrorKind::Transport,
                netbox_client::ErrorClass::Auth => ErrorKind::Auth,
                netbox_client::ErrorClass::Protocol => ErrorKind::Protocol,
                netbox_client::ErrorClass::Cancelled => ErrorKind::Cancelled,
            },
            InventoryError::MissingPrerequisite { .. } => {
                ErrorKind::Prerequisite
            }
            InventoryError::InvalidRecord { .. } => ErrorKind::DataQuality,
        }
    }

    /// Whether the registry itself is unusable, so that no further source
    /// should be run.  A failed create also ends the current source.
    pub fn is_registry_fatal(&self) -> bool {
        match self {
            InventoryError::Registry { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

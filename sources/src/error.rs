// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use http::Method;
use http::StatusCode;
use ssot_common::ErrorKind;
use ssot_inventory::InventoryError;
use ssot_types::constants::SourceType;

/// Errors talking to an upstream system.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("{method} {url}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url}: authentication failed ({status})")]
    Auth { method: Method, url: String, status: StatusCode },

    #[error("{method} {url}: unexpected status {status}: {body}")]
    Status { method: Method, url: String, status: StatusCode, body: String },

    #[error("{method} {url}: decoding response: {message}")]
    Decode { method: Method, url: String, message: String },

    #[error("request cancelled")]
    Cancelled,
}

impl UpstreamError {
    /// Whether repeating the request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Transport { .. } => true,
            UpstreamError::Status { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("source {source_name}")]
    Upstream {
        source_name: String,
        #[source]
        source: UpstreamError,
    },

    #[error("source {source_name}: {message}")]
    Init { source_name: String, message: String },

    #[error("source {source_name}: type {source_type} is not supported")]
    Unsupported { source_name: String, source_type: SourceType },

    #[error("run cancelled")]
    Cancelled,
}

impl SourceError {
    pub(crate) fn upstream(name: &str, error: UpstreamError) -> SourceError {
        match error {
            UpstreamError::Cancelled => SourceError::Cancelled,
            source => {
                SourceError::Upstream { source_name: name.to_owned(), source }
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::Inventory(error) => error.kind(),
            SourceError::Upstream { source, .. } => match source {
                UpstreamError::Transport { .. } => ErrorKind::Transport,
                UpstreamError::Auth { .. } => ErrorKind::Auth,
                UpstreamError::Status { .. } | UpstreamError::Decode { .. } => {
                    ErrorKind::Protocol
                }
                UpstreamError::Cancelled => ErrorKind::Cancelled,
            },
            SourceError::Init { .. } | SourceError::Unsupported { .. } => {
                ErrorKind::Config
            }
            SourceError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether no further source should run: the registry is unusable or
    /// the run was cancelled.  Anything else only ends the failing source.
    pub fn ends_run(&self) -> bool {
        match self {
            SourceError::Inventory(error) => error.is_registry_fatal(),
            SourceError::Cancelled => true,
            _ => false,
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use http::Method;
use http::StatusCode;
use ssot_types::ObjectKind;

/// Broad classes of registry errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// The client could not be constructed from its configuration.
    Config,
    /// Network, TLS or timeout failure.
    Transport,
    /// The registry rejected the credentials.
    Auth,
    /// Unexpected status code or malformed body.
    Protocol,
    /// The run was cancelled while the request was in flight.
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid registry client configuration: {0}")]
    Config(String),

    #[error("{method} {url}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url}: authentication failed ({status}): {body}")]
    Auth { method: Method, url: String, status: StatusCode, body: String },

    #[error("{method} {url}: unexpected status {status}: {body}")]
    Status { method: Method, url: String, status: StatusCode, body: String },

    #[error("{method} {url}: decoding response: {message}")]
    Decode { method: Method, url: String, message: String },

    #[error("encoding {kind} record: {message}")]
    Encode { kind: ObjectKind, message: String },

    #[error("request cancelled")]
    Cancelled,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Config(_) => ErrorClass::Config,
            Error::Transport { .. } => ErrorClass::Transport,
            Error::Auth { .. } => ErrorClass::Auth,
            Error::Status { .. }
            | Error::Decode { .. }
            | Error::Encode { .. } => {
                ErrorClass::Protocol
            }
            Error::Cancelled => ErrorClass::Cancelled,
        }
    }

    /// The HTTP status the registry answered with, if it answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Auth { status, .. } | Error::Status { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Whether the error leaves the registry unusable for the rest of the
    /// run, as opposed to a problem with a single request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Config
                | ErrorClass::Transport
                | ErrorClass::Auth
                | ErrorClass::Cancelled
        )
    }
}

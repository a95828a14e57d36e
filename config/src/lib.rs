// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loading and validating the netbox-ssot configuration file
//!
//! The file is TOML unless its extension is `.yaml` or `.yml`.  Parsing
//! produces a raw tree in which every option is optional; validation then
//! checks every option, reports all problems at once, and fills in defaults.

mod config;
mod raw;
mod relations;
mod validate;

pub use config::*;
pub use relations::RegexRelations;
pub use relations::RelationError;
pub use validate::Problem;
pub use validate::ValidationError;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use ssot_common::ErrorKind;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Every problem found while validating a configuration.
#[derive(Debug)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading \"{path}\": {err}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("error parsing \"{path}\": {err}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        err: FormatError,
    },
    #[error("invalid configuration: {0}")]
    Invalid(ValidationErrors),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }

    /// The individual validation failures, if any.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            ConfigError::Invalid(errors) => &errors.0,
            _ => &[],
        }
    }
}

impl Config {
    /// Load and validate a `Config` from the given file
    pub fn from_file(path: &Utf8Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Io { path: path.into(), err })?;
        let is_yaml =
            matches!(path.extension(), Some("yaml") | Some("yml"));
        let parsed = if is_yaml {
            serde_yaml::from_str(&contents).map_err(FormatError::from)
        } else {
            toml::from_str(&contents).map_err(FormatError::from)
        };
        let raw = parsed
            .map_err(|err| ConfigError::Parse { path: path.into(), err })?;
        Config::validate(raw)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Config, ConfigError> {
        let raw = toml::from_str(contents).map_err(|err| {
            ConfigError::Parse {
                path: Utf8PathBuf::from("<string>"),
                err: FormatError::Toml(err),
            }
        })?;
        Config::validate(raw)
    }

    fn validate(raw: raw::RawConfig) -> Result<Config, ConfigError> {
        validate::validate(raw)
            .map_err(|errors| ConfigError::Invalid(ValidationErrors(errors)))
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `"<regex> = <value>"` mappings from upstream names to registry names

use regex::Regex;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RelationError {
    #[error(
        "invalid regex relation: {0}. Should be of format: regex = value"
    )]
    Format(String),
    #[error("invalid regex: {0}")]
    Regex(String),
}

/// An ordered list of patterns and the value each one maps to.  The first
/// pattern that matches wins, so specific patterns go before broad ones.
#[derive(Clone, Debug, Default)]
pub struct RegexRelations {
    entries: Vec<(Regex, String)>,
}

impl RegexRelations {
    pub fn parse<S: AsRef<str>>(
        entries: &[S],
    ) -> Result<RegexRelations, RelationError> {
        let entries = entries
            .iter()
            .map(|entry| parse_entry(entry.as_ref()))
            .collect::<Result<_, _>>()?;
        Ok(RegexRelations { entries })
    }

    /// The value of the first pattern matching `name`.
    pub fn find(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(pattern, _)| pattern.is_match(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_entry(entry: &str) -> Result<(Regex, String), RelationError> {
    // The value never contains '=', the pattern may.
    let (pattern, value) = entry
        .rsplit_once('=')
        .map(|(pattern, value)| (pattern.trim(), value.trim()))
        .filter(|(pattern, value)| !pattern.is_empty() && !value.is_empty())
        .ok_or_else(|| RelationError::Format(entry.to_owned()))?;
    let regex = Regex::new(pattern)
        .map_err(|_| RelationError::Regex(pattern.to_owned()))?;
    Ok((regex, value.to_owned()))
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ranking of sources that write the same record

use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rank {
    /// Position in the configured order; lower wins.
    Listed(usize),
    /// The engine itself, writing records no source owns.  Every listed
    /// source outranks it.
    Engine,
    /// A source not in the configured order, typically the stamp of a
    /// source that has since been removed.
    Unlisted,
}

/// The configured `source_priority` order.
///
/// A record remembers the source that last wrote it in its `source_name`
/// custom field.  When another source writes the same record, the two are
/// compared here: a writer never overwrites a record stamped by a source
/// that strictly outranks it, and a writer that strictly outranks the stamp
/// also clears the fields it has no value for.  With an empty order every
/// source ranks equally and the last writer wins.
#[derive(Clone, Debug, Default)]
pub struct SourcePriority {
    ranks: BTreeMap<String, usize>,
}

impl SourcePriority {
    pub fn new<S: AsRef<str>>(order: &[S]) -> SourcePriority {
        let mut ranks = BTreeMap::new();
        for (rank, name) in order.iter().enumerate() {
            ranks.entry(name.as_ref().to_owned()).or_insert(rank);
        }
        SourcePriority { ranks }
    }

    fn rank(&self, source: Option<&str>) -> Rank {
        match source {
            None => Rank::Engine,
            Some(name) => self
                .ranks
                .get(name)
                .map_or(Rank::Unlisted, |rank| Rank::Listed(*rank)),
        }
    }

    /// Whether `a` strictly outranks `b`.
    pub fn outranks(&self, a: Option<&str>, b: Option<&str>) -> bool {
        match (self.rank(a), self.rank(b)) {
            (Rank::Listed(a), Rank::Listed(b)) => a < b,
            (Rank::Listed(_), Rank::Engine) => true,
            _ => false,
        }
    }

    /// Whether a record stamped by `stamp` must be left alone by `writer`.
    pub fn suppresses(
        &self,
        writer: Option<&str>,
        stamp: Option<&str>,
    ) -> bool {
        stamp.is_some() && self.outranks(stamp, writer)
    }

    /// Whether `writer` takes over a record stamped by `stamp`, clearing the
    /// fields it has no value for.
    pub fn resets(&self, writer: Option<&str>, stamp: Option<&str>) -> bool {
        stamp.is_some() && self.outranks(writer, stamp)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_configured_order() {
        let priority = SourcePriority::new(&["a", "b"]);
        assert!(priority.suppresses(Some("b"), Some("a")));
        assert!(!priority.suppresses(Some("a"), Some("b")));
        assert!(!priority.suppresses(Some("a"), Some("a")));
        assert!(priority.resets(Some("a"), Some("b")));
        assert!(!priority.resets(Some("b"), Some("b")));
        // Unstamped records never trigger either rule.
        assert!(!priority.suppresses(Some("b"), None));
        assert!(!priority.resets(Some("a"), None));
    }

    #[test]
    fn test_engine_and_unlisted_sources() {
        let priority = SourcePriority::new(&["a"]);
        assert!(priority.suppresses(None, Some("a")));
        assert!(!priority.suppresses(Some("a"), Some("gone")));
        assert!(!priority.resets(Some("a"), Some("gone")));
        assert!(!priority.suppresses(None, Some("gone")));
    }

    #[test]
    fn test_empty_order_is_last_writer_wins() {
        let priority = SourcePriority::new::<&str>(&[]);
        assert!(!priority.suppresses(Some("b"), Some("a")));
        assert!(!priority.resets(Some("a"), Some("b")));
    }
}

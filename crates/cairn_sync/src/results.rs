//! Outcomes of transfers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::AddAssign;

use crate::error::{SyncError, SyncResult};

/// What happened to every key of one transfer.
#[derive(Debug, Default)]
pub struct TransferResults {
    /// Keys created.
    pub created: BTreeSet<String>,
    /// Keys updated.
    pub updated: BTreeSet<String>,
    /// Keys removed.
    pub removed: BTreeSet<String>,
    /// Keys left alone.
    pub unmodified: BTreeSet<String>,
    /// Keys whose operation did not complete.
    pub errored: BTreeMap<String, SyncError>,
}

impl TransferResults {
    /// Creates empty results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with any outcome.
    pub fn len(&self) -> usize {
        self.summary().total()
    }

    /// Whether no key has an outcome.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any key failed.
    pub fn has_errors(&self) -> bool {
        !self.errored.is_empty()
    }

    /// Outcome counts.
    pub fn summary(&self) -> TransferSummary {
        TransferSummary {
            created: self.created.len(),
            updated: self.updated.len(),
            removed: self.removed.len(),
            unmodified: self.unmodified.len(),
            errored: self.errored.len(),
        }
    }
}

/// Outcome counts of one or more transfers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    /// Items created.
    pub created: usize,
    /// Items updated.
    pub updated: usize,
    /// Items removed.
    pub removed: usize,
    /// Items left alone.
    pub unmodified: usize,
    /// Items that failed.
    pub errored: usize,
}

impl TransferSummary {
    /// Sum of all outcomes.
    pub fn total(&self) -> usize {
        self.created + self.updated + self.removed + self.unmodified + self.errored
    }
}

impl AddAssign for TransferSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.updated += rhs.updated;
        self.removed += rhs.removed;
        self.unmodified += rhs.unmodified;
        self.errored += rhs.errored;
    }
}

impl fmt::Display for TransferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} removed, {} unmodified, {} errored",
            self.created, self.updated, self.removed, self.unmodified, self.errored
        )
    }
}

/// Results of a push, one entry per category in processing order.
#[derive(Debug, Default)]
pub struct PushResults {
    entries: Vec<(String, TransferResults)>,
}

impl PushResults {
    /// Creates empty results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the results of the phase `label`.
    pub fn set(&mut self, label: impl Into<String>, results: TransferResults) {
        let label = label.into();
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some((_, existing)) => *existing = results,
            None => self.entries.push((label, results)),
        }
    }

    /// Results of the phase `label`.
    pub fn get(&self, label: &str) -> Option<&TransferResults> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, r)| r)
    }

    /// Phases in processing order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TransferResults)> {
        self.entries.iter().map(|(l, r)| (l.as_str(), r))
    }

    /// Totals across every phase.
    pub fn summary(&self) -> TransferSummary {
        let mut total = TransferSummary::default();
        for (_, results) in &self.entries {
            total += results.summary();
        }
        total
    }

    /// Whether any phase recorded a failed key.
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|(_, r)| r.has_errors())
    }
}

/// Per-category outcomes of a run whose categories fail independently.
#[derive(Debug, Default)]
pub struct CategoryResults {
    entries: Vec<(String, SyncResult<TransferResults>)>,
}

impl CategoryResults {
    /// Creates empty results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the outcome of one category.
    pub fn push(&mut self, label: impl Into<String>, outcome: SyncResult<TransferResults>) {
        self.entries.push((label.into(), outcome));
    }

    /// Outcome of the category `label`.
    pub fn get(&self, label: &str) -> Option<&SyncResult<TransferResults>> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, r)| r)
    }

    /// Outcomes in processing order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SyncResult<TransferResults>)> {
        self.entries.iter().map(|(l, r)| (l.as_str(), r))
    }

    /// Categories that failed as a whole.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &SyncError)> {
        self.entries
            .iter()
            .filter_map(|(l, r)| r.as_ref().err().map(|e| (l.as_str(), e)))
    }

    /// Totals across every category that completed.
    pub fn summary(&self) -> TransferSummary {
        let mut total = TransferSummary::default();
        for results in self.entries.iter().filter_map(|(_, r)| r.as_ref().ok()) {
            total += results.summary();
        }
        total
    }

    /// Whether any category or key failed.
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|(_, r)| match r {
            Ok(results) => results.has_errors(),
            Err(_) => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(created: &[&str], errored: &[&str]) -> TransferResults {
        TransferResults {
            created: created.iter().map(|k| k.to_string()).collect(),
            errored: errored
                .iter()
                .map(|k| (k.to_string(), SyncError::validation("bad")))
                .collect(),
            ..TransferResults::default()
        }
    }

    #[test]
    fn push_results_keep_order_and_replace() {
        let mut push = PushResults::new();
        push.set("Assets", results(&["a"], &[]));
        push.set("Entries", results(&["x", "y"], &[]));
        push.set("Assets", results(&["a", "b"], &[]));

        let labels: Vec<_> = push.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["Assets", "Entries"]);
        assert_eq!(push.summary().created, 4);
        assert!(!push.has_errors());

        push.set("References", results(&[], &["entries/x"]));
        assert!(push.has_errors());
        assert_eq!(push.get("References").unwrap().summary().errored, 1);
    }

    #[test]
    fn category_results() {
        let mut outcomes = CategoryResults::new();
        outcomes.push("Assets", Ok(results(&["a"], &[])));
        outcomes.push("Entries", Err(SyncError::transport_fatal("down")));

        assert!(outcomes.has_errors());
        assert_eq!(outcomes.summary().created, 1);
        assert_eq!(outcomes.failures().map(|(l, _)| l).collect::<Vec<_>>(), vec!["Entries"]);
        assert!(outcomes.get("Assets").unwrap().is_ok());
    }

    #[test]
    fn summary_display() {
        let summary = results(&["a"], &["b"]).summary();
        assert_eq!(summary.total(), 2);
        assert_eq!(
            summary.to_string(),
            "1 created, 0 updated, 0 removed, 0 unmodified, 1 errored"
        );
    }
}

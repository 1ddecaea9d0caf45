//! Merge planning: diff two keyed collections into disjoint buckets.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use crate::config::{DeletionStrategy, InclusionFilter};
use crate::item::Collection;
use crate::progress::Notices;

/// The source-side and target-side versions of an item that differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePair<T> {
    /// Version to write.
    pub local: T,
    /// Version currently stored.
    pub remote: T,
}

/// Four disjoint partitions of the key space of two collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan<T> {
    /// Source-only items.
    pub to_create: Collection<T>,
    /// Items on both sides that differ.
    pub to_update: BTreeMap<String, UpdatePair<T>>,
    /// Target-only items.
    pub to_remove: Collection<T>,
    /// Keys left alone.
    pub to_skip: BTreeSet<String>,
}

impl<T> Default for MergePlan<T> {
    fn default() -> Self {
        Self {
            to_create: BTreeMap::new(),
            to_update: BTreeMap::new(),
            to_remove: BTreeMap::new(),
            to_skip: BTreeSet::new(),
        }
    }
}

impl<T> MergePlan<T> {
    /// Number of keys across all buckets.
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_remove.len() + self.to_skip.len()
    }

    /// Whether the plan covers no key at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether executing the plan would write anything.
    pub fn has_changes(&self) -> bool {
        !(self.to_create.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty())
    }

    /// Counts per bucket, with removals counted as skips unless `strategy`
    /// deletes them.
    pub fn summary(&self, strategy: DeletionStrategy) -> PlanSummary {
        let (remove, kept) = match strategy {
            DeletionStrategy::Delete => (self.to_remove.len(), 0),
            DeletionStrategy::Ignore | DeletionStrategy::Warn => (0, self.to_remove.len()),
        };
        PlanSummary {
            create: self.to_create.len(),
            update: self.to_update.len(),
            remove,
            skip: self.to_skip.len() + kept,
        }
    }
}

/// Bucket sizes of a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    /// Items to create.
    pub create: usize,
    /// Items to update.
    pub update: usize,
    /// Items to remove.
    pub remove: usize,
    /// Items left alone.
    pub skip: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to remove, {} unchanged",
            self.create, self.update, self.remove, self.skip
        )
    }
}

/// Diffs `local` against `remote`.
///
/// One pass over each collection: local keys go to `to_skip` when `eq`
/// holds for both versions, `to_update` when it does not and `to_create`
/// when the key is local-only; remote keys never seen go to `to_remove`.
pub fn plan<T, F>(local: &Collection<T>, remote: &Collection<T>, eq: F) -> MergePlan<T>
where
    T: Clone,
    F: Fn(&T, &T) -> bool,
{
    plan_filtered(local, remote, &InclusionFilter::All, eq, None)
}

/// [`plan`], restricted to the keys `filter` includes.
///
/// A local key the filter excludes is skipped, with a verbose warning
/// because the item exists locally. A remote-only key the filter excludes
/// is outside the run's scope and is skipped silently instead of removed.
pub fn plan_filtered<T, F>(
    local: &Collection<T>,
    remote: &Collection<T>,
    filter: &InclusionFilter,
    eq: F,
    notices: Option<&Notices>,
) -> MergePlan<T>
where
    T: Clone,
    F: Fn(&T, &T) -> bool,
{
    let mut plan = MergePlan::default();
    let mut seen = BTreeSet::new();

    for (key, item) in local {
        seen.insert(key.as_str());

        if !filter.is_included(key) {
            if let Some(notices) = notices {
                notices.verbose(&format!(
                    "Skipping item which exists locally, but is not included by filters: {key}"
                ));
            }
            plan.to_skip.insert(key.clone());
            continue;
        }

        match remote.get(key) {
            Some(existing) if eq(item, existing) => {
                plan.to_skip.insert(key.clone());
            }
            Some(existing) => {
                debug!(key = %key, "planned update");
                plan.to_update.insert(
                    key.clone(),
                    UpdatePair {
                        local: item.clone(),
                        remote: existing.clone(),
                    },
                );
            }
            None => {
                debug!(key = %key, "planned create");
                plan.to_create.insert(key.clone(), item.clone());
            }
        }
    }

    for (key, item) in remote {
        if seen.contains(key.as_str()) {
            continue;
        }
        if filter.is_included(key) {
            debug!(key = %key, "planned removal");
            plan.to_remove.insert(key.clone(), item.clone());
        } else {
            plan.to_skip.insert(key.clone());
        }
    }

    plan
}

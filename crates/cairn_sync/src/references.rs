//! Tracking of identifiers and of references that could not be resolved
//! when their source was written.

use std::collections::{btree_map, BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::SyncResult;
use crate::item::{Item, ItemId};
use crate::link::{item_path, LinkResolver};

/// A reference from `source` to a `target` that did not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnresolvedReference {
    /// Logical path of the referencing item.
    pub source: String,
    /// Logical path it pointed at.
    pub target: String,
}

/// Collects identifiers during the first pass of a push.
///
/// Every path is written once, so concurrent writers within a category
/// never contend for the same entry.
#[derive(Debug, Default)]
pub struct ReferenceTracker {
    ids: RwLock<BTreeMap<String, ItemId>>,
    unresolved: RwLock<Vec<UnresolvedReference>>,
    missed_sources: RwLock<BTreeSet<String>>,
    pending: RwLock<BTreeMap<String, (String, Item)>>,
    missed: AtomicUsize,
}

impl ReferenceTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an item that was just created or updated.
    ///
    /// The item is kept for the corrective pass if any of its references
    /// missed while it was being written.
    pub fn record_created(&self, category: &str, item: &Item) -> SyncResult<()> {
        let id = item.require_id(category)?;
        let path = item_path(category, &item.key);
        self.ids.write().insert(path.clone(), id.clone());

        if self.missed_sources.read().contains(&path) {
            self.pending
                .write()
                .insert(path, (category.to_string(), item.clone()));
        }
        Ok(())
    }

    /// Records the identifier of an item that already exists unchanged.
    pub fn record_existing(&self, category: &str, key: &str, id: &ItemId) {
        self.ids.write().insert(item_path(category, key), id.clone());
    }

    /// The identifier of `target`, recording a miss against `source` when
    /// it does not exist yet.
    pub fn resolve(&self, source: &str, target: &str) -> Option<ItemId> {
        if let Some(id) = self.ids.read().get(target) {
            return Some(id.clone());
        }

        debug!(source, target, "reference not resolvable yet");
        self.missed.fetch_add(1, Ordering::Relaxed);
        self.missed_sources.write().insert(source.to_string());
        self.unresolved.write().push(UnresolvedReference {
            source: source.to_string(),
            target: target.to_string(),
        });
        None
    }

    /// A resolver that attributes misses to the item at `category/key`.
    pub fn scope<'a>(&'a self, category: &str, key: &str) -> SourceScope<'a> {
        SourceScope {
            tracker: self,
            source: item_path(category, key),
        }
    }

    /// Number of references that missed so far.
    pub fn missed(&self) -> usize {
        self.missed.load(Ordering::Relaxed)
    }

    /// Number of recorded identifiers.
    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }

    /// Freezes the tracker. The returned view cannot record anything.
    pub fn seal(self) -> SealedReferences {
        let mut unresolved = self.unresolved.into_inner();
        unresolved.sort();
        SealedReferences {
            ids: self.ids.into_inner(),
            pending: self.pending.into_inner(),
            unresolved,
            missed: self.missed.into_inner(),
        }
    }
}

/// Resolves links on behalf of one source item.
#[derive(Debug)]
pub struct SourceScope<'a> {
    tracker: &'a ReferenceTracker,
    source: String,
}

impl LinkResolver for SourceScope<'_> {
    fn resolve(&self, path: &str) -> Option<ItemId> {
        self.tracker.resolve(&self.source, path)
    }
}

/// Read-only identifier map, available once the first pass is over.
#[derive(Debug, Default)]
pub struct SealedReferences {
    ids: BTreeMap<String, ItemId>,
    pending: BTreeMap<String, (String, Item)>,
    unresolved: Vec<UnresolvedReference>,
    missed: usize,
}

impl SealedReferences {
    /// The identifier recorded for `path`.
    pub fn get(&self, path: &str) -> Option<&ItemId> {
        self.ids.get(path)
    }

    /// Number of references that missed during the first pass.
    pub fn missed(&self) -> usize {
        self.missed
    }

    /// Every miss of the first pass, sorted.
    pub fn unresolved(&self) -> &[UnresolvedReference] {
        &self.unresolved
    }

    /// Number of items waiting for the corrective pass.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Takes every written item that had at least one unresolved reference,
    /// as `(category, item)`, each exactly once.
    ///
    /// The sequence can be taken once; later calls yield nothing.
    pub fn entries_with_missed_references(&mut self) -> MissedEntries {
        MissedEntries {
            inner: std::mem::take(&mut self.pending).into_values(),
        }
    }
}

impl LinkResolver for SealedReferences {
    fn resolve(&self, path: &str) -> Option<ItemId> {
        self.ids.get(path).cloned()
    }
}

/// Items that need their references rewritten, in path order.
pub struct MissedEntries {
    inner: btree_map::IntoValues<String, (String, Item)>,
}

impl Iterator for MissedEntries {
    type Item = (String, Item);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for MissedEntries {}

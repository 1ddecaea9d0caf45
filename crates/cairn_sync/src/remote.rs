//! The remote side of a run: listing, link normalisation and planning.

use std::collections::{BTreeMap, BTreeSet};

use cairn_codec::{Comparator, Fingerprint, Value};
use tracing::debug;

use crate::config::{DeletionStrategy, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::hierarchy::{is_included_transitively, plan_folders};
use crate::item::{Category, CategoryKind, Collection, Item, LocaleVersion, Snapshot};
use crate::link::{item_path, prune_links, references, unresolve_links, IdIndex};
use crate::plan::{plan_filtered, MergePlan};
use crate::progress::Notices;
use crate::references::ReferenceTracker;
use crate::retry::disambiguated_title;
use crate::store::RemoteStore;

/// Remote items of every category of a run, links in local form.
///
/// Each category is listed independently; a failed listing only affects
/// that category.
#[derive(Debug, Default)]
pub(crate) struct RemoteSnapshot {
    lists: BTreeMap<String, SyncResult<Collection>>,
}

impl RemoteSnapshot {
    /// Lists `categories` one after the other.
    pub(crate) async fn list<S: RemoteStore>(store: &S, categories: &[Category]) -> Self {
        let mut lists = BTreeMap::new();
        for category in categories {
            let listed = store.list(&category.name).await;
            if let Ok(items) = &listed {
                debug!(category = %category.name, items = items.len(), "listed remote");
            }
            lists.insert(category.name.clone(), listed);
        }

        let mut index = IdIndex::new();
        for (name, listed) in &lists {
            if let Ok(items) = listed {
                index.add_collection(name, items);
            }
        }

        for listed in lists.values_mut() {
            if let Ok(items) = listed {
                for item in items.values_mut() {
                    normalise(item, &index);
                }
            }
        }
        Self { lists }
    }

    /// Files items stored under a disambiguated title back under the key
    /// they were created for.
    ///
    /// Applies only when `local` wants that key, does not want the
    /// disambiguated one, and nothing remote already holds it.
    pub(crate) fn adopt_disambiguated(&mut self, categories: &[Category], local: &Snapshot) {
        for category in categories {
            let Some(Ok(items)) = self.lists.get_mut(&category.name) else {
                continue;
            };
            let wanted = local.get(&category.name);
            let adopted: Vec<(String, String)> = wanted
                .keys()
                .filter(|key| !items.contains_key(key.as_str()))
                .map(|key| (disambiguated_title(key, &category.name), key.clone()))
                .filter(|(stored, _)| items.contains_key(stored) && !wanted.contains_key(stored))
                .collect();

            for (stored, key) in adopted {
                if let Some(item) = items.remove(&stored) {
                    debug!(category = %category.name, %stored, %key, "adopted disambiguated item");
                    items.insert(key.clone(), rekey(item, &stored, &key));
                }
            }
        }
    }

    /// Paths that exist once a run over `categories` completes.
    ///
    /// Remote items the run removes are not among them.
    pub(crate) fn live_paths(
        &self,
        categories: &[Category],
        local: &Snapshot,
        config: &SyncConfig,
    ) -> BTreeSet<String> {
        let mut live = BTreeSet::new();
        for category in categories {
            let name = category.name.as_str();
            let filter = config.category_filter(category);
            let wanted = local.get(name);
            let included = |key: &str| filter.is_included(key);

            match &category.kind {
                CategoryKind::Folders { contents } => {
                    let mut all_keys: BTreeSet<String> = wanted.keys().cloned().collect();
                    all_keys.extend(local.get(contents).keys().cloned());
                    live.extend(
                        wanted
                            .keys()
                            .filter(|key| is_included_transitively(key.as_str(), included, &all_keys))
                            .map(|key| item_path(name, key)),
                    );
                }
                CategoryKind::Flat | CategoryKind::Files => live.extend(
                    wanted
                        .keys()
                        .filter(|key| included(key.as_str()))
                        .map(|key| item_path(name, key)),
                ),
            }
            if let Some(Ok(items)) = self.lists.get(name) {
                live.extend(
                    items
                        .keys()
                        .filter(|key| {
                            wanted.contains_key(*key)
                                || config.deletion_strategy != DeletionStrategy::Delete
                                || !filter.is_included(key)
                        })
                        .map(|key| item_path(name, key)),
                );
            }
        }
        live
    }

    /// Records the identifier of every listed item in `live`.
    pub(crate) fn seed(&self, tracker: &ReferenceTracker, live: &BTreeSet<String>) {
        for (name, listed) in &self.lists {
            let Ok(items) = listed else {
                continue;
            };
            for (key, item) in items {
                if let Some(id) = &item.id {
                    if live.contains(&item_path(name, key)) {
                        tracker.record_existing(name, key, id);
                    }
                }
            }
        }
    }

    /// Takes the items of `category`, or the error listing it failed with.
    pub(crate) fn take(&mut self, category: &str) -> SyncResult<Collection> {
        self.lists
            .remove(category)
            .unwrap_or_else(|| Ok(Collection::new()))
    }
}

fn rekey(mut item: Item, stored: &str, key: &str) -> Item {
    let retitle = |payload: &Value| {
        if payload.title() == Some(stored) {
            payload.with_field("title", Value::from(key))
        } else {
            payload.clone()
        }
    };
    item.key = key.to_string();
    item.payload = retitle(&item.payload);
    for version in &mut item.locales {
        version.payload = retitle(&version.payload);
    }
    item
}

fn normalise(item: &mut Item, index: &IdIndex) {
    item.payload = unresolve_links(&item.payload, index);
    item.locales = item
        .locales
        .iter()
        .map(|version| LocaleVersion {
            locale: version.locale.clone(),
            payload: unresolve_links(&version.payload, index),
        })
        .collect();
}

/// Drops links of `categories` whose target is not in `live`.
///
/// Such a link could never be resolved, so it is written the way an
/// unresolvable link ends up remotely and compared that way.
pub(crate) fn prune_dangling(
    snapshot: &Snapshot,
    categories: &[Category],
    live: &BTreeSet<String>,
    notices: &Notices,
) -> Snapshot {
    let is_live = |path: &str| live.contains(path);
    let mut pruned = snapshot.clone();

    for category in categories {
        let name = category.name.as_str();
        for (key, item) in pruned.entry(name).iter_mut() {
            let mut dangling = BTreeSet::new();
            let versions = item.locales.iter().map(|l| &l.payload);
            for value in std::iter::once(&item.payload).chain(versions) {
                let missing = references(value).into_iter().filter(|t| !is_live(t.as_str()));
                dangling.extend(missing);
            }
            if dangling.is_empty() {
                continue;
            }

            let source = item_path(name, key);
            for target in &dangling {
                notices.warn(&format!(
                    "{source} links to {target}, which does not exist. Dropping the link."
                ));
            }
            item.payload = prune_links(&item.payload, &is_live);
            for version in &mut item.locales {
                version.payload = prune_links(&version.payload, &is_live);
            }
        }
    }
    pruned
}

/// Plans one category of `source` against `target`.
///
/// Folder categories follow their contents; every other category is
/// compared item by item through content digests.
pub(crate) fn plan_category(
    category: &Category,
    source: &Snapshot,
    target: &Collection,
    config: &SyncConfig,
    comparator: &Comparator,
    notices: &Notices,
) -> SyncResult<MergePlan<Item>> {
    let local = source.get(&category.name);
    let filter = config.category_filter(category);

    Ok(match &category.kind {
        CategoryKind::Folders { contents } => plan_folders(
            local,
            target,
            source.get(contents).keys().map(String::as_str),
            filter,
            notices,
        ),
        CategoryKind::Flat | CategoryKind::Files => {
            let mut unchanged = BTreeSet::new();
            for (key, item) in local {
                let Some(existing) = target.get(key).filter(|_| filter.is_included(key)) else {
                    continue;
                };
                if digest(&category.name, item, comparator)?
                    == digest(&category.name, existing, comparator)?
                {
                    unchanged.insert(key.as_str());
                }
            }
            plan_filtered(
                local,
                target,
                filter,
                |a: &Item, _: &Item| unchanged.contains(a.key.as_str()),
                Some(notices),
            )
        }
    })
}

fn digest(category: &str, item: &Item, comparator: &Comparator) -> SyncResult<Fingerprint> {
    item.fingerprint(comparator)
        .map_err(|e| SyncError::from(e).for_item(category, item.key.as_str()))
}

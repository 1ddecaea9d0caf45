//! Pulling the remote store into a local snapshot.

use std::collections::BTreeMap;

use cairn_codec::Comparator;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::item::{Category, Collection, Item, LocaleVersion, Snapshot};
use crate::plan::UpdatePair;
use crate::processor::{TransferOps, TransferProcessor};
use crate::progress::{Notices, NullProgress, ProgressSink};
use crate::remote::{plan_category, RemoteSnapshot};
use crate::results::CategoryResults;
use crate::store::RemoteStore;

/// Persists pulled items on the local side.
pub trait SnapshotWriter {
    /// Writes `item` into `category`, replacing any item with its key.
    async fn write(&self, category: &str, item: &Item) -> SyncResult<()>;

    /// Deletes the item `key` of `category`.
    async fn delete(&self, category: &str, key: &str) -> SyncResult<()>;
}

/// A [`SnapshotWriter`] collecting into an in-memory [`Snapshot`].
#[derive(Debug, Default)]
pub struct SnapshotBuffer {
    snapshot: Mutex<Snapshot>,
}

impl SnapshotBuffer {
    /// A buffer starting from `snapshot`.
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    /// A copy of the current contents.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.lock().clone()
    }

    /// Consumes the buffer.
    pub fn into_inner(self) -> Snapshot {
        self.snapshot.into_inner()
    }
}

impl SnapshotWriter for SnapshotBuffer {
    async fn write(&self, category: &str, item: &Item) -> SyncResult<()> {
        self.snapshot
            .lock()
            .entry(category)
            .insert(item.key.clone(), item.clone());
        Ok(())
    }

    async fn delete(&self, category: &str, key: &str) -> SyncResult<()> {
        self.snapshot.lock().entry(category).remove(key);
        Ok(())
    }
}

struct WriterTransfer<'a, W> {
    writer: &'a W,
    category: &'a str,
}

impl<W: SnapshotWriter> TransferOps<Item> for WriterTransfer<'_, W> {
    async fn create(&self, _key: &str, item: &Item) -> SyncResult<()> {
        self.writer.write(self.category, item).await
    }

    async fn update(&self, _key: &str, pair: &UpdatePair<Item>) -> SyncResult<()> {
        self.writer.write(self.category, &pair.local).await
    }

    async fn remove(&self, key: &str, _item: &Item) -> SyncResult<()> {
        self.writer.delete(self.category, key).await
    }
}

/// Converges a local snapshot toward the remote store.
///
/// The remote side is the source: remote-only items are written locally
/// and local-only items are subject to the deletion strategy. Pulled
/// payloads carry links in local form and no volatile fields.
pub struct Pull<'a, S> {
    store: &'a S,
    config: &'a SyncConfig,
    progress: &'a dyn ProgressSink,
    notices: Notices,
}

impl<'a, S: RemoteStore> Pull<'a, S> {
    /// Creates a pull from `store`.
    pub fn new(store: &'a S, config: &'a SyncConfig) -> Self {
        Self {
            store,
            config,
            progress: &NullProgress,
            notices: Notices::tracing(config.verbose),
        }
    }

    /// Reports progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Pulls `categories` into `writer`, given the current `local` snapshot.
    ///
    /// Categories are independent: one failing does not stop the others.
    pub async fn run<W: SnapshotWriter>(
        &self,
        categories: &[Category],
        local: &Snapshot,
        writer: &W,
    ) -> SyncResult<CategoryResults> {
        self.config.validate()?;

        let comparator = self.config.comparator();
        let mut listed = RemoteSnapshot::list(self.store, categories).await;
        let mut source = Snapshot::new();
        let mut failed = BTreeMap::new();
        for category in categories {
            match listed.take(&category.name) {
                Ok(items) => source.insert(category.name.as_str(), strip(items, &comparator)),
                Err(err) => {
                    failed.insert(category.name.as_str(), err);
                }
            }
        }

        let mut results = CategoryResults::new();
        for category in categories {
            let name = category.name.as_str();
            if let Some(err) = failed.remove(name) {
                debug!(category = name, error = %err, "listing failed");
                results.push(category.label.as_str(), Err(err));
                continue;
            }

            let plan = match plan_category(
                category,
                &source,
                local.get(name),
                self.config,
                &comparator,
                &self.notices,
            ) {
                Ok(plan) => plan,
                Err(err) => {
                    results.push(category.label.as_str(), Err(err));
                    continue;
                }
            };
            self.progress.begin(&category.label, plan.len());
            let outcome = TransferProcessor::new(
                name,
                self.config.deletion_strategy,
                self.progress,
                &self.notices,
            )
            .with_concurrency(self.config.concurrency)
            .process(&plan, &WriterTransfer { writer, category: name })
            .await;
            results.push(category.label.as_str(), outcome);
        }

        info!(summary = %results.summary(), "pull complete");
        Ok(results)
    }
}

fn strip(items: Collection, comparator: &Comparator) -> Collection {
    items
        .into_iter()
        .map(|(key, item)| {
            let locales = item
                .locales
                .iter()
                .map(|version| LocaleVersion {
                    locale: version.locale.clone(),
                    payload: comparator.canonicalize(&version.payload),
                })
                .collect();
            let item = Item {
                payload: comparator.canonicalize(&item.payload),
                locales,
                ..item
            };
            (key, item)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeletionStrategy;
    use crate::store::fake::FakeStore;
    use crate::store::Draft;
    use cairn_codec::Value;

    #[tokio::test]
    async fn remote_items_replace_local_ones() {
        let store = FakeStore::default().with_item("pages", "Home");
        store
            .create(
                "pages",
                &Draft::new(
                    "About",
                    Value::object([
                        ("title", Value::from("About")),
                        ("updated_at", Value::from("2024-01-01")),
                    ]),
                ),
            )
            .await
            .unwrap();
        let local = Snapshot::new().with(
            "pages",
            [
                Item::new("Home", Value::object([("title", Value::from("Home")), ("draft", Value::from(true))])),
                Item::new("Gone", Value::object([("title", Value::from("Gone"))])),
            ],
        );
        let buffer = SnapshotBuffer::new(local.clone());

        let config = SyncConfig::new();
        let results = Pull::new(&store, &config)
            .run(&[Category::flat("pages", "Pages")], &local, &buffer)
            .await
            .unwrap();

        let pages = results.get("Pages").unwrap().as_ref().unwrap();
        assert_eq!(pages.created.iter().collect::<Vec<_>>(), vec!["About"]);
        assert_eq!(pages.updated.iter().collect::<Vec<_>>(), vec!["Home"]);
        assert_eq!(pages.removed.iter().collect::<Vec<_>>(), vec!["Gone"]);

        let pulled = buffer.into_inner();
        let pages = pulled.get("pages");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages["About"].payload.get("updated_at"), None);
        assert_eq!(pages["Home"].payload.get("draft"), None);
    }

    #[tokio::test]
    async fn ignore_keeps_local_only_items() {
        let store = FakeStore::default();
        let local = Snapshot::new().with("pages", [Item::new("Mine", Value::object([("title", Value::from("Mine"))]))]);
        let buffer = SnapshotBuffer::new(local.clone());

        let config = SyncConfig::new().with_deletion_strategy(DeletionStrategy::Ignore);
        let results = Pull::new(&store, &config)
            .run(&[Category::flat("pages", "Pages")], &local, &buffer)
            .await
            .unwrap();

        assert_eq!(results.summary().unmodified, 1);
        assert_eq!(buffer.snapshot().get("pages").len(), 1);
    }
}

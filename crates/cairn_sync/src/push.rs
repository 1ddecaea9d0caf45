//! Pushing a local snapshot into the remote store.

use std::sync::Arc;

use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::item::{Category, Item, Snapshot};
use crate::link::{item_path, references, resolve_links};
use crate::processor::TransferProcessor;
use crate::progress::{ItemReporter, Notices, Notifier, NullProgress, ProgressSink};
use crate::references::{MissedEntries, ReferenceTracker, SealedReferences};
use crate::remote::{plan_category, prune_dangling, RemoteSnapshot};
use crate::results::{PushResults, TransferResults};
use crate::retry::ConflictRetry;
use crate::store::{Draft, RemoteStore};
use crate::transfer::{write_draft, write_locales, LocaleRegistry, StoreTransfer};

/// Label the corrective pass is reported under.
pub const REFERENCES_LABEL: &str = "References";

/// Converges the remote store toward a local snapshot.
///
/// Categories are pushed strictly in the order given, since later ones may
/// link to earlier ones. Links that could not be resolved when their item
/// was written are fixed by one corrective pass at the end.
pub struct Push<'a, S> {
    store: &'a S,
    config: &'a SyncConfig,
    progress: &'a dyn ProgressSink,
    notices: Notices,
}

impl<'a, S: RemoteStore> Push<'a, S> {
    /// Creates a push into `store`.
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

    /// Sends operator warnings to `notifier`.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notices = Notices::new(notifier, self.config.verbose);
        self
    }

    /// Pushes `categories` of `snapshot`.
    ///
    /// A failure during the first pass aborts the push; items already
    /// written stay written. Failures of the corrective pass are collected
    /// under [`REFERENCES_LABEL`].
    pub async fn run(&self, categories: &[Category], snapshot: &Snapshot) -> SyncResult<PushResults> {
        let run_id = Uuid::new_v4();
        self.run_inner(categories, snapshot)
            .instrument(info_span!("push", %run_id))
            .await
    }

    async fn run_inner(&self, categories: &[Category], snapshot: &Snapshot) -> SyncResult<PushResults> {
        self.config.validate()?;
        snapshot.validate()?;

        let comparator = self.config.comparator();
        let mut remote = RemoteSnapshot::list(self.store, categories).await;
        remote.adopt_disambiguated(categories, snapshot);
        let live = remote.live_paths(categories, snapshot, self.config);
        let snapshot = &prune_dangling(snapshot, categories, &live, &self.notices);

        let tracker = ReferenceTracker::new();
        remote.seed(&tracker, &live);
        let locales = LocaleRegistry::new(self.config.default_locale.as_str());
        let mut results = PushResults::new();

        for category in categories {
            let name = category.name.as_str();
            let target = remote.take(name)?;
            let plan = plan_category(
                category,
                snapshot,
                &target,
                self.config,
                &comparator,
                &self.notices,
            )?;
            info!(category = name, plan = %plan.summary(self.config.deletion_strategy), "planned");

            self.progress.begin(&category.label, plan.len());
            let transfer = StoreTransfer::new(self.store, name, &tracker, &locales, &self.notices)
                .with_concurrency(self.config.concurrency);
            let outcome = TransferProcessor::new(
                name,
                self.config.deletion_strategy,
                self.progress,
                &self.notices,
            )
            .with_concurrency(self.config.concurrency)
            .process(&plan, &transfer)
            .await?;
            results.set(category.label.as_str(), outcome);
        }

        let mut sealed = tracker.seal();
        let entries = sealed.entries_with_missed_references();
        info!(
            missed = sealed.missed(),
            pending = entries.len(),
            "first pass complete"
        );
        self.progress.begin(REFERENCES_LABEL, entries.len());
        let corrective = CorrectivePass {
            store: self.store,
            references: &sealed,
            locales: &locales,
            notices: &self.notices,
            progress: self.progress,
            concurrency: self.config.concurrency,
        };
        results.set(REFERENCES_LABEL, corrective.run(entries).await);

        info!(summary = %results.summary(), "push complete");
        Ok(results)
    }
}

/// Rewrites items whose links missed during the first pass.
///
/// Runs once every item exists, so items are independent: each failure is
/// recorded and the pass moves on.
struct CorrectivePass<'a, S> {
    store: &'a S,
    references: &'a SealedReferences,
    locales: &'a LocaleRegistry,
    notices: &'a Notices,
    progress: &'a dyn ProgressSink,
    concurrency: usize,
}

impl<S: RemoteStore> CorrectivePass<'_, S> {
    async fn run(&self, entries: MissedEntries) -> TransferResults {
        let mut results = TransferResults::new();

        for (category, item) in entries {
            let path = item_path(&category, &item.key);
            let missing = self.still_missing(&item);
            if !missing.is_empty() {
                self.notices.warn(&format!(
                    "References of {path} to {} are still missing. Leaving it as written.",
                    missing.join(", ")
                ));
                self.progress.increment(1);
                results.unmodified.insert(path);
                continue;
            }

            let reporter = ItemReporter::start(self.progress, "resolving", &path);
            match self.rewrite(&category, &item).await {
                Ok(()) => {
                    reporter.finish("resolved");
                    results.updated.insert(path);
                }
                Err(err) => {
                    drop(reporter);
                    self.notices
                        .warn(&format!("Failed to resolve references of {path}: {err}"));
                    results
                        .errored
                        .insert(path, err.for_item(category.as_str(), item.key.as_str()));
                }
            }
        }
        results
    }

    /// Targets of `item` that no item was recorded for.
    fn still_missing(&self, item: &Item) -> Vec<String> {
        let mut missing: Vec<String> = std::iter::once(&item.payload)
            .chain(item.locales.iter().map(|version| &version.payload))
            .flat_map(references)
            .filter(|target| self.references.get(target).is_none())
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    async fn rewrite(&self, category: &str, item: &Item) -> SyncResult<()> {
        let id = item.require_id(category)?;
        let retry = ConflictRetry::new(category, self.notices);
        let draft = Draft::new(item.key.as_str(), resolve_links(&item.payload, self.references));

        let id = retry
            .update(id, &item.key, |target| {
                write_draft(self.store, category, target, &draft)
            })
            .await?;

        // Only locales that link anywhere can have missed.
        let linked = Item {
            locales: item
                .locales
                .iter()
                .filter(|version| !references(&version.payload).is_empty())
                .cloned()
                .collect(),
            ..item.clone()
        };
        write_locales(
            self.store,
            self.locales,
            retry,
            self.references,
            &id,
            &linked,
            self.concurrency,
        )
        .await
    }
}

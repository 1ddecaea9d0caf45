//! Executes a merge plan.
//!
//! Buckets run in a fixed order (skips, creates, updates, removals). Within
//! a bucket items are written concurrently, up to the configured width, and
//! the first unrecovered failure aborts the transfer.

use std::collections::BTreeSet;
use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::info;

use crate::config::DeletionStrategy;
use crate::error::SyncResult;
use crate::plan::{MergePlan, UpdatePair};
use crate::progress::{ItemReporter, Notices, ProgressSink};
use crate::results::TransferResults;

/// Per-item writes a transfer performs.
pub trait TransferOps<T> {
    /// Creates a source-only item.
    async fn create(&self, key: &str, item: &T) -> SyncResult<()>;

    /// Overwrites a differing item.
    async fn update(&self, key: &str, pair: &UpdatePair<T>) -> SyncResult<()>;

    /// Removes a target-only item.
    async fn remove(&self, key: &str, item: &T) -> SyncResult<()>;

    /// Whether a target-only item must survive the removal bucket because
    /// this transfer already wrote it under another key.
    fn retains(&self, _key: &str, _item: &T) -> bool {
        false
    }
}

/// Walks a [`MergePlan`] for one category.
pub struct TransferProcessor<'a> {
    category: &'a str,
    strategy: DeletionStrategy,
    concurrency: usize,
    progress: &'a dyn ProgressSink,
    notices: &'a Notices,
}

impl<'a> TransferProcessor<'a> {
    /// Creates a processor writing one item at a time.
    pub fn new(
        category: &'a str,
        strategy: DeletionStrategy,
        progress: &'a dyn ProgressSink,
        notices: &'a Notices,
    ) -> Self {
        Self {
            category,
            strategy,
            concurrency: 1,
            progress,
            notices,
        }
    }

    /// Sets how many writes of one bucket may be in flight.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Executes `plan` through `ops`.
    ///
    /// Every key of the plan advances progress by one, including skipped
    /// ones. A failed write is returned with the category and key attached.
    pub async fn process<T, O>(&self, plan: &MergePlan<T>, ops: &O) -> SyncResult<TransferResults>
    where
        O: TransferOps<T>,
    {
        let mut results = TransferResults::new();
        results.unmodified = self.handle_unmodified(plan);

        results.created = self
            .fan_out(plan.to_create.iter(), "creating", "created", |key, item| {
                ops.create(key, item)
            })
            .await?;

        results.updated = self
            .fan_out(plan.to_update.iter(), "updating", "updated", |key, pair| {
                ops.update(key, pair)
            })
            .await?;

        match self.strategy {
            DeletionStrategy::Delete => {
                let (kept, doomed): (Vec<_>, Vec<_>) = plan
                    .to_remove
                    .iter()
                    .partition(|&(key, item)| ops.retains(key, item));
                for (key, _) in &kept {
                    self.notices.warn(&format!(
                        "Not deleting {} item {key}; it was written during this run under another key.",
                        self.category
                    ));
                    results.unmodified.insert((*key).clone());
                }
                if !kept.is_empty() {
                    self.progress.increment(kept.len());
                }

                results.removed = self
                    .fan_out(doomed.into_iter(), "deleting", "deleted", |key, item| {
                        ops.remove(key, item)
                    })
                    .await?;
            }
            DeletionStrategy::Ignore | DeletionStrategy::Warn => {
                for key in plan.to_remove.keys() {
                    if self.strategy == DeletionStrategy::Warn {
                        self.notices.verbose(&format!(
                            "Not deleting {} item which exists only on the target: {key}",
                            self.category
                        ));
                    }
                    results.unmodified.insert(key.clone());
                }
                if !plan.to_remove.is_empty() {
                    self.progress.increment(plan.to_remove.len());
                }
            }
        }

        info!(
            category = self.category,
            created = results.created.len(),
            updated = results.updated.len(),
            removed = results.removed.len(),
            unmodified = results.unmodified.len(),
            "transfer complete"
        );
        Ok(results)
    }

    fn handle_unmodified<T>(&self, plan: &MergePlan<T>) -> BTreeSet<String> {
        let count = plan.to_skip.len();
        if count > 0 {
            if self.notices.is_verbose() {
                let noun = if count == 1 { "item" } else { "items" };
                self.progress
                    .update("skipping", &format!("{count} unmodified {noun}"));
            }
            self.progress.increment(count);
        }
        plan.to_skip.clone()
    }

    async fn fan_out<'i, V, I, F, Fut>(
        &self,
        items: I,
        action: &'static str,
        done: &'static str,
        op: F,
    ) -> SyncResult<BTreeSet<String>>
    where
        V: 'i,
        I: Iterator<Item = (&'i String, &'i V)>,
        F: Fn(&'i str, &'i V) -> Fut,
        Fut: Future<Output = SyncResult<()>>,
    {
        stream::iter(items)
            .map(|(key, value)| {
                let write = op(key.as_str(), value);
                async move {
                    let reporter = ItemReporter::start(self.progress, action, key);
                    match write.await {
                        Ok(()) => {
                            reporter.finish(done);
                            Ok(key.clone())
                        }
                        Err(err) => Err(err.for_item(self.category, key.as_str())),
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await
    }
}

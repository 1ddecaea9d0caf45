//! Dry runs of a push.

use tracing::info;

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::item::{Category, Snapshot};
use crate::plan::PlanSummary;
use crate::progress::Notices;
use crate::remote::{plan_category, prune_dangling, RemoteSnapshot};
use crate::store::RemoteStore;

/// Plans a push without writing anything.
pub struct Preview<'a, S> {
    store: &'a S,
    config: &'a SyncConfig,
    notices: Notices,
}

impl<'a, S: RemoteStore> Preview<'a, S> {
    /// Creates a preview against `store`.
    pub fn new(store: &'a S, config: &'a SyncConfig) -> Self {
        Self {
            store,
            config,
            notices: Notices::tracing(config.verbose),
        }
    }

    /// What a push of `categories` would do, per category label.
    ///
    /// A category that cannot be listed fails on its own.
    pub async fn run(
        &self,
        categories: &[Category],
        snapshot: &Snapshot,
    ) -> SyncResult<Vec<(String, SyncResult<PlanSummary>)>> {
        self.config.validate()?;
        snapshot.validate()?;

        let comparator = self.config.comparator();
        let mut remote = RemoteSnapshot::list(self.store, categories).await;
        remote.adopt_disambiguated(categories, snapshot);
        let live = remote.live_paths(categories, snapshot, self.config);
        let snapshot = &prune_dangling(snapshot, categories, &live, &self.notices);

        let summaries = categories
            .iter()
            .map(|category| {
                let summary = remote.take(&category.name).and_then(|target| {
                    plan_category(
                        category,
                        snapshot,
                        &target,
                        self.config,
                        &comparator,
                        &self.notices,
                    )
                    .map(|plan| plan.summary(self.config.deletion_strategy))
                });
                if let Ok(summary) = &summary {
                    info!(category = %category.name, %summary, "previewed");
                }
                (category.label.clone(), summary)
            })
            .collect();
        Ok(summaries)
    }
}

//! Removing everything from remote categories.

use tracing::info;

use crate::config::{DeletionStrategy, InclusionFilter, SyncConfig};
use crate::error::SyncResult;
use crate::hierarchy::PATH_DELIMITER;
use crate::item::{Category, Collection, Item};
use crate::plan::{plan_filtered, MergePlan};
use crate::processor::TransferProcessor;
use crate::progress::{Notices, NullProgress, ProgressSink};
use crate::references::ReferenceTracker;
use crate::results::{CategoryResults, TransferResults};
use crate::store::RemoteStore;
use crate::transfer::{LocaleRegistry, StoreTransfer};

/// Empties remote categories.
pub struct Clear<'a, S> {
    store: &'a S,
    config: &'a SyncConfig,
    progress: &'a dyn ProgressSink,
    notices: Notices,
}

impl<'a, S: RemoteStore> Clear<'a, S> {
    /// Creates a clear of `store`.
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

    /// Removes the items of `categories`, last category first.
    ///
    /// Unless `force` is set, items the category filter excludes are kept.
    /// Items nested below a path are left to the removal of their folder.
    pub async fn run(&self, categories: &[Category], force: bool) -> SyncResult<CategoryResults> {
        self.config.validate()?;

        let mut results = CategoryResults::new();
        for category in categories.iter().rev() {
            let outcome = self.clear(category, force).await;
            if let Ok(outcome) = &outcome {
                info!(category = %category.name, summary = %outcome.summary(), "cleared");
            }
            results.push(category.label.as_str(), outcome);
        }
        Ok(results)
    }

    async fn clear(&self, category: &Category, force: bool) -> SyncResult<TransferResults> {
        let name = category.name.as_str();
        let listed = self.store.list(name).await?;
        let plan = self.plan(category, &listed, force);

        self.progress.begin(&category.label, plan.len());
        let tracker = ReferenceTracker::new();
        let locales = LocaleRegistry::new(self.config.default_locale.as_str());
        let transfer = StoreTransfer::new(self.store, name, &tracker, &locales, &self.notices);
        TransferProcessor::new(name, DeletionStrategy::Delete, self.progress, &self.notices)
            .with_concurrency(self.config.concurrency)
            .process(&plan, &transfer)
            .await
    }

    fn plan(&self, category: &Category, listed: &Collection, force: bool) -> MergePlan<Item> {
        let outermost: Collection = listed
            .iter()
            .filter(|(key, _)| !category.is_nested() || !key.contains(PATH_DELIMITER))
            .map(|(key, item)| (key.clone(), item.clone()))
            .collect();

        let everything = InclusionFilter::All;
        let filter = if force {
            &everything
        } else {
            self.config.category_filter(category)
        };
        plan_filtered(&Collection::new(), &outermost, filter, |_, _| true, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fake::FakeStore;

    #[tokio::test]
    async fn clear_respects_filters_unless_forced() {
        let store = FakeStore::default()
            .with_item("pages", "Home")
            .with_item("pages", "About")
            .with_item("authors", "Ann");
        let config = SyncConfig::new().with_filter("pages", InclusionFilter::keys(["About"]));
        let categories = [Category::flat("authors", "Authors"), Category::flat("pages", "Pages")];

        let results = Clear::new(&store, &config).run(&categories, false).await.unwrap();

        let labels: Vec<_> = results.iter().map(|(label, _)| label).collect();
        assert_eq!(labels, vec!["Pages", "Authors"]);
        let pages = results.get("Pages").unwrap().as_ref().unwrap();
        assert_eq!(pages.removed.iter().collect::<Vec<_>>(), vec!["About"]);
        assert_eq!(pages.unmodified.iter().collect::<Vec<_>>(), vec!["Home"]);

        Clear::new(&store, &config).run(&categories, true).await.unwrap();
        assert!(store.list("pages").await.unwrap().is_empty());
        assert!(store.list("authors").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn nested_items_are_left_to_their_folder() {
        let store = FakeStore::default()
            .with_item("assets", "logo.png")
            .with_item("assets", "img/a.png");
        let config = SyncConfig::new();

        let results = Clear::new(&store, &config)
            .run(&[Category::files("assets", "Assets")], false)
            .await
            .unwrap();

        let assets = results.get("Assets").unwrap().as_ref().unwrap();
        assert_eq!(assets.removed.iter().collect::<Vec<_>>(), vec!["logo.png"]);
        assert_eq!(store.writes(), vec!["remove blt1"]);
    }
}

//! Writes of planned items into the remote store.

use std::collections::BTreeSet;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::item::{Item, ItemId};
use crate::link::{resolve_links, LinkResolver};
use crate::plan::UpdatePair;
use crate::processor::TransferOps;
use crate::progress::Notices;
use crate::references::ReferenceTracker;
use crate::retry::{ConflictRetry, WriteTarget};
use crate::store::{Draft, Locale, RemoteStore};

/// Locales known to the remote store during one run.
///
/// The store is listed on first use; locales missing from it are added
/// before anything is written in them.
#[derive(Debug)]
pub struct LocaleRegistry {
    fallback: String,
    known: Mutex<Option<BTreeSet<String>>>,
}

impl LocaleRegistry {
    /// A registry adding locales with `fallback` as their fallback locale.
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
            known: Mutex::new(None),
        }
    }

    /// Makes sure `code` exists remotely.
    pub async fn ensure<S: RemoteStore>(&self, store: &S, code: &str) -> SyncResult<()> {
        let mut guard = self.known.lock().await;
        let known = match guard.take() {
            Some(known) => guard.insert(known),
            None => {
                let listed = store.locales().await?;
                guard.insert(listed.into_iter().map(|locale| locale.code).collect())
            }
        };

        if known.contains(code) {
            return Ok(());
        }

        let locale = Locale::new(code, Some(self.fallback.clone()));
        debug!(code, name = %locale.name, "adding locale");
        store.add_locale(&locale).await?;
        known.insert(code.to_string());
        Ok(())
    }
}

/// Performs one write attempt of `draft`.
pub(crate) async fn write_draft<S: RemoteStore>(
    store: &S,
    category: &str,
    target: WriteTarget,
    draft: &Draft,
) -> SyncResult<ItemId> {
    let draft = if draft.title == target.title() {
        draft.clone()
    } else {
        draft.retitled(target.title())
    };
    match target {
        WriteTarget::Create { .. } => store.create(category, &draft).await,
        WriteTarget::Update { id, .. } => store.update(category, &id, &draft).await.map(|()| id),
    }
}

/// Writes every additional locale of `item` as an update of `id`.
///
/// Locales go out concurrently; each one exists remotely before it is
/// written.
pub(crate) async fn write_locales<S, R>(
    store: &S,
    registry: &LocaleRegistry,
    retry: ConflictRetry<'_>,
    resolver: &R,
    id: &ItemId,
    item: &Item,
    concurrency: usize,
) -> SyncResult<()>
where
    S: RemoteStore,
    R: LinkResolver + ?Sized,
{
    stream::iter(&item.locales)
        .map(|version| async move {
            registry.ensure(store, &version.locale).await?;
            let draft = Draft::new(item.key.as_str(), resolve_links(&version.payload, resolver))
                .in_locale(version.locale.as_str());
            retry
                .update(id, &item.key, |target| {
                    write_draft(store, retry.category(), target, &draft)
                })
                .await
                .map(drop)
        })
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await
}

/// [`TransferOps`] writing one category of a push into a remote store.
///
/// Every item written is remembered by identifier. A create may land on an
/// item the plan expected to remove, under a variant of its title; such an
/// item is retained instead.
pub struct StoreTransfer<'a, S> {
    store: &'a S,
    category: &'a str,
    tracker: &'a ReferenceTracker,
    locales: &'a LocaleRegistry,
    retry: ConflictRetry<'a>,
    concurrency: usize,
    written: parking_lot::Mutex<BTreeSet<ItemId>>,
}

impl<'a, S: RemoteStore> StoreTransfer<'a, S> {
    /// Writes into `category` of `store`, recording identifiers in `tracker`.
    pub fn new(
        store: &'a S,
        category: &'a str,
        tracker: &'a ReferenceTracker,
        locales: &'a LocaleRegistry,
        notices: &'a Notices,
    ) -> Self {
        Self {
            store,
            category,
            tracker,
            locales,
            retry: ConflictRetry::new(category, notices),
            concurrency: 1,
            written: parking_lot::Mutex::new(BTreeSet::new()),
        }
    }

    /// Sets how many locales of one item may be written at once.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    async fn write(&self, target: WriteTarget, draft: &Draft) -> SyncResult<ItemId> {
        write_draft(self.store, self.category, target, draft).await
    }

    /// Writes the locales of `item` and records it under `id`.
    async fn finish(&self, item: &Item, id: ItemId) -> SyncResult<()> {
        self.written.lock().insert(id.clone());
        let scope = self.tracker.scope(self.category, &item.key);
        write_locales(
            self.store,
            self.locales,
            self.retry,
            &scope,
            &id,
            item,
            self.concurrency,
        )
        .await?;
        self.tracker
            .record_created(self.category, &item.clone().with_id(id))
    }
}

impl<S: RemoteStore> TransferOps<Item> for StoreTransfer<'_, S> {
    async fn create(&self, key: &str, item: &Item) -> SyncResult<()> {
        let scope = self.tracker.scope(self.category, key);
        let draft = Draft::new(item.key.as_str(), resolve_links(&item.payload, &scope));

        let id = self
            .retry
            .execute(self.store, &item.key, |target| self.write(target, &draft))
            .await?;
        debug!(category = self.category, key, id = %id, "created");
        self.finish(item, id).await
    }

    async fn update(&self, key: &str, pair: &UpdatePair<Item>) -> SyncResult<()> {
        let id = pair.remote.require_id(self.category)?;
        let scope = self.tracker.scope(self.category, key);
        let draft = Draft::new(pair.local.key.as_str(), resolve_links(&pair.local.payload, &scope));

        let id = self
            .retry
            .update(id, &pair.local.key, |target| self.write(target, &draft))
            .await?;
        debug!(category = self.category, key, id = %id, "updated");
        self.finish(&pair.local, id).await
    }

    async fn remove(&self, key: &str, item: &Item) -> SyncResult<()> {
        let id = item.require_id(self.category)?;
        match self.store.remove(self.category, id).await {
            Ok(()) => debug!(category = self.category, key, id = %id, "removed"),
            // Removing a parent takes its descendants with it.
            Err(err) if matches!(err.root(), SyncError::NotFound { .. }) => {
                debug!(category = self.category, key, id = %id, "already removed")
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    fn retains(&self, _key: &str, item: &Item) -> bool {
        item.id.as_ref().is_some_and(|id| self.written.lock().contains(id))
    }
}

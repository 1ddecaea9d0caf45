//! Bounded recovery from write conflicts.
//!
//! The remote store reports collisions non-deterministically (a repeated
//! request may or may not collide depending on replication lag), so
//! conflicts are handled as expected events. Every path is bounded: a
//! create makes at most three writes, an update at most three.

use std::future::Future;

use tracing::debug;

use crate::error::{ConflictKind, SyncResult};
use crate::item::ItemId;
use crate::progress::Notices;
use crate::store::RemoteStore;

/// What a single write attempt should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTarget {
    /// Create a new item under `title`.
    Create {
        /// Title to create under.
        title: String,
    },
    /// Overwrite the item `id`, storing it under `title`.
    Update {
        /// Existing item.
        id: ItemId,
        /// Title to store.
        title: String,
    },
}

impl WriteTarget {
    /// The title this attempt writes.
    pub fn title(&self) -> &str {
        match self {
            WriteTarget::Create { title } | WriteTarget::Update { title, .. } => title,
        }
    }
}

/// The fallback identity for `title` in `category`.
pub fn disambiguated_title(title: &str, category: &str) -> String {
    format!("{title} ({category})")
}

/// Conflict recovery for writes into one category.
#[derive(Debug, Clone, Copy)]
pub struct ConflictRetry<'a> {
    category: &'a str,
    notices: &'a Notices,
}

impl<'a> ConflictRetry<'a> {
    /// Policy for writes into `category`.
    pub fn new(category: &'a str, notices: &'a Notices) -> Self {
        Self { category, notices }
    }

    /// Category the writes go to.
    pub fn category(&self) -> &'a str {
        self.category
    }

    /// The fallback identity for `title`, suffixed with the category.
    pub fn disambiguate(&self, title: &str) -> String {
        disambiguated_title(title, self.category)
    }

    /// Titles an existing item with this identity may be stored under.
    pub fn candidates(&self, title: &str) -> Vec<String> {
        let mut candidates = vec![title.to_string()];
        let trimmed = title.trim();
        if trimmed != title {
            candidates.push(trimmed.to_string());
        }
        candidates.push(self.disambiguate(title));
        candidates
    }

    /// Runs a create with conflict recovery.
    ///
    /// On a duplicate-identity conflict the existing item is looked up; if
    /// found, the create becomes an update of it, otherwise it is retried
    /// once under the disambiguated title. Other failures propagate as-is.
    pub async fn execute<S, F, Fut>(&self, store: &S, title: &str, op: F) -> SyncResult<ItemId>
    where
        S: RemoteStore,
        F: Fn(WriteTarget) -> Fut,
        Fut: Future<Output = SyncResult<ItemId>>,
    {
        let err = match op(WriteTarget::Create {
            title: title.to_string(),
        })
        .await
        {
            Ok(id) => return Ok(id),
            Err(err) => err,
        };

        if !matches!(
            err.conflict_kind(),
            Some(ConflictKind::TitleNotUnique | ConflictKind::AlreadyExists)
        ) {
            return Err(err);
        }
        debug!(category = self.category, title, error = %err, "create conflicted");

        if let Some(id) = self.find_existing(store, title).await? {
            self.notices.warn(&format!(
                "\"{title}\" already exists in {} as {id}. Updating it instead.",
                self.category
            ));
            return match op(WriteTarget::Update {
                id: id.clone(),
                title: title.to_string(),
            })
            .await
            {
                Err(err) if err.conflict_kind() == Some(ConflictKind::TitleNotUnique) => {
                    self.retitle(id, title, &op).await
                }
                other => other,
            };
        }

        let unique = self.disambiguate(title);
        self.notices.warn(&format!(
            "Title \"{title}\" conflicts globally. Creating with unique title \"{unique}\"."
        ));
        op(WriteTarget::Create { title: unique }).await
    }

    /// Runs an update of `id` with conflict recovery.
    ///
    /// A null-reference or already-exists failure is retried once as-is; a
    /// title collision falls back once to the disambiguated title.
    pub async fn update<F, Fut>(&self, id: &ItemId, title: &str, op: F) -> SyncResult<ItemId>
    where
        F: Fn(WriteTarget) -> Fut,
        Fut: Future<Output = SyncResult<ItemId>>,
    {
        let target = || WriteTarget::Update {
            id: id.clone(),
            title: title.to_string(),
        };

        let err = match op(target()).await {
            Ok(id) => return Ok(id),
            Err(err) => err,
        };

        let context = format!("Failed to update {} item [{id}] \"{title}\".", self.category);
        match err.conflict_kind() {
            Some(ConflictKind::TitleNotUnique) => self.retitle(id.clone(), title, &op).await,
            Some(kind @ (ConflictKind::NullReference | ConflictKind::AlreadyExists)) => {
                if kind == ConflictKind::AlreadyExists {
                    self.notices
                        .warn(&format!("{context} It already exists. Updating again."));
                }
                match op(target()).await {
                    Ok(id) => {
                        self.notices
                            .warn(&format!("{context} Resolved on second attempt."));
                        Ok(id)
                    }
                    Err(again) if again.conflict_kind() == Some(ConflictKind::TitleNotUnique) => {
                        self.retitle(id.clone(), title, &op).await
                    }
                    Err(again) => {
                        self.notices.warn(&format!(
                            "{context} Failed after second attempt: {err}; {again}"
                        ));
                        Err(again)
                    }
                }
            }
            None => Err(err),
        }
    }

    async fn retitle<F, Fut>(&self, id: ItemId, title: &str, op: &F) -> SyncResult<ItemId>
    where
        F: Fn(WriteTarget) -> Fut,
        Fut: Future<Output = SyncResult<ItemId>>,
    {
        let unique = self.disambiguate(title);
        self.notices.warn(&format!(
            "Title \"{title}\" conflicts in {}. Using unique title \"{unique}\" for {id}.",
            self.category
        ));
        op(WriteTarget::Update { id, title: unique }).await
    }

    async fn find_existing<S: RemoteStore>(&self, store: &S, title: &str) -> SyncResult<Option<ItemId>> {
        for candidate in self.candidates(title) {
            if let Some(id) = store.find_by_title(self.category, &candidate).await? {
                debug!(category = self.category, title, candidate = %candidate, id = %id, "found existing item");
                return Ok(Some(id));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::progress::Notifier;
    use crate::store::fake::FakeStore;
    use crate::store::Draft;
    use cairn_codec::Value;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Warnings(Mutex<Vec<String>>);

    impl Notifier for Warnings {
        fn warn(&self, message: &str) {
            self.0.lock().push(message.to_string());
        }
    }

    fn notices() -> (Arc<Warnings>, Notices) {
        let warnings = Arc::new(Warnings::default());
        let notices = Notices::new(warnings.clone(), false);
        (warnings, notices)
    }

    async fn write(store: &FakeStore, target: WriteTarget) -> SyncResult<ItemId> {
        let draft = Draft::new(target.title(), Value::object([("title", Value::from(target.title()))]));
        match target {
            WriteTarget::Create { .. } => store.create("pages", &draft).await,
            WriteTarget::Update { id, .. } => store.update("pages", &id, &draft).await.map(|()| id),
        }
    }

    #[tokio::test]
    async fn success_needs_one_attempt() {
        let store = FakeStore::default();
        let (warnings, notices) = notices();
        let retry = ConflictRetry::new("pages", &notices);

        let id = retry.execute(&store, "Home", |t| write(&store, t)).await.unwrap();

        assert_eq!(id.as_str(), "blt1");
        assert_eq!(store.writes(), vec!["create Home"]);
        assert!(warnings.0.lock().is_empty());
    }

    #[tokio::test]
    async fn conflict_with_existing_item_becomes_update() {
        let store = FakeStore::default().with_item("pages", "Home");
        let (warnings, notices) = notices();
        let retry = ConflictRetry::new("pages", &notices);

        let id = retry.execute(&store, "Home", |t| write(&store, t)).await.unwrap();

        assert_eq!(id.as_str(), "blt1");
        assert_eq!(store.writes(), vec!["create Home", "update blt1 Home master"]);
        assert_eq!(warnings.0.lock().len(), 1);
    }

    #[tokio::test]
    async fn previously_disambiguated_item_is_found() {
        let store = FakeStore::default().with_item("pages", "Home (pages)");
        store.fail_with(ConflictKind::TitleNotUnique);
        let (_, notices) = notices();
        let retry = ConflictRetry::new("pages", &notices);

        let id = retry.execute(&store, "Home", |t| write(&store, t)).await.unwrap();

        assert_eq!(id.as_str(), "blt1");
        assert_eq!(store.writes(), vec!["create Home", "update blt1 Home master"]);
    }

    #[tokio::test]
    async fn trimmed_title_is_found() {
        let store = FakeStore::default().with_item("pages", "Home");
        store.fail_with(ConflictKind::AlreadyExists);
        let (_, notices) = notices();
        let retry = ConflictRetry::new("pages", &notices);

        let id = retry.execute(&store, " Home ", |t| write(&store, t)).await.unwrap();
        assert_eq!(id.as_str(), "blt1");
    }

    #[tokio::test]
    async fn unresolvable_conflict_makes_exactly_two_attempts() {
        let store = FakeStore::default();
        store.fail_always(ConflictKind::TitleNotUnique, 10);
        let (warnings, notices) = notices();
        let retry = ConflictRetry::new("pages", &notices);

        let err = retry
            .execute(&store, "Home", |t| write(&store, t))
            .await
            .unwrap_err();

        assert_eq!(err.conflict_kind(), Some(ConflictKind::TitleNotUnique));
        assert_eq!(store.writes(), vec!["create Home", "create Home (pages)"]);
        let warnings = warnings.0.lock();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("\"Home\"") && warnings[0].contains("\"Home (pages)\""));
    }

    #[tokio::test]
    async fn conflicting_update_falls_back_to_unique_title() {
        let store = FakeStore::default().with_item("pages", "Home").with_item("other", "x");
        store.fail_with(ConflictKind::AlreadyExists);
        store.fail_with(ConflictKind::TitleNotUnique);
        let (_, notices) = notices();
        let retry = ConflictRetry::new("pages", &notices);

        let id = retry.execute(&store, "Home", |t| write(&store, t)).await.unwrap();

        assert_eq!(id.as_str(), "blt1");
        assert_eq!(
            store.writes(),
            vec!["create Home", "update blt1 Home master", "update blt1 Home (pages) master"]
        );
    }

    #[tokio::test]
    async fn other_failures_propagate_unchanged() {
        let store = FakeStore::default();
        let (_, notices) = notices();
        let retry = ConflictRetry::new("pages", &notices);

        let err = retry
            .execute(&store, "Home", |_| async {
                Err::<ItemId, _>(SyncError::transport_retryable("connection reset"))
            })
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn null_reference_update_is_retried_once() {
        let store = FakeStore::default().with_item("pages", "Home");
        store.fail_with(ConflictKind::NullReference);
        let (warnings, notices) = notices();
        let retry = ConflictRetry::new("pages", &notices);
        let id = ItemId::from("blt1");

        retry.update(&id, "Home", |t| write(&store, t)).await.unwrap();

        assert_eq!(store.writes().len(), 2);
        assert!(warnings.0.lock()[0].ends_with("Resolved on second attempt."));
    }

    #[tokio::test]
    async fn null_reference_twice_fails() {
        let store = FakeStore::default().with_item("pages", "Home");
        store.fail_always(ConflictKind::NullReference, 2);
        let (warnings, notices) = notices();
        let retry = ConflictRetry::new("pages", &notices);

        let err = retry
            .update(&ItemId::from("blt1"), "Home", |t| write(&store, t))
            .await
            .unwrap_err();

        assert_eq!(err.conflict_kind(), Some(ConflictKind::NullReference));
        assert_eq!(store.writes().len(), 2);
        assert!(warnings.0.lock()[0].contains("Failed after second attempt"));
    }

    #[tokio::test]
    async fn update_title_collision_uses_unique_title() {
        let store = FakeStore::default().with_item("pages", "Home").with_item("pages", "About");
        let (_, notices) = notices();
        let retry = ConflictRetry::new("pages", &notices);

        retry
            .update(&ItemId::from("blt2"), "Home", |t| write(&store, t))
            .await
            .unwrap();

        let item = store.item("pages", &ItemId::from("blt2")).unwrap();
        assert_eq!(item.key, "Home (pages)");
    }

    #[test]
    fn candidates() {
        let (_, notices) = notices();
        let retry = ConflictRetry::new("pages", &notices);
        assert_eq!(retry.candidates("Home"), vec!["Home", "Home (pages)"]);
        assert_eq!(retry.candidates("Home "), vec!["Home ", "Home", "Home  (pages)"]);
    }
}

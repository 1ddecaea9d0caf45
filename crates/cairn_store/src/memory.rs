//! In-memory remote store.

use std::collections::{BTreeMap, VecDeque};

use cairn_codec::Value;
use cairn_sync::{
    Collection, ConflictKind, Draft, Item, ItemId, Locale, LocaleVersion, RemoteStore, SyncError,
    SyncResult, CODE_ALREADY_EXISTS, CODE_INVALID_DATA,
};
use parking_lot::RwLock;
use tracing::debug;

use crate::config::StoreConfig;

/// One locale of a stored item.
#[derive(Debug, Clone)]
struct Version {
    title: String,
    payload: Value,
}

#[derive(Debug, Clone)]
struct Record {
    id: ItemId,
    master: Version,
    locales: BTreeMap<String, Version>,
}

impl Record {
    fn title_in(&self, locale: Option<&str>) -> Option<&str> {
        match locale {
            None => Some(self.master.title.as_str()),
            Some(code) => self.locales.get(code).map(|v| v.title.as_str()),
        }
    }

    fn to_item(&self) -> Item {
        Item {
            key: self.master.title.clone(),
            id: Some(self.id.clone()),
            payload: self.master.payload.clone(),
            locales: self
                .locales
                .iter()
                .map(|(code, version)| LocaleVersion {
                    locale: code.clone(),
                    payload: version.payload.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    categories: BTreeMap<String, BTreeMap<ItemId, Record>>,
    locales: Vec<Locale>,
    cascades: BTreeMap<String, String>,
    failures: BTreeMap<(String, String), VecDeque<SyncError>>,
    created: Vec<ItemId>,
    writes: Vec<String>,
    next_id: u64,
    lag: usize,
}

impl State {
    fn take_failure(&mut self, category: &str, title: &str) -> Option<SyncError> {
        let key = (category.to_string(), title.to_string());
        let queue = self.failures.get_mut(&key)?;
        let err = queue.pop_front();
        if queue.is_empty() {
            self.failures.remove(&key);
        }
        err
    }

    fn title_taken(
        &self,
        category: &str,
        locale: Option<&str>,
        title: &str,
        except: Option<&ItemId>,
        global: bool,
    ) -> bool {
        self.categories
            .iter()
            .filter(|(name, _)| *name == category || (global && locale.is_none()))
            .flat_map(|(_, records)| records.values())
            .any(|record| Some(&record.id) != except && record.title_in(locale) == Some(title))
    }

    fn record_mut(&mut self, category: &str, id: &ItemId) -> SyncResult<&mut Record> {
        self.categories
            .get_mut(category)
            .and_then(|records| records.get_mut(id))
            .ok_or_else(|| SyncError::NotFound {
                category: category.to_string(),
                key: id.to_string(),
            })
    }
}

fn not_unique(title: &str) -> SyncError {
    SyncError::from_store(
        CODE_INVALID_DATA,
        format!("Title \"{title}\" is not unique"),
        &ConflictKind::TitleNotUnique.details(),
    )
}

/// A remote store kept in memory.
///
/// Behaves like the content store the engine talks to: identifiers are
/// assigned on create, titles must be unique, and listings may trail
/// behind writes when replication lag is configured.
#[derive(Debug)]
pub struct MemoryStore {
    config: StoreConfig,
    state: RwLock<State>,
}

impl MemoryStore {
    /// Creates an empty store with default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates an empty store.
    pub fn with_config(config: StoreConfig) -> Self {
        let master = Locale::new(config.master_locale.as_str(), None);
        Self {
            config,
            state: RwLock::new(State {
                locales: vec![master],
                ..State::default()
            }),
        }
    }

    /// Removing a folder of `folders` also removes the items of `contents`
    /// below it.
    #[must_use]
    pub fn with_cascade(self, folders: impl Into<String>, contents: impl Into<String>) -> Self {
        self.state
            .write()
            .cascades
            .insert(folders.into(), contents.into());
        self
    }

    /// Stores `item` directly, bypassing title checks and the write log.
    ///
    /// Returns the identifier assigned.
    pub fn seed(&self, category: &str, item: &Item) -> ItemId {
        let mut state = self.state.write();
        let id = self.next_id(&mut state);
        let record = Record {
            id: id.clone(),
            master: Version {
                title: item.key.clone(),
                payload: item.payload.clone(),
            },
            locales: item
                .locales
                .iter()
                .map(|version| {
                    (
                        version.locale.clone(),
                        Version {
                            title: item.key.clone(),
                            payload: version.payload.clone(),
                        },
                    )
                })
                .collect(),
        };
        state
            .categories
            .entry(category.to_string())
            .or_default()
            .insert(id.clone(), record);
        id
    }

    /// Fails the next write of `title` in `category` with `error`.
    ///
    /// Queued failures are used one per write, in order.
    pub fn fail_next(&self, category: &str, title: &str, error: SyncError) {
        self.state
            .write()
            .failures
            .entry((category.to_string(), title.to_string()))
            .or_default()
            .push_back(error);
    }

    /// Hides the `n` most recently created items from listings.
    pub fn replication_lag(&self, n: usize) {
        self.state.write().lag = n;
    }

    /// Every request received so far.
    pub fn writes(&self) -> Vec<String> {
        self.state.read().writes.clone()
    }

    /// Forgets the requests received so far.
    pub fn clear_writes(&self) {
        self.state.write().writes.clear();
    }

    /// The item titled `title`, whether or not listings show it yet.
    pub fn item(&self, category: &str, title: &str) -> Option<Item> {
        self.state
            .read()
            .categories
            .get(category)?
            .values()
            .find(|record| record.master.title == title)
            .map(Record::to_item)
    }

    /// Number of items stored in `category`.
    pub fn len(&self, category: &str) -> usize {
        self.state
            .read()
            .categories
            .get(category)
            .map_or(0, BTreeMap::len)
    }

    /// Whether `category` holds no items.
    pub fn is_empty(&self, category: &str) -> bool {
        self.len(category) == 0
    }

    fn next_id(&self, state: &mut State) -> ItemId {
        state.next_id += 1;
        ItemId::new(format!("{}{}", self.config.id_prefix, state.next_id))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStore for MemoryStore {
    async fn list(&self, category: &str) -> SyncResult<Collection> {
        let state = self.state.read();
        let hidden = &state.created[state.created.len().saturating_sub(state.lag)..];
        let items: Collection = state
            .categories
            .get(category)
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter(|record| !hidden.contains(&record.id))
            .map(|record| (record.master.title.clone(), record.to_item()))
            .collect();
        debug!(category, items = items.len(), "list");
        Ok(items)
    }

    async fn create(&self, category: &str, draft: &Draft) -> SyncResult<ItemId> {
        let mut state = self.state.write();
        let locale = draft.locale.as_deref();
        state.writes.push(match locale {
            None => format!("create {category}/{}", draft.title),
            Some(code) => format!("create {category}/{} {code}", draft.title),
        });
        if let Some(err) = state.take_failure(category, &draft.title) {
            return Err(err);
        }

        if let Some(code) = locale {
            let localized = state.categories.get(category).is_some_and(|records| {
                records
                    .values()
                    .any(|r| r.master.title == draft.title && r.locales.contains_key(code))
            });
            if localized {
                return Err(SyncError::from_store(
                    CODE_ALREADY_EXISTS,
                    format!("\"{}\" already exists in {code}", draft.title),
                    &ConflictKind::AlreadyExists.details(),
                ));
            }
        }
        if state.title_taken(category, None, &draft.title, None, self.config.global_titles) {
            return Err(not_unique(&draft.title));
        }

        let id = self.next_id(&mut state);
        let version = Version {
            title: draft.title.clone(),
            payload: draft.payload.clone(),
        };
        let mut record = Record {
            id: id.clone(),
            master: version.clone(),
            locales: BTreeMap::new(),
        };
        if let Some(code) = locale {
            record.locales.insert(code.to_string(), version);
        }
        state
            .categories
            .entry(category.to_string())
            .or_default()
            .insert(id.clone(), record);
        state.created.push(id.clone());
        debug!(category, title = %draft.title, id = %id, "created");
        Ok(id)
    }

    async fn update(&self, category: &str, id: &ItemId, draft: &Draft) -> SyncResult<()> {
        let mut state = self.state.write();
        let locale = draft.locale.as_deref();
        state.writes.push(format!(
            "update {category}/{id} {} {}",
            draft.title,
            locale.unwrap_or(self.config.master_locale.as_str())
        ));
        if let Some(err) = state.take_failure(category, &draft.title) {
            return Err(err);
        }

        if let Some(code) = locale {
            if !state.locales.iter().any(|l| l.code == code) {
                return Err(SyncError::transport_fatal(format!(
                    "Locale {code} is not configured"
                )));
            }
        }
        state.record_mut(category, id)?;
        if state.title_taken(category, locale, &draft.title, Some(id), self.config.global_titles) {
            return Err(not_unique(&draft.title));
        }

        let version = Version {
            title: draft.title.clone(),
            payload: draft.payload.clone(),
        };
        let record = state.record_mut(category, id)?;
        match locale {
            None => record.master = version,
            Some(code) => {
                record.locales.insert(code.to_string(), version);
            }
        }
        debug!(category, id = %id, "updated");
        Ok(())
    }

    async fn remove(&self, category: &str, id: &ItemId) -> SyncResult<()> {
        let mut state = self.state.write();
        state.writes.push(format!("remove {category}/{id}"));

        let removed = state
            .categories
            .get_mut(category)
            .and_then(|records| records.remove(id))
            .ok_or_else(|| SyncError::NotFound {
                category: category.to_string(),
                key: id.to_string(),
            })?;

        if let Some(contents) = state.cascades.get(category).cloned() {
            let prefix = format!("{}/", removed.master.title);
            for name in [category.to_string(), contents] {
                if let Some(records) = state.categories.get_mut(&name) {
                    records.retain(|_, record| !record.master.title.starts_with(&prefix));
                }
            }
        }
        debug!(category, id = %id, "removed");
        Ok(())
    }

    async fn locales(&self) -> SyncResult<Vec<Locale>> {
        Ok(self.state.read().locales.clone())
    }

    async fn add_locale(&self, locale: &Locale) -> SyncResult<()> {
        let mut state = self.state.write();
        state.writes.push(format!("locale {}", locale.code));
        if state.locales.iter().any(|l| l.code == locale.code) {
            return Err(SyncError::from_store(
                CODE_ALREADY_EXISTS,
                format!("Locale {} already exists", locale.code),
                &ConflictKind::AlreadyExists.details(),
            ));
        }
        state.locales.push(locale.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> Draft {
        Draft::new(title, Value::object([("title", Value::from(title))]))
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let store = MemoryStore::new();

        let a = store.create("pages", &draft("Home")).await.unwrap();
        let b = store.create("pages", &draft("About")).await.unwrap();

        assert_eq!(a.as_str(), "blt1");
        assert_eq!(b.as_str(), "blt2");
        assert_eq!(store.list("pages").await.unwrap().len(), 2);
        assert_eq!(store.writes(), vec!["create pages/Home", "create pages/About"]);
    }

    #[tokio::test]
    async fn duplicate_title_is_not_unique() {
        let store = MemoryStore::new();
        store.create("pages", &draft("Home")).await.unwrap();

        let err = store.create("pages", &draft("Home")).await.unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::TitleNotUnique));

        // Other categories are independent unless titles are global.
        store.create("authors", &draft("Home")).await.unwrap();
    }

    #[tokio::test]
    async fn global_titles_span_categories() {
        let store = MemoryStore::with_config(StoreConfig::new().with_global_titles(true));
        store.create("pages", &draft("Home")).await.unwrap();

        let err = store.create("authors", &draft("Home")).await.unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::TitleNotUnique));
    }

    #[tokio::test]
    async fn rename_onto_taken_title_is_not_unique() {
        let store = MemoryStore::new();
        store.create("pages", &draft("Home")).await.unwrap();
        let about = store.create("pages", &draft("About")).await.unwrap();

        let err = store.update("pages", &about, &draft("Home")).await.unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::TitleNotUnique));
        store.update("pages", &about, &draft("About")).await.unwrap();
    }

    #[tokio::test]
    async fn localized_create_of_existing_locale_already_exists() {
        let store = MemoryStore::new();
        store
            .add_locale(&Locale::new("fr-fr", Some("en-us".into())))
            .await
            .unwrap();
        store.create("pages", &draft("Home").in_locale("fr-fr")).await.unwrap();

        let err = store
            .create("pages", &draft("Home").in_locale("fr-fr"))
            .await
            .unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::AlreadyExists));
    }

    #[tokio::test]
    async fn locale_updates_need_a_configured_locale() {
        let store = MemoryStore::new();
        let id = store.create("pages", &draft("Home")).await.unwrap();

        let err = store
            .update("pages", &id, &draft("Home").in_locale("de-de"))
            .await
            .unwrap_err();
        assert!(!err.is_conflict());

        store.add_locale(&Locale::new("de-de", None)).await.unwrap();
        store
            .update("pages", &id, &draft("Home").in_locale("de-de"))
            .await
            .unwrap();
        assert_eq!(store.item("pages", "Home").unwrap().locales.len(), 1);

        let err = store.add_locale(&Locale::new("de-de", None)).await.unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::AlreadyExists));
    }

    #[tokio::test]
    async fn injected_failures_are_used_once() {
        let store = MemoryStore::new();
        store.fail_next(
            "pages",
            "Home",
            SyncError::conflict(ConflictKind::NullReference, "glitch"),
        );

        let err = store.create("pages", &draft("Home")).await.unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::NullReference));
        store.create("pages", &draft("Home")).await.unwrap();
        assert_eq!(store.writes().len(), 2);
    }

    #[tokio::test]
    async fn lagging_listing_hides_recent_items() {
        let store = MemoryStore::new();
        store.create("pages", &draft("Home")).await.unwrap();
        store.create("pages", &draft("About")).await.unwrap();
        store.replication_lag(1);

        let listed = store.list("pages").await.unwrap();
        assert_eq!(listed.keys().collect::<Vec<_>>(), vec!["Home"]);
        assert!(store.item("pages", "About").is_some());
        assert_eq!(store.find_by_title("pages", "About").await.unwrap(), None);
    }

    #[tokio::test]
    async fn folder_removal_cascades() {
        let store = MemoryStore::new().with_cascade("folders", "assets");
        let img = store.create("folders", &draft("img")).await.unwrap();
        store.create("folders", &draft("img/icons")).await.unwrap();
        store.create("assets", &draft("img/a.png")).await.unwrap();
        store.create("assets", &draft("logo.png")).await.unwrap();

        store.remove("folders", &img).await.unwrap();

        assert!(store.is_empty("folders"));
        assert_eq!(store.len("assets"), 1);
        assert!(store.item("assets", "logo.png").is_some());
    }

    #[tokio::test]
    async fn missing_items_are_not_found() {
        let store = MemoryStore::new();
        let err = store.remove("pages", &ItemId::from("blt9")).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
    }
}

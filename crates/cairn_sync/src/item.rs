//! Items, snapshots and content categories.

use std::collections::BTreeMap;
use std::fmt;

use cairn_codec::{CodecResult, Comparator, Fingerprint, Value};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Identifier assigned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wraps a store identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One additional locale variant of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleVersion {
    /// Locale code, e.g. `fr-fr`.
    pub locale: String,
    /// Payload in that locale.
    pub payload: Value,
}

/// A logical entity on either side of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Logical identity; the title entries are written under, or the path
    /// of an asset or folder.
    pub key: String,
    /// Store identifier, absent on local-only items.
    pub id: Option<ItemId>,
    /// Payload in the store's master locale.
    pub payload: Value,
    /// Additional locale variants, written after the master payload.
    pub locales: Vec<LocaleVersion>,
}

impl Item {
    /// Creates a local item.
    pub fn new(key: impl Into<String>, payload: Value) -> Self {
        Self {
            key: key.into(),
            id: None,
            payload,
            locales: Vec::new(),
        }
    }

    /// Sets the store identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ItemId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds a locale variant, replacing an existing one for the same locale.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>, payload: Value) -> Self {
        let locale = locale.into();
        self.locales.retain(|l| l.locale != locale);
        self.locales.push(LocaleVersion { locale, payload });
        self.locales.sort_by(|a, b| a.locale.cmp(&b.locale));
        self
    }

    /// The store identifier, or a not-found error naming the item.
    pub fn require_id(&self, category: &str) -> SyncResult<&ItemId> {
        self.id.as_ref().ok_or_else(|| SyncError::NotFound {
            category: category.to_string(),
            key: self.key.clone(),
        })
    }

    /// Checks the shape the engine relies on.
    pub fn validate(&self) -> SyncResult<()> {
        if self.key.trim().is_empty() {
            return Err(SyncError::validation("item has an empty key"));
        }
        if self.payload.as_map().is_none() {
            return Err(SyncError::validation(format!(
                "{}: payload must be a map",
                self.key
            )));
        }
        if let Some(l) = self.locales.iter().find(|l| l.payload.as_map().is_none()) {
            return Err(SyncError::validation(format!(
                "{}: {} payload must be a map",
                self.key, l.locale
            )));
        }
        Ok(())
    }

    /// Canonical equality of payloads and locale variants.
    ///
    /// Keys and identifiers are not compared.
    pub fn canonically_equal(&self, other: &Item, cmp: &Comparator) -> bool {
        cmp.equal(&self.payload, &other.payload)
            && self.locales.len() == other.locales.len()
            && self.locales.iter().all(|mine| {
                other
                    .locales
                    .iter()
                    .find(|theirs| theirs.locale == mine.locale)
                    .is_some_and(|theirs| cmp.equal(&mine.payload, &theirs.payload))
            })
    }
    /// Digest of the payload and every locale variant.
    ///
    /// Items with equal digests are canonically equal.
    pub fn fingerprint(&self, cmp: &Comparator) -> CodecResult<Fingerprint> {
        let locales = Value::object(
            self.locales
                .iter()
                .map(|l| (l.locale.clone(), l.payload.clone())),
        );
        cmp.fingerprint(&Value::object([
            ("payload", self.payload.clone()),
            ("locales", locales),
        ]))
    }
}

/// Items of one category keyed by logical key.
pub type Collection<T = Item> = BTreeMap<String, T>;

/// Builds a collection keyed by each item's key.
pub fn collection(items: impl IntoIterator<Item = Item>) -> Collection {
    items.into_iter().map(|item| (item.key.clone(), item)).collect()
}

/// How a category's items relate to each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryKind {
    /// Independent items.
    Flat,
    /// Path-keyed items nested inside folders; removing a folder removes them.
    Files,
    /// Folders whose inclusion follows the items below them.
    Folders {
        /// Category holding the files that live in these folders.
        contents: String,
    },
}

/// A content category, processed as one unit of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Name used by the remote store, filters and reference paths.
    pub name: String,
    /// Human readable label used for progress and results.
    pub label: String,
    /// Planning behavior.
    pub kind: CategoryKind,
}

impl Category {
    /// A category of independent items.
    pub fn flat(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind: CategoryKind::Flat,
        }
    }

    /// A category of path-keyed files.
    pub fn files(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind: CategoryKind::Files,
        }
    }

    /// A folder category containing the files of `contents`.
    pub fn folders(
        name: impl Into<String>,
        label: impl Into<String>,
        contents: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind: CategoryKind::Folders {
                contents: contents.into(),
            },
        }
    }

    /// Whether items of this category nest under a parent path.
    pub fn is_nested(&self) -> bool {
        !matches!(self.kind, CategoryKind::Flat)
    }
}

/// Every category's items on one side of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    categories: BTreeMap<String, Collection>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a category, replacing any existing one.
    #[must_use]
    pub fn with(mut self, category: impl Into<String>, items: impl IntoIterator<Item = Item>) -> Self {
        self.insert(category, collection(items));
        self
    }

    /// Sets the items of a category.
    pub fn insert(&mut self, category: impl Into<String>, items: Collection) {
        self.categories.insert(category.into(), items);
    }

    /// Items of `category`; empty when the category is absent.
    pub fn get(&self, category: &str) -> &Collection {
        static EMPTY: Collection = Collection::new();
        self.categories.get(category).unwrap_or(&EMPTY)
    }

    /// Mutable access to a category, created on demand.
    pub fn entry(&mut self, category: &str) -> &mut Collection {
        self.categories.entry(category.to_string()).or_default()
    }

    /// Category names present in this snapshot.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Total number of items.
    pub fn len(&self) -> usize {
        self.categories.values().map(BTreeMap::len).sum()
    }

    /// Whether no category holds any item.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks every item's shape.
    pub fn validate(&self) -> SyncResult<()> {
        for (category, items) in &self.categories {
            for (key, item) in items {
                if *key != item.key {
                    return Err(SyncError::validation(format!(
                        "{category}: item {:?} is stored under key {key:?}",
                        item.key
                    )));
                }
                item.validate()
                    .map_err(|e| e.for_item(category.as_str(), key.as_str()))?;
            }
        }
        Ok(())
    }
}

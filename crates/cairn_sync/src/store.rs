//! The remote store capability the engine writes through.

use cairn_codec::Value;
use serde::{Deserialize, Serialize};

use crate::error::SyncResult;
use crate::item::{Collection, ItemId};

/// A write request for one item in one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    /// Title the item is stored under.
    pub title: String,
    /// Payload with references in remote form.
    pub payload: Value,
    /// Target locale, `None` for the master locale.
    pub locale: Option<String>,
}

impl Draft {
    /// A master-locale draft.
    pub fn new(title: impl Into<String>, payload: Value) -> Self {
        Self {
            title: title.into(),
            payload,
            locale: None,
        }
    }

    /// Targets `locale` instead of the master locale.
    #[must_use]
    pub fn in_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// The same draft under another title.
    ///
    /// A `title` field in the payload follows the new title.
    #[must_use]
    pub fn retitled(&self, title: &str) -> Self {
        let payload = if self.payload.get("title").is_some() {
            self.payload.with_field("title", Value::from(title))
        } else {
            self.payload.clone()
        };
        Self {
            title: title.to_string(),
            payload,
            locale: self.locale.clone(),
        }
    }
}

/// A locale known to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    /// Locale code, e.g. `fr-fr`.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Locale to fall back to for missing content.
    pub fallback: Option<String>,
}

impl Locale {
    /// A locale with a display name derived from its code.
    pub fn new(code: impl Into<String>, fallback: Option<String>) -> Self {
        let code = code.into();
        let name = display_name(&code);
        Self {
            code,
            name,
            fallback,
        }
    }
}

/// Display name for a locale code.
///
/// Codes without a known name are shown upper-cased.
pub fn display_name(code: &str) -> String {
    let known = match code.to_ascii_lowercase().as_str() {
        "en-us" => Some("English - United States"),
        "zh-cn" => Some("Chinese - China"),
        "zh-chs" | "zh-hans" => Some("Chinese (simplified)"),
        "zh-cht" | "zh-hant" => Some("Chinese (traditional)"),
        "zh-tw" => Some("Chinese - Taiwan"),
        _ => None,
    };
    known.map_or_else(|| code.to_uppercase(), str::to_string)
}

/// Network access to the remote store.
///
/// Every call may suspend; the engine drives them from a single logical
/// thread, so the futures need not be `Send`.
pub trait RemoteStore {
    /// Every item of `category`, keyed by title, with references in remote
    /// form.
    async fn list(&self, category: &str) -> SyncResult<Collection>;

    /// Creates an item and returns its identifier.
    async fn create(&self, category: &str, draft: &Draft) -> SyncResult<ItemId>;

    /// Overwrites one locale of an existing item.
    async fn update(&self, category: &str, id: &ItemId, draft: &Draft) -> SyncResult<()>;

    /// Removes an item.
    async fn remove(&self, category: &str, id: &ItemId) -> SyncResult<()>;

    /// The identifier of the item titled `title`, if any.
    async fn find_by_title(&self, category: &str, title: &str) -> SyncResult<Option<ItemId>> {
        let items = self.list(category).await?;
        Ok(items.get(title).and_then(|item| item.id.clone()))
    }

    /// Locales configured in the store.
    async fn locales(&self) -> SyncResult<Vec<Locale>>;

    /// Adds a locale.
    async fn add_locale(&self, locale: &Locale) -> SyncResult<()>;
}

//! Configuration for reconciliation runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use cairn_codec::{Comparator, DEFAULT_VOLATILE_FIELDS};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::item::{Category, CategoryKind};

/// What to do with items that exist only on the target side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionStrategy {
    /// Remove them.
    #[default]
    Delete,
    /// Leave them in place without comment.
    Ignore,
    /// Leave them in place and warn about each one.
    Warn,
}

impl DeletionStrategy {
    /// Name used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            DeletionStrategy::Delete => "delete",
            DeletionStrategy::Ignore => "ignore",
            DeletionStrategy::Warn => "warn",
        }
    }
}

impl fmt::Display for DeletionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeletionStrategy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delete" => Ok(DeletionStrategy::Delete),
            "ignore" => Ok(DeletionStrategy::Ignore),
            "warn" => Ok(DeletionStrategy::Warn),
            other => Err(SyncError::Config(format!(
                "unknown deletion strategy {other:?}, expected delete, ignore or warn"
            ))),
        }
    }
}

/// Decides which keys of a category take part in a run.
#[derive(Clone, Default)]
pub enum InclusionFilter {
    /// Every key.
    #[default]
    All,
    /// Keys equal to one of the prefixes or nested below one (`prefix/...`).
    Prefixes(Vec<String>),
    /// Exactly these keys.
    Keys(BTreeSet<String>),
    /// An arbitrary predicate.
    Custom(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl InclusionFilter {
    /// Filter matching keys at or below any of `prefixes`.
    pub fn prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Prefixes(
            prefixes
                .into_iter()
                .map(|p| p.into().trim_end_matches('/').to_string())
                .collect(),
        )
    }

    /// Filter matching exactly `keys`.
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Keys(keys.into_iter().map(Into::into).collect())
    }

    /// Filter backed by a predicate.
    pub fn custom(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(predicate))
    }

    /// Whether `key` is included.
    pub fn is_included(&self, key: &str) -> bool {
        match self {
            InclusionFilter::All => true,
            InclusionFilter::Prefixes(prefixes) => prefixes.iter().any(|p| {
                key == p
                    || (key.len() > p.len() && key.starts_with(p.as_str()) && key.as_bytes()[p.len()] == b'/')
            }),
            InclusionFilter::Keys(keys) => keys.contains(key),
            InclusionFilter::Custom(predicate) => predicate(key),
        }
    }
}

impl fmt::Debug for InclusionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InclusionFilter::All => f.write_str("All"),
            InclusionFilter::Prefixes(p) => f.debug_tuple("Prefixes").field(p).finish(),
            InclusionFilter::Keys(k) => f.debug_tuple("Keys").field(k).finish(),
            InclusionFilter::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

static INCLUDE_ALL: InclusionFilter = InclusionFilter::All;

/// Configuration for one reconciliation run.
///
/// Built by the host and passed explicitly to every operation; nothing is
/// read from process-wide state.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Policy for target-only items.
    pub deletion_strategy: DeletionStrategy,
    /// Emit warnings that only matter when inspecting a run closely.
    pub verbose: bool,
    /// Maximum concurrent writes within one category.
    pub concurrency: usize,
    /// Fallback locale for locales registered during a push.
    pub default_locale: String,
    /// Per-category inclusion filters. Missing categories include everything.
    pub filters: BTreeMap<String, InclusionFilter>,
    /// Fields ignored by canonical comparison.
    pub volatile_fields: Vec<String>,
}

impl SyncConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self {
            deletion_strategy: DeletionStrategy::default(),
            verbose: false,
            concurrency: 8,
            default_locale: "en-us".to_string(),
            filters: BTreeMap::new(),
            volatile_fields: DEFAULT_VOLATILE_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Sets the deletion strategy.
    pub fn with_deletion_strategy(mut self, strategy: DeletionStrategy) -> Self {
        self.deletion_strategy = strategy;
        self
    }

    /// Enables or disables verbose warnings.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sets the per-category fan-out width. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the fallback locale.
    pub fn with_default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    /// Sets the inclusion filter for a category.
    pub fn with_filter(mut self, category: impl Into<String>, filter: InclusionFilter) -> Self {
        self.filters.insert(category.into(), filter);
        self
    }

    /// Replaces the fields ignored by comparison.
    pub fn with_volatile_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.volatile_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// The inclusion filter for `category`.
    pub fn filter(&self, category: &str) -> &InclusionFilter {
        self.filters.get(category).unwrap_or(&INCLUDE_ALL)
    }

    /// The filter that governs `category`.
    ///
    /// Folders are selected by the files they contain, so a folder
    /// category answers to its contents' filter.
    pub fn category_filter(&self, category: &Category) -> &InclusionFilter {
        match &category.kind {
            CategoryKind::Folders { contents } => self.filter(contents),
            CategoryKind::Flat | CategoryKind::Files => self.filter(&category.name),
        }
    }

    /// The comparator for this run.
    pub fn comparator(&self) -> Comparator {
        Comparator::with_volatile_fields(self.volatile_fields.iter().cloned())
    }

    /// Rejects settings no run can work with.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.concurrency == 0 {
            return Err(SyncError::Config("concurrency must be at least 1".into()));
        }
        if self.default_locale.trim().is_empty() {
            return Err(SyncError::Config("default locale must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

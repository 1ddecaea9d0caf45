//! Test fixtures.
//!
//! Builders for the items and categories tests keep reaching for, and
//! sinks that record what the engine reported.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cairn_codec::Value;
use cairn_sync::{link, Category, Item, Notices, Notifier, ProgressSink};
use parking_lot::Mutex;

/// An entry titled `title` with a `body` field.
pub fn page(title: &str, body: &str) -> Item {
    Item::new(
        title,
        Value::object([("title", Value::from(title)), ("body", Value::from(body))]),
    )
}

/// An entry linking to `targets` through a `related` list.
pub fn page_linking(title: &str, targets: &[&str]) -> Item {
    Item::new(
        title,
        Value::object([
            ("title", Value::from(title)),
            (
                "related",
                Value::Array(targets.iter().map(|target| link(*target)).collect()),
            ),
        ]),
    )
}

/// An asset stored at `path`.
pub fn asset(path: &str, size: i64) -> Item {
    Item::new(
        path,
        Value::object([("path", Value::from(path)), ("size", Value::from(size))]),
    )
}

/// A folder at `path`.
pub fn folder(path: &str) -> Item {
    Item::new(path, Value::object([("path", Value::from(path))]))
}

/// Folders, assets, authors and pages, in push order.
pub fn standard_categories() -> Vec<Category> {
    vec![
        Category::folders("folders", "Folders", "assets"),
        Category::files("assets", "Assets"),
        Category::flat("authors", "Authors"),
        Category::flat("pages", "Pages"),
    ]
}

/// A [`ProgressSink`] remembering everything it was told.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    phases: Mutex<Vec<(String, usize)>>,
    updates: Mutex<Vec<(String, String)>>,
    steps: AtomicUsize,
}

impl RecordingProgress {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Phases begun, with their totals.
    pub fn phases(&self) -> Vec<(String, usize)> {
        self.phases.lock().clone()
    }

    /// `(action, key)` updates, in order.
    pub fn updates(&self) -> Vec<(String, String)> {
        self.updates.lock().clone()
    }

    /// Total steps reported.
    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }

    /// Sum of the totals announced by every phase.
    pub fn expected_steps(&self) -> usize {
        self.phases.lock().iter().map(|(_, total)| total).sum()
    }
}

impl ProgressSink for RecordingProgress {
    fn begin(&self, label: &str, total: usize) {
        self.phases.lock().push((label.to_string(), total));
    }

    fn increment(&self, n: usize) {
        self.steps.fetch_add(n, Ordering::SeqCst);
    }

    fn update(&self, action: &str, key: &str) {
        self.updates
            .lock()
            .push((action.to_string(), key.to_string()));
    }
}

/// A [`Notifier`] collecting warnings.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    warnings: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    /// Creates a shared recorder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Warnings received, in order.
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }

    /// Warnings containing `needle`.
    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.warnings
            .lock()
            .iter()
            .filter(|warning| warning.contains(needle))
            .cloned()
            .collect()
    }

    /// Notices reporting to this recorder.
    pub fn notices(self: &Arc<Self>, verbose: bool) -> Notices {
        Notices::new(self.clone(), verbose)
    }
}

impl Notifier for RecordingNotifier {
    fn warn(&self, message: &str) {
        self.warnings.lock().push(message.to_string());
    }
}

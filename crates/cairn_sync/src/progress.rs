//! Progress reporting and operator notices.
//!
//! Both are observability only: nothing here affects control flow.

use std::sync::Arc;

/// Receives progress of a transfer.
pub trait ProgressSink: Send + Sync {
    /// A new phase with `total` steps starts.
    fn begin(&self, _label: &str, _total: usize) {}

    /// `n` more steps finished.
    fn increment(&self, n: usize);

    /// The item currently being worked on.
    fn update(&self, action: &str, key: &str);
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn increment(&self, _n: usize) {}

    fn update(&self, _action: &str, _key: &str) {}
}

/// Reports one item for as long as it is alive.
///
/// Announces the item on creation and advances progress by one when
/// dropped, whether the operation succeeded, failed or was cancelled.
pub struct ItemReporter<'a> {
    sink: &'a dyn ProgressSink,
    key: &'a str,
    finished: Option<&'static str>,
}

impl<'a> ItemReporter<'a> {
    /// Announces `action` on `key`.
    pub fn start(sink: &'a dyn ProgressSink, action: &str, key: &'a str) -> Self {
        sink.update(action, key);
        Self {
            sink,
            key,
            finished: None,
        }
    }

    /// Records the outcome shown when the reporter is released.
    pub fn finish(mut self, outcome: &'static str) {
        self.finished = Some(outcome);
    }
}

impl Drop for ItemReporter<'_> {
    fn drop(&mut self) {
        if let Some(outcome) = self.finished {
            self.sink.update(outcome, self.key);
        }
        self.sink.increment(1);
    }
}

/// Receives operator-facing warnings.
pub trait Notifier: Send + Sync {
    /// Emits a warning.
    fn warn(&self, message: &str);
}

/// Forwards warnings to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

/// A notifier plus the verbosity flag of the run.
#[derive(Clone)]
pub struct Notices {
    notifier: Arc<dyn Notifier>,
    verbose: bool,
}

impl Notices {
    /// Wraps `notifier`.
    pub fn new(notifier: Arc<dyn Notifier>, verbose: bool) -> Self {
        Self { notifier, verbose }
    }

    /// Notices sent to `tracing`.
    pub fn tracing(verbose: bool) -> Self {
        Self::new(Arc::new(TracingNotifier), verbose)
    }

    /// Whether verbose warnings are emitted.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Emits a warning unconditionally.
    pub fn warn(&self, message: &str) {
        self.notifier.warn(message);
    }

    /// Emits a warning only in verbose runs.
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            self.notifier.warn(message);
        }
    }
}

impl std::fmt::Debug for Notices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notices")
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl Default for Notices {
    fn default() -> Self {
        Self::tracing(false)
    }
}

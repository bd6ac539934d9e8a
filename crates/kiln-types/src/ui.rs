//! UI sink for build progress.
//!
//! Steps report progress through a [`Ui`]. The sink is write-only: nothing
//! a step writes here influences the outcome of a build.

use std::sync::Arc;

use parking_lot::Mutex;

/// Shared reference to a UI sink.
pub type SharedUi = Arc<dyn Ui>;

/// Progress/output reporting for a build.
pub trait Ui: Send + Sync {
    /// Report a top-level progress line (e.g. "Creating instance...").
    fn say(&self, message: &str);

    /// Report a detail line that belongs to the previous `say`.
    fn message(&self, message: &str);

    /// Report an error line.
    fn error(&self, message: &str);
}

/// Severity of a recorded UI line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiLevel {
    Say,
    Message,
    Error,
}

/// A line recorded by [`BufferedUi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiLine {
    pub level: UiLevel,
    pub text: String,
}

/// A UI sink that records every line in memory.
///
/// Used by tests and by callers that want to render output after the fact.
#[derive(Debug, Default)]
pub struct BufferedUi {
    lines: Mutex<Vec<UiLine>>,
}

impl BufferedUi {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded lines.
    pub fn lines(&self) -> Vec<UiLine> {
        self.lines.lock().clone()
    }

    /// Recorded lines of the given level, text only.
    pub fn texts(&self, level: UiLevel) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|l| l.level == level)
            .map(|l| l.text.clone())
            .collect()
    }

    /// Whether any recorded line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|l| l.text.contains(needle))
    }

    fn push(&self, level: UiLevel, text: &str) {
        self.lines.lock().push(UiLine {
            level,
            text: text.to_string(),
        });
    }
}

impl Ui for BufferedUi {
    fn say(&self, message: &str) {
        self.push(UiLevel::Say, message);
    }

    fn message(&self, message: &str) {
        self.push(UiLevel::Message, message);
    }

    fn error(&self, message: &str) {
        self.push(UiLevel::Error, message);
    }
}

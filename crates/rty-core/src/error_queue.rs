//! The diagnostic queue passes report into.

use crate::errors::ErrorClass;
use crate::loc::Loc;
use parking_lot::Mutex;

/// One formatted line of a multi-part diagnostic.
#[derive(Clone, Debug)]
pub struct ErrorLine {
    /// Where the line points.
    pub loc: Loc,
    /// Pre-formatted message text; may be empty, in which case consumers
    /// fall back to the section header.
    pub formatted: String,
}

/// A titled group of [`ErrorLine`]s.
#[derive(Clone, Debug)]
pub struct ErrorSection {
    /// Section header text.
    pub header: String,
    /// The lines under this header.
    pub messages: Vec<ErrorLine>,
}

/// A diagnostic produced by some pass, waiting to be drained.
#[derive(Clone, Debug)]
pub struct QueuedError {
    /// Primary location.
    pub loc: Loc,
    /// The error class; carries the numeric code.
    pub class: ErrorClass,
    /// Pre-formatted main message.
    pub formatted: String,
    /// Extra sections for complex diagnostics; empty for simple ones.
    pub sections: Vec<ErrorSection>,
}

impl QueuedError {
    /// Create a simple single-message diagnostic.
    #[must_use]
    pub fn new(loc: Loc, class: ErrorClass, formatted: impl Into<String>) -> Self {
        Self {
            loc,
            class,
            formatted: formatted.into(),
            sections: Vec::new(),
        }
    }

    /// Attach a section, making this a complex diagnostic.
    #[must_use]
    pub fn with_section(mut self, section: ErrorSection) -> Self {
        self.sections.push(section);
        self
    }
}

/// Append-only queue of pending diagnostics.
///
/// The queue is shared: a deep-copied [`GlobalState`](crate::GlobalState)
/// keeps reporting into the queue of its original, so the server drains one
/// place no matter which derivative a pass ran against.
#[derive(Debug, Default)]
pub struct ErrorQueue {
    pending: Mutex<Vec<QueuedError>>,
}

impl ErrorQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic.
    pub fn push(&self, error: QueuedError) {
        self.pending.lock().push(error);
    }

    /// Remove and return everything queued so far.
    #[must_use]
    pub fn drain(&self) -> Vec<QueuedError> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Whether anything is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

//! Error reporters.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ports::{ErrorReporter, PortError};

/// Reporter that emits every failure as a `tracing` error event.
#[derive(Debug, Default)]
pub struct TracingReporter {
    reported: AtomicU64,
}

impl TracingReporter {
    /// Create a reporter with a zeroed counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of failures reported so far.
    #[must_use]
    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }
}

impl ErrorReporter for TracingReporter {
    fn report(&self, context: &str, error: &PortError) {
        self.reported.fetch_add(1, Ordering::Relaxed);
        tracing::error!(context, error = %error, "provider failure absorbed");
    }

    fn flush(&self) {
        tracing::info!(reported = self.reported(), "error reporter flushed");
    }
}

/// Reporter that keeps rendered failures in memory, mainly for tests.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    entries: Mutex<Vec<String>>,
}

impl CollectingReporter {
    /// Create an empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported, rendered as `context: error`.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, context: &str, error: &PortError) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(format!("{context}: {error}"));
        }
    }
}

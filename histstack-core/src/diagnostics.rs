//! Diagnostics observer injected into every pipeline component.
//!
//! Components never log through a global logger. Each one receives an
//! `Arc<dyn Diagnostics>` at construction and reports through it, so call
//! sites stay uniform and tests can capture exactly what was reported.

use std::sync::{Arc, Mutex, PoisonError};

pub use log::Level;

/// Observer for run-time diagnostics.
pub trait Diagnostics: Send + Sync {
    /// Records one message from `component` at `level`.
    fn record(&self, level: Level, component: &str, message: &str);

    /// Records an informational message.
    fn info(&self, component: &str, message: &str) {
        self.record(Level::Info, component, message);
    }

    /// Records a recoverable configuration warning.
    fn warn(&self, component: &str, message: &str) {
        self.record(Level::Warn, component, message);
    }

    /// Records an error that caused part of the output to be skipped.
    fn error(&self, component: &str, message: &str) {
        self.record(Level::Error, component, message);
    }

    /// Records a debug message.
    fn debug(&self, component: &str, message: &str) {
        self.record(Level::Debug, component, message);
    }
}

/// Forwards records to the `log` facade, using the component as target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDiagnostics;

impl LogDiagnostics {
    /// Creates a shareable handle.
    #[must_use]
    pub fn shared() -> Arc<dyn Diagnostics> {
        Arc::new(Self)
    }
}

impl Diagnostics for LogDiagnostics {
    fn record(&self, level: Level, component: &str, message: &str) {
        log::log!(target: component, level, "{message}");
    }
}

/// One captured diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub level: Level,
    pub component: String,
    pub message: String,
}

/// Keeps every record in memory. Useful in tests and for run summaries.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    records: Mutex<Vec<Record>>,
}

impl RecordingDiagnostics {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records so far.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records at exactly `level`.
    #[must_use]
    pub fn at_level(&self, level: Level) -> Vec<Record> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .collect()
    }

    /// Number of warnings recorded.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.at_level(Level::Warn).len()
    }

    /// Number of errors recorded.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.at_level(Level::Error).len()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn record(&self, level: Level, component: &str, message: &str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Record {
                level,
                component: component.to_string(),
                message: message.to_string(),
            });
    }
}

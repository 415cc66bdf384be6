//! Error types for histstack-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for histstack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for histstack operations.
///
/// Only setup problems surface as errors. Inconsistencies found while a run
/// is in progress are reported through [`crate::Diagnostics`] instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Bin edges violate the binning invariants.
    #[error("invalid binning: {0}")]
    InvalidBinning(String),

    /// Two histograms with different binnings were combined.
    #[error("binning mismatch: {0}")]
    BinningMismatch(String),

    /// Unknown draw role string.
    #[error("invalid role: {0:?} (expected \"stacked\", \"line\" or \"points\")")]
    InvalidRole(String),

    /// Unknown ratio error option.
    #[error("invalid error option: {0:?} (expected \"\" or \"B\")")]
    InvalidErrorOption(String),

    /// Dataset file for a process does not exist.
    #[error("dataset not found: {}", path.display())]
    DatasetNotFound { path: PathBuf },

    /// A panel element names the wrong number of inputs for its function.
    #[error("panel function {function} takes {expected} input(s), got {actual}")]
    ArityMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },

    /// A derived quantity input could not be resolved.
    #[error("unresolved input: {0}")]
    UnresolvedInput(String),

    /// Histogram fill failed.
    #[error("fill error: {0}")]
    FillError(String),

    /// Persisting merged histograms failed.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

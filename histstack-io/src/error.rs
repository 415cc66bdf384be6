//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// Expression that failed to compile or bind.
    #[error("expression '{expression}': {message}")]
    Expression { expression: String, message: String },

    /// Tree or column missing from a dataset.
    #[error("{0} not found")]
    MissingData(String),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Worker pool could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(String),

    /// HDF5 library error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] histstack_core::Error),
}

impl Error {
    /// Converts into a core fill error, unwrapping nested core errors.
    #[must_use]
    pub fn into_fill_error(self) -> histstack_core::Error {
        match self {
            Error::CoreError(err) => err,
            other => histstack_core::Error::FillError(other.to_string()),
        }
    }

    /// Converts into a core persistence error, unwrapping nested core errors.
    #[must_use]
    pub fn into_persistence_error(self) -> histstack_core::Error {
        match self {
            Error::CoreError(err) => err,
            other => histstack_core::Error::PersistenceError(other.to_string()),
        }
    }
}

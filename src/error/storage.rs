//! Durable storage errors.
//!
//! Callers never propagate these past the component that hit them: a failed
//! read degrades to "nothing stored" and a failed write is logged.

use thiserror::Error;

use super::ErrorCategory;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// Reading, writing or removing the slot failed.
    #[error("Storage I/O error on '{key}': {message}")]
    Io { key: String, message: String },

    /// The slot held a value that could not be (de)serialized.
    #[error("Storage serialization error on '{key}': {message}")]
    Serialization { key: String, message: String },

    /// No storage location could be determined (e.g. no home directory).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn io(key: &str, err: std::io::Error) -> Self {
        StorageError::Io {
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    pub fn serialization(key: &str, err: serde_json::Error) -> Self {
        StorageError::Serialization {
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::System
    }
}

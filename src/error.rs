//! Error types for SealKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::value::ValueType;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for SealKV operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // Read Errors (returned to the immediate caller)
    // -------------------------------------------------------------------------
    #[error("Type mismatch for key '{key}': expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: ValueType,
        found: ValueType,
    },

    #[error("Key not found: {0}")]
    KeyMissing(String),

    // -------------------------------------------------------------------------
    // I/O Errors (transient, retried by the writer)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Write failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Non-retryable Storage Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Storage corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Fatal Errors
    // -------------------------------------------------------------------------
    #[error("Key custody lost: {0}")]
    KeyCustodyLost(String),

    #[error("Writer is no longer running")]
    WriterUnavailable,

    // -------------------------------------------------------------------------
    // Programming / Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Key collision: {0}")]
    KeyCollision(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether the writer may retry the failed operation
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }

    /// Whether the store can no longer serve any request
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::KeyCustodyLost(_))
    }
}

/// I/O errors are rebuilt from their kind and message, since
/// `std::io::Error` cannot be cloned
impl Clone for StoreError {
    fn clone(&self) -> Self {
        match self {
            StoreError::TypeMismatch {
                key,
                expected,
                found,
            } => StoreError::TypeMismatch {
                key: key.clone(),
                expected: *expected,
                found: *found,
            },
            StoreError::KeyMissing(key) => StoreError::KeyMissing(key.clone()),
            StoreError::Io(e) => StoreError::Io(copy_io_error(e)),
            StoreError::RetriesExhausted { attempts, source } => StoreError::RetriesExhausted {
                attempts: *attempts,
                source: copy_io_error(source),
            },
            StoreError::Serialization(msg) => StoreError::Serialization(msg.clone()),
            StoreError::Encryption(msg) => StoreError::Encryption(msg.clone()),
            StoreError::Corruption(msg) => StoreError::Corruption(msg.clone()),
            StoreError::KeyCustodyLost(msg) => StoreError::KeyCustodyLost(msg.clone()),
            StoreError::WriterUnavailable => StoreError::WriterUnavailable,
            StoreError::KeyCollision(msg) => StoreError::KeyCollision(msg.clone()),
            StoreError::Config(msg) => StoreError::Config(msg.clone()),
        }
    }
}

fn copy_io_error(e: &std::io::Error) -> std::io::Error {
    std::io::Error::new(e.kind(), e.to_string())
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

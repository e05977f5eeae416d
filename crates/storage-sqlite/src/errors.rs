//! Storage-specific errors.

use thiserror::Error;

/// Errors raised by the SQLite layer. Converted to the core error at the trait boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Migration {version} failed: {message}")]
    Migration { version: String, message: String },
}

impl From<StorageError> for linkhub_core::Error {
    fn from(err: StorageError) -> Self {
        linkhub_core::Error::storage(err.to_string())
    }
}

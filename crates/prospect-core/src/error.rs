//! Error types for prospect-core

use thiserror::Error;

/// Result type alias using prospect-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in prospect-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No stored credential; sync and server-backed commands require login
    #[error("Not authenticated")]
    NotAuthenticated,

    /// A sync cycle is already running for this store
    #[error("Sync already in progress")]
    SyncInProgress,

    /// Sync HTTP request failed before a response was received
    #[error("Sync HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Sync API error: {0}")]
    Api(String),
}

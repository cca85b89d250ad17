//! Error types for coachnote.

use thiserror::Error;

/// Result type alias using coachnote's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for coachnote operations.
///
/// The search engine adds no error taxonomy of its own: store failures pass
/// through as `Database` (or whatever the backing store reports) and an
/// expired deadline surfaces as `Timeout`. Empty result sets are never errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Note not found
    #[error("Note not found: {0}")]
    NoteNotFound(uuid::Uuid),

    /// Search operation failed inside the backing store
    #[error("Search error: {0}")]
    Search(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Store query did not finish before the deadline (milliseconds)
    #[error("Search timed out after {0} ms")]
    Timeout(u64),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

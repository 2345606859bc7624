use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON column could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),

    /// The connection mutex was poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    LockPoisoned,

    /// Injected by [`crate::MemoryBackend`] to simulate a failed write.
    #[error("Simulated write failure")]
    Unavailable,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

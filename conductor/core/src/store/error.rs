//! Storage errors
//!
//! Unlike backend failures these always reach the caller: losing history
//! silently is worse than a visible failure.

use std::path::PathBuf;

/// Conversation store failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite rejected an operation
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem error creating the database directory or an export file
    #[error("I/O error at {path:?}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization failed during export
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored timestamp could not be parsed
    #[error("invalid timestamp '{value}' in row {id}")]
    Timestamp {
        /// Row id
        id: i64,
        /// Raw stored value
        value: String,
    },

    /// Export format name not recognized
    #[error("unsupported export format '{0}' (use 'json' or 'csv')")]
    UnsupportedFormat(String),
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

use std::path::PathBuf;

/// Errors from engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No database exists at the path and the open did not ask to create one.
    #[error("database not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The requested document does not exist (or was deleted).
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// Another handle or process holds write access to the database.
    #[error("database is locked by another writer: {}", .0.display())]
    Locked(PathBuf),

    /// A write was attempted through a read-only handle.
    #[error("database is open read-only")]
    ReadOnly,

    /// The supplied revision does not match the stored one.
    #[error("document update conflict: {id}")]
    Conflict { id: String },

    /// The document is malformed (bad JSON, empty or reserved id).
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The on-disk store could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure reported verbatim.
    #[error("{0}")]
    Backend(String),
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

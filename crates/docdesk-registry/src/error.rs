//! Error types for registry operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or changing the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No entry has this name.
    #[error("database not registered: {name}")]
    NotFound { name: String },

    /// An entry with this name already exists.
    #[error("database already registered: {name}")]
    AlreadyRegistered { name: String },

    /// The name cannot be stored in the registry format.
    #[error("invalid database name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// The path cannot be stored in the registry format.
    #[error("invalid database path {}: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// An in-process lock was poisoned by a panicking writer.
    #[error("registry lock poisoned: {0}")]
    LockPoisoned(String),

    /// The registry file could not be read or written.
    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

use std::path::PathBuf;

use docdesk_engine::EngineError;
use docdesk_registry::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Missing or malformed input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The name is not in the registry.
    #[error("database not found: {0}")]
    NotFound(String),

    #[error("database already registered: {0}")]
    AlreadyRegistered(String),

    /// Every attempted open mode failed; `source` is the last failure.
    #[error("cannot open database at {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    /// The probe reported the database as unreadable.
    #[error("database is unreachable: {name}: {message}")]
    Unreachable { name: String, message: String },

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("registry error: {0}")]
    Registry(RegistryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConsoleError {
    /// Text of the underlying engine failure, without this layer's prefix.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Open { source, .. } | Self::Engine(source) => source.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<RegistryError> for ConsoleError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound { name } => Self::NotFound(name),
            RegistryError::AlreadyRegistered { name } => Self::AlreadyRegistered(name),
            e @ (RegistryError::InvalidName { .. } | RegistryError::InvalidPath { .. }) => {
                Self::Validation(e.to_string())
            }
            other => Self::Registry(other),
        }
    }
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

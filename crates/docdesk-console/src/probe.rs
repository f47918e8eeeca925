//! Database probe.
//!
//! A probe decides, best-effort, whether a database can be read right now:
//!
//! 1. If the engine reports a lock marker, a writer outside this engine
//!    likely holds the database. Open read-only (no compaction, no lock
//!    taken) and query `info()`: success is [`DatabaseStatus::Locked`].
//! 2. Without a marker, open normally and query `info()`: success is
//!    [`DatabaseStatus::Available`].
//! 3. Any failure is [`DatabaseStatus::Error`] with the engine's message.
//!
//! The marker is advisory, so the result is a snapshot, not a guarantee. The
//! probe never creates anything and never caches.

use std::path::Path;
use std::sync::Arc;

use docdesk_engine::{DocumentEngine, OpenOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::session::with_handle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseStatus {
    Available,
    Locked,
    Error,
}

impl std::fmt::Display for DatabaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Locked => write!(f, "locked"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Outcome of one probe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub status: DatabaseStatus,
    pub readable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProbeReport {
    pub fn available() -> Self {
        Self {
            status: DatabaseStatus::Available,
            readable: true,
            message: None,
        }
    }

    pub fn locked() -> Self {
        Self {
            status: DatabaseStatus::Locked,
            readable: true,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "unknown engine error".into();
        }
        Self {
            status: DatabaseStatus::Error,
            readable: false,
            message: Some(message),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.status == DatabaseStatus::Locked
    }

    /// Short human-readable status line.
    pub fn status_message(&self) -> &str {
        match self.status {
            DatabaseStatus::Available => "Available",
            DatabaseStatus::Locked => "Locked (read-only)",
            DatabaseStatus::Error => self.message.as_deref().unwrap_or("Unavailable"),
        }
    }
}

/// Probes database directories through a [`DocumentEngine`].
#[derive(Clone)]
pub struct DatabaseProbe {
    engine: Arc<dyn DocumentEngine>,
}

impl DatabaseProbe {
    pub fn new(engine: Arc<dyn DocumentEngine>) -> Self {
        Self { engine }
    }

    pub fn check(&self, path: &Path) -> ProbeReport {
        let marked = self.engine.has_lock_marker(path);
        let options = if marked {
            OpenOptions::read_only()
        } else {
            OpenOptions::read_write()
        };

        let report = match with_handle(self.engine.as_ref(), path, &options, |h| h.info()) {
            Ok(_) if marked => ProbeReport::locked(),
            Ok(_) => ProbeReport::available(),
            Err(e) => ProbeReport::error(e.diagnostic()),
        };
        debug!(path = %path.display(), marked, status = %report.status, "probed database");
        report
    }
}

impl std::fmt::Debug for DatabaseProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseProbe").finish_non_exhaustive()
    }
}

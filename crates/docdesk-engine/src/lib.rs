//! Embedded document-store engine for docdesk.
//!
//! The console never talks to storage directly. Everything goes through the
//! [`DocumentEngine`] trait, which opens short-lived [`DatabaseHandle`]s
//! against a database directory. A handle is opened, used for one or two
//! calls, and closed.
//!
//! # Backends
//!
//! - [`DirectoryEngine`] -- one directory per database, documents persisted
//!   in `store.json`, writers guarded by an advisory lock on a `LOCK` marker
//! - [`InMemoryEngine`] -- map-backed engine for tests, with failure
//!   injection and open-handle accounting
//!
//! # Rules
//!
//! 1. A read-write handle owns the database's lock marker until it is closed
//!    or dropped.
//! 2. Read-only handles never create, lock, or modify anything.
//! 3. Every document write produces a new revision; writes against a stale
//!    revision fail with [`EngineError::Conflict`].

pub mod directory;
pub mod document;
pub mod error;
pub mod memory;
pub mod traits;

mod table;

pub use directory::{DirectoryEngine, LOCK_MARKER, STORE_FILE};
pub use document::{
    AllDocsOptions, AllDocsResponse, AllDocsRow, DatabaseInfo, Document, DocumentWrite,
};
pub use error::{EngineError, EngineResult};
pub use memory::{InMemoryEngine, OpenMode};
pub use traits::{DatabaseHandle, DocumentEngine, OpenOptions};

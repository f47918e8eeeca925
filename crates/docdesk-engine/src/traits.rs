use std::path::Path;

use crate::document::{AllDocsOptions, AllDocsResponse, DatabaseInfo, Document, DocumentWrite};
use crate::error::EngineResult;

/// How a database should be opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenOptions {
    /// Never create, lock, or modify the database.
    pub readonly: bool,
    /// Drop deleted documents instead of keeping tombstones.
    pub auto_compaction: bool,
    /// Create the database when it does not exist (ignored when read-only).
    pub create: bool,
}

impl OpenOptions {
    /// Read-only, non-compacting open of an existing database.
    pub fn read_only() -> Self {
        Self {
            readonly: true,
            auto_compaction: false,
            create: false,
        }
    }

    /// Normal read-write open of an existing database.
    pub fn read_write() -> Self {
        Self {
            readonly: false,
            auto_compaction: false,
            create: false,
        }
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn auto_compaction(mut self, enabled: bool) -> Self {
        self.auto_compaction = enabled;
        self
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::read_write()
    }
}

/// An embedded document-store engine.
///
/// Implementations must be thread-safe; independent callers may open
/// separate handles concurrently. All calls block.
pub trait DocumentEngine: Send + Sync {
    /// Open the database at `path`.
    ///
    /// Returns `EngineError::NotFound` when nothing exists there and
    /// `options.create` is not set, and `EngineError::Locked` when a
    /// read-write open finds another writer.
    fn open(&self, path: &Path, options: &OpenOptions) -> EngineResult<Box<dyn DatabaseHandle>>;

    /// Whether the database directory carries a lock marker, meaning a
    /// writer outside this engine (usually another process) likely holds
    /// write access.
    ///
    /// The default looks for a file named [`crate::LOCK_MARKER`] at the top
    /// level of `path`.
    fn has_lock_marker(&self, path: &Path) -> bool {
        path.join(crate::LOCK_MARKER).is_file()
    }
}

/// An open database. Dropping a handle releases it; [`close`](Self::close)
/// does the same but reports release failures.
pub trait DatabaseHandle: Send {
    fn path(&self) -> &Path;

    fn is_read_only(&self) -> bool;

    /// Lightweight metadata query.
    fn info(&self) -> EngineResult<DatabaseInfo>;

    fn all_docs(&self, options: &AllDocsOptions) -> EngineResult<AllDocsResponse>;

    fn get(&self, id: &str) -> EngineResult<Document>;

    /// Create or update a document. Updates must carry the current revision.
    fn put(&mut self, doc: Document) -> EngineResult<DocumentWrite>;

    /// Delete a document at its current revision.
    fn remove(&mut self, id: &str, rev: &str) -> EngineResult<DocumentWrite>;

    /// Remove the database and all of its storage. Consumes the handle.
    fn destroy(self: Box<Self>) -> EngineResult<()>;

    fn close(self: Box<Self>) -> EngineResult<()>;
}

//! In-memory engine for tests and embedding.
//!
//! [`InMemoryEngine`] keeps every database in a `HashMap` keyed by path. It
//! follows the same locking rules as the directory engine (one writer per
//! database, marker visible while the writer is open) and adds knobs tests
//! need: simulated foreign lock markers, injected open/destroy failures, and
//! a live-handle counter for leak checks.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::document::{AllDocsOptions, AllDocsResponse, DatabaseInfo, Document, DocumentWrite};
use crate::error::{EngineError, EngineResult};
use crate::table::DocumentTable;
use crate::traits::{DatabaseHandle, DocumentEngine, OpenOptions};

/// Which kind of open an injected failure applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

impl OpenMode {
    fn of(options: &OpenOptions) -> Self {
        if options.readonly {
            Self::ReadOnly
        } else {
            Self::ReadWrite
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read-only"),
            Self::ReadWrite => write!(f, "read-write"),
        }
    }
}

#[derive(Default)]
struct Shared {
    databases: RwLock<HashMap<PathBuf, DocumentTable>>,
    writers: RwLock<HashSet<PathBuf>>,
    foreign_markers: RwLock<HashSet<PathBuf>>,
    open_failures: RwLock<HashSet<(PathBuf, OpenMode)>>,
    destroy_failures: RwLock<HashSet<PathBuf>>,
    open_handles: AtomicUsize,
}

fn poisoned<E: fmt::Display>(e: E) -> EngineError {
    EngineError::Backend(format!("lock poisoned: {e}"))
}

/// An in-memory implementation of [`DocumentEngine`].
#[derive(Default)]
pub struct InMemoryEngine {
    shared: Arc<Shared>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty database at `path` (no-op if it exists).
    pub fn create_database(&self, path: impl AsRef<Path>) {
        self.shared
            .databases
            .write()
            .expect("lock poisoned")
            .entry(path.as_ref().to_path_buf())
            .or_default();
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.shared
            .databases
            .read()
            .expect("lock poisoned")
            .contains_key(path.as_ref())
    }

    /// Simulate another process holding the database's lock marker.
    pub fn place_lock_marker(&self, path: impl AsRef<Path>) {
        self.shared
            .foreign_markers
            .write()
            .expect("lock poisoned")
            .insert(path.as_ref().to_path_buf());
    }

    pub fn clear_lock_marker(&self, path: impl AsRef<Path>) {
        self.shared
            .foreign_markers
            .write()
            .expect("lock poisoned")
            .remove(path.as_ref());
    }

    /// Make every open of `path` in `mode` fail.
    pub fn fail_open(&self, path: impl AsRef<Path>, mode: OpenMode) {
        self.shared
            .open_failures
            .write()
            .expect("lock poisoned")
            .insert((path.as_ref().to_path_buf(), mode));
    }

    /// Make `destroy` of `path` fail.
    pub fn fail_destroy(&self, path: impl AsRef<Path>) {
        self.shared
            .destroy_failures
            .write()
            .expect("lock poisoned")
            .insert(path.as_ref().to_path_buf());
    }

    /// Number of handles currently open across all databases.
    pub fn open_handles(&self) -> usize {
        self.shared.open_handles.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for InMemoryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.shared.databases.read().map(|d| d.len()).unwrap_or(0);
        f.debug_struct("InMemoryEngine")
            .field("database_count", &count)
            .field("open_handles", &self.open_handles())
            .finish()
    }
}

impl DocumentEngine for InMemoryEngine {
    fn open(&self, path: &Path, options: &OpenOptions) -> EngineResult<Box<dyn DatabaseHandle>> {
        let mode = OpenMode::of(options);
        let failing = self
            .shared
            .open_failures
            .read()
            .map_err(poisoned)?
            .contains(&(path.to_path_buf(), mode));
        if failing {
            return Err(EngineError::Backend(format!(
                "simulated {mode} open failure: {}",
                path.display()
            )));
        }

        {
            let mut databases = self.shared.databases.write().map_err(poisoned)?;
            if !databases.contains_key(path) {
                if options.readonly || !options.create {
                    return Err(EngineError::NotFound(path.to_path_buf()));
                }
                databases.insert(path.to_path_buf(), DocumentTable::default());
            }
        }

        if mode == OpenMode::ReadWrite {
            let foreign = self
                .shared
                .foreign_markers
                .read()
                .map_err(poisoned)?
                .contains(path);
            let mut writers = self.shared.writers.write().map_err(poisoned)?;
            if foreign || !writers.insert(path.to_path_buf()) {
                return Err(EngineError::Locked(path.to_path_buf()));
            }
        }

        self.shared.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryHandle {
            shared: Arc::clone(&self.shared),
            path: path.to_path_buf(),
            mode,
            auto_compaction: options.auto_compaction,
        }))
    }

    fn has_lock_marker(&self, path: &Path) -> bool {
        let foreign = self
            .shared
            .foreign_markers
            .read()
            .map(|m| m.contains(path))
            .unwrap_or(false);
        let writer = self
            .shared
            .writers
            .read()
            .map(|w| w.contains(path))
            .unwrap_or(false);
        foreign || writer
    }
}

struct MemoryHandle {
    shared: Arc<Shared>,
    path: PathBuf,
    mode: OpenMode,
    auto_compaction: bool,
}

impl MemoryHandle {
    fn with_table<T>(&self, f: impl FnOnce(&DocumentTable) -> T) -> EngineResult<T> {
        let databases = self.shared.databases.read().map_err(poisoned)?;
        let table = databases
            .get(&self.path)
            .ok_or_else(|| EngineError::NotFound(self.path.clone()))?;
        Ok(f(table))
    }

    fn with_table_mut<T>(
        &mut self,
        f: impl FnOnce(&mut DocumentTable) -> EngineResult<T>,
    ) -> EngineResult<T> {
        if self.mode == OpenMode::ReadOnly {
            return Err(EngineError::ReadOnly);
        }
        let mut databases = self.shared.databases.write().map_err(poisoned)?;
        let table = databases
            .get_mut(&self.path)
            .ok_or_else(|| EngineError::NotFound(self.path.clone()))?;
        f(table)
    }
}

impl DatabaseHandle for MemoryHandle {
    fn path(&self) -> &Path {
        &self.path
    }

    fn is_read_only(&self) -> bool {
        self.mode == OpenMode::ReadOnly
    }

    fn info(&self) -> EngineResult<DatabaseInfo> {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.with_table(|t| t.info(name))
    }

    fn all_docs(&self, options: &AllDocsOptions) -> EngineResult<AllDocsResponse> {
        self.with_table(|t| t.all_docs(options))
    }

    fn get(&self, id: &str) -> EngineResult<Document> {
        self.with_table(|t| t.get(id))?
    }

    fn put(&mut self, doc: Document) -> EngineResult<DocumentWrite> {
        self.with_table_mut(|t| t.put(doc))
    }

    fn remove(&mut self, id: &str, rev: &str) -> EngineResult<DocumentWrite> {
        let compact = self.auto_compaction;
        self.with_table_mut(|t| t.remove(id, rev, compact))
    }

    fn destroy(self: Box<Self>) -> EngineResult<()> {
        if self.mode == OpenMode::ReadOnly {
            return Err(EngineError::ReadOnly);
        }
        let failing = self
            .shared
            .destroy_failures
            .read()
            .map_err(poisoned)?
            .contains(&self.path);
        if failing {
            return Err(EngineError::Backend(format!(
                "simulated destroy failure: {}",
                self.path.display()
            )));
        }
        self.shared
            .databases
            .write()
            .map_err(poisoned)?
            .remove(&self.path);
        Ok(())
    }

    fn close(self: Box<Self>) -> EngineResult<()> {
        Ok(())
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        if self.mode == OpenMode::ReadWrite {
            if let Ok(mut writers) = self.shared.writers.write() {
                writers.remove(&self.path);
            }
        }
        self.shared.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

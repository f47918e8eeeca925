//! Directory-backed engine.
//!
//! On-disk layout of one database:
//!
//! ```text
//! <db>/store.json   documents, revisions, update sequence
//! <db>/LOCK         present only while a read-write handle is open
//! ```
//!
//! The first read-write handle an engine opens on a database creates `LOCK`
//! and holds an exclusive advisory lock on it. Further read-write handles
//! opened through the same engine (or a clone of it) share that lock and
//! serialize their commits; a writer in another process, or behind another
//! engine instance, fails fast with [`EngineError::Locked`]. The marker is
//! unlocked and removed when the last sharing handle is closed or dropped.
//!
//! [`DirectoryEngine::has_lock_marker`] therefore reports only locks held
//! elsewhere: a `LOCK` file left behind by a crashed writer, or one this
//! engine holds itself, does not count.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions as FsOpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::document::{AllDocsOptions, AllDocsResponse, DatabaseInfo, Document, DocumentWrite};
use crate::error::{EngineError, EngineResult};
use crate::table::DocumentTable;
use crate::traits::{DatabaseHandle, DocumentEngine, OpenOptions};

/// Name of the lock marker file at the top level of a database directory.
pub const LOCK_MARKER: &str = "LOCK";

/// Name of the document store file inside a database directory.
pub const STORE_FILE: &str = "store.json";

/// Writer locks this engine holds, keyed by canonical database path.
type Writers = HashMap<PathBuf, SharedWriter>;

struct SharedWriter {
    lock: WriterLock,
    holders: usize,
    commit: Arc<Mutex<()>>,
}

/// Engine storing each database as a directory on local disk.
#[derive(Clone, Default)]
pub struct DirectoryEngine {
    writers: Arc<Mutex<Writers>>,
}

impl DirectoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the writer lock this engine already holds on `path`, or take it.
    fn lease(&self, path: &Path) -> EngineResult<WriterLease> {
        let key = lease_key(path);
        let mut writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
        let commit = match writers.get_mut(&key) {
            Some(shared) => {
                shared.holders += 1;
                Arc::clone(&shared.commit)
            }
            None => {
                let lock = WriterLock::acquire(path)?;
                let commit = Arc::new(Mutex::new(()));
                writers.insert(
                    key.clone(),
                    SharedWriter {
                        lock,
                        holders: 1,
                        commit: Arc::clone(&commit),
                    },
                );
                commit
            }
        };
        Ok(WriterLease {
            key,
            writers: Arc::clone(&self.writers),
            commit,
            released: false,
        })
    }
}

impl std::fmt::Debug for DirectoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let held = self.writers.lock().map(|w| w.len()).unwrap_or(0);
        f.debug_struct("DirectoryEngine")
            .field("held_writer_locks", &held)
            .finish()
    }
}

impl DocumentEngine for DirectoryEngine {
    fn open(&self, path: &Path, options: &OpenOptions) -> EngineResult<Box<dyn DatabaseHandle>> {
        let store_path = path.join(STORE_FILE);

        if options.readonly {
            if !store_path.is_file() {
                return Err(EngineError::NotFound(path.to_path_buf()));
            }
            let table = read_table(&store_path)?;
            debug!(path = %path.display(), "opened database read-only");
            return Ok(Box::new(DirectoryHandle {
                path: path.to_path_buf(),
                table,
                lease: None,
                auto_compaction: false,
            }));
        }

        if !path.is_dir() {
            if !options.create {
                return Err(EngineError::NotFound(path.to_path_buf()));
            }
            fs::create_dir_all(path)?;
        }
        // A directory without a store is not ours; leave its files alone.
        if !options.create && !store_path.is_file() {
            return Err(EngineError::NotFound(path.to_path_buf()));
        }

        let lease = self.lease(path)?;
        let table = if store_path.is_file() {
            read_table(&store_path)?
        } else if options.create {
            let table = DocumentTable::default();
            write_table(&store_path, &table)?;
            table
        } else {
            lease.release()?;
            return Err(EngineError::NotFound(path.to_path_buf()));
        };

        debug!(path = %path.display(), "opened database read-write");
        Ok(Box::new(DirectoryHandle {
            path: path.to_path_buf(),
            table,
            lease: Some(lease),
            auto_compaction: options.auto_compaction,
        }))
    }

    fn has_lock_marker(&self, path: &Path) -> bool {
        // Held across the check so a lease taken concurrently by this engine
        // is never mistaken for a foreign writer.
        let writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
        if writers.contains_key(&lease_key(path)) {
            return false;
        }
        let Ok(file) = File::open(path.join(LOCK_MARKER)) else {
            return false;
        };
        match FileExt::try_lock_shared(&file) {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                false
            }
            Err(_) => true,
        }
    }
}

fn lease_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// An open directory database. Holds the whole document table in memory for
/// its (short) lifetime; writers persist after every change.
struct DirectoryHandle {
    path: PathBuf,
    table: DocumentTable,
    lease: Option<WriterLease>,
    auto_compaction: bool,
}

impl DirectoryHandle {
    fn db_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Apply a change to the latest persisted table, persist it, then adopt
    /// it. Commits of handles sharing a lease run one at a time.
    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut DocumentTable) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let commit = match &self.lease {
            Some(lease) => Arc::clone(&lease.commit),
            None => return Err(EngineError::ReadOnly),
        };
        let _serialized = commit.lock().unwrap_or_else(PoisonError::into_inner);

        let store_path = self.path.join(STORE_FILE);
        let mut next = read_table(&store_path)?;
        let out = change(&mut next)?;
        write_table(&store_path, &next)?;
        self.table = next;
        Ok(out)
    }
}

impl DatabaseHandle for DirectoryHandle {
    fn path(&self) -> &Path {
        &self.path
    }

    fn is_read_only(&self) -> bool {
        self.lease.is_none()
    }

    fn info(&self) -> EngineResult<DatabaseInfo> {
        Ok(self.table.info(self.db_name()))
    }

    fn all_docs(&self, options: &AllDocsOptions) -> EngineResult<AllDocsResponse> {
        Ok(self.table.all_docs(options))
    }

    fn get(&self, id: &str) -> EngineResult<Document> {
        self.table.get(id)
    }

    fn put(&mut self, doc: Document) -> EngineResult<DocumentWrite> {
        self.commit(|table| table.put(doc))
    }

    fn remove(&mut self, id: &str, rev: &str) -> EngineResult<DocumentWrite> {
        let compact = self.auto_compaction;
        self.commit(|table| table.remove(id, rev, compact))
    }

    fn destroy(mut self: Box<Self>) -> EngineResult<()> {
        let lease = self.lease.take().ok_or(EngineError::ReadOnly)?;
        lease.release()?;
        fs::remove_dir_all(&self.path)?;
        debug!(path = %self.path.display(), "destroyed database");
        Ok(())
    }

    fn close(mut self: Box<Self>) -> EngineResult<()> {
        if let Some(lease) = self.lease.take() {
            lease.release()?;
        }
        Ok(())
    }
}

/// One read-write handle's share of an engine-held [`WriterLock`].
struct WriterLease {
    key: PathBuf,
    writers: Arc<Mutex<Writers>>,
    commit: Arc<Mutex<()>>,
    released: bool,
}

impl WriterLease {
    fn release(mut self) -> EngineResult<()> {
        self.released = true;
        self.release_inner()
    }

    /// The last holder removes the marker and unlocks it.
    fn release_inner(&self) -> EngineResult<()> {
        let mut writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
        let last = match writers.get_mut(&self.key) {
            Some(shared) => {
                shared.holders = shared.holders.saturating_sub(1);
                shared.holders == 0
            }
            None => false,
        };
        if last {
            if let Some(shared) = writers.remove(&self.key) {
                shared.lock.release()?;
            }
        }
        Ok(())
    }
}

impl Drop for WriterLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.release_inner() {
            warn!(path = %self.key.display(), error = %e, "failed to release database lease");
        }
    }
}

/// Exclusive advisory lock on a database's `LOCK` marker.
struct WriterLock {
    file: Option<File>,
    path: PathBuf,
}

impl WriterLock {
    fn acquire(db_path: &Path) -> EngineResult<Self> {
        let path = db_path.join(LOCK_MARKER);
        let file = FsOpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(EngineError::Locked(db_path.to_path_buf()));
            }
            return Err(e.into());
        }

        // The previous holder may have removed the marker between our open
        // and our lock; we would then hold a lock on an orphaned inode.
        if !path.is_file() {
            let _ = FileExt::unlock(&file);
            return Err(EngineError::Locked(db_path.to_path_buf()));
        }

        let mut lock = Self {
            file: Some(file),
            path,
        };
        lock.write_owner()?;
        Ok(lock)
    }

    fn write_owner(&mut self) -> std::io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.set_len(0)?;
            writeln!(file, "{}", std::process::id())?;
        }
        Ok(())
    }

    fn release(mut self) -> EngineResult<()> {
        self.release_inner()?;
        Ok(())
    }

    fn release_inner(&mut self) -> std::io::Result<()> {
        if let Some(file) = self.file.take() {
            // Remove while still holding the lock so no waiter can grab the
            // old inode after we let go.
            let removed = fs::remove_file(&self.path);
            FileExt::unlock(&file)?;
            match removed {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
                _ => {}
            }
        }
        Ok(())
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!(path = %self.path.display(), error = %e, "failed to release database lock");
        }
    }
}

fn read_table(path: &Path) -> EngineResult<DocumentTable> {
    let bytes = fs::read(path)?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(DocumentTable::default());
    }
    serde_json::from_slice(&bytes).map_err(|e| EngineError::Serialization(e.to_string()))
}

/// Atomic replace: temp file in the same directory, fsync, rename.
fn write_table(path: &Path, table: &DocumentTable) -> EngineResult<()> {
    let bytes =
        serde_json::to_vec_pretty(table).map_err(|e| EngineError::Serialization(e.to_string()))?;
    let dir = path
        .parent()
        .ok_or_else(|| EngineError::NotFound(path.to_path_buf()))?;
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(&bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| EngineError::Io(e.error))?;
    Ok(())
}

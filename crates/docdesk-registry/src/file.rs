//! File-backed registry store.
//!
//! The registry is a UTF-8 text file of `name:path` lines. Appends use an
//! append-mode write; rewrites go to a temp file in the same directory that
//! is then renamed over the registry, so readers see either the old or the
//! new content and never a torn file.
//!
//! Mutations hold the instance mutex and an exclusive `fs2` lock on the
//! sidecar `<registry>.lock` file. Loads take neither: rename is atomic.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use fs2::FileExt;
use tracing::{debug, info, warn};

use crate::entry::{parse_registry, serialize_registry, RegistryEntry};
use crate::error::{RegistryError, RegistryResult};
use crate::traits::RegistryStore;

/// Registry persisted as a flat text file.
#[derive(Debug)]
pub struct FileRegistryStore {
    path: PathBuf,
    guard: Mutex<()>,
}

/// Held for the duration of a mutation. Releases the advisory lock on drop.
struct WriteLock<'a> {
    _guard: MutexGuard<'a, ()>,
    file: File,
}

impl Drop for WriteLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(error = %e, "failed to release registry lock");
        }
    }
}

impl FileRegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "registry".into());
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn ensure_parent(&self) -> RegistryResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn lock(&self) -> RegistryResult<WriteLock<'_>> {
        let guard = self
            .guard
            .lock()
            .map_err(|e| RegistryError::LockPoisoned(e.to_string()))?;
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())?;
        FileExt::lock_exclusive(&file)?;
        Ok(WriteLock {
            _guard: guard,
            file,
        })
    }

    fn read_entries(&self) -> RegistryResult<Vec<RegistryEntry>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(parse_registry(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.ensure_parent()?;
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                debug!(path = %self.path.display(), "created empty registry");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn append_line(&self, entry: &RegistryEntry) -> RegistryResult<()> {
        self.ensure_parent()?;
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        let mut line = String::new();
        if !ends_with_newline(&mut file)? {
            line.push('\n');
        }
        line.push_str(&entry.to_line());
        line.push('\n');

        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    fn replace(&self, entries: &[RegistryEntry]) -> RegistryResult<()> {
        self.ensure_parent()?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(serialize_registry(entries).as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| RegistryError::Io(e.error))?;
        Ok(())
    }
}

/// True when the file is empty or its last byte is `\n`.
fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

impl RegistryStore for FileRegistryStore {
    fn load(&self) -> RegistryResult<Vec<RegistryEntry>> {
        self.read_entries()
    }

    fn append(&self, entry: &RegistryEntry) -> RegistryResult<()> {
        let _lock = self.lock()?;
        self.append_line(entry)?;
        info!(name = %entry.name, path = %entry.path.display(), "registered database");
        Ok(())
    }

    fn rewrite(&self, entries: &[RegistryEntry]) -> RegistryResult<()> {
        let _lock = self.lock()?;
        self.replace(entries)
    }

    fn modify(
        &self,
        change: &mut dyn FnMut(&mut Vec<RegistryEntry>) -> RegistryResult<()>,
    ) -> RegistryResult<()> {
        let _lock = self.lock()?;
        let before = self.read_entries()?;
        let mut after = before.clone();
        change(&mut after)?;
        if after != before {
            self.replace(&after)?;
            debug!(before = before.len(), after = after.len(), "rewrote registry");
        }
        Ok(())
    }

    fn append_unique(&self, entry: &RegistryEntry) -> RegistryResult<()> {
        let _lock = self.lock()?;
        if self.read_entries()?.iter().any(|e| e.name == entry.name) {
            return Err(RegistryError::AlreadyRegistered {
                name: entry.name.clone(),
            });
        }
        self.append_line(entry)?;
        info!(name = %entry.name, path = %entry.path.display(), "registered database");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn store_in(dir: &tempfile::TempDir) -> FileRegistryStore {
        FileRegistryStore::new(dir.path().join("db_registry.txt"))
    }

    #[test]
    fn load_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().unwrap().is_empty());
        assert!(store.path().is_file());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "");
    }

    #[test]
    fn load_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRegistryStore::new(dir.path().join("nested/state/registry.txt"));
        assert!(store.load().unwrap().is_empty());
        assert!(store.path().is_file());
    }

    #[test]
    fn append_writes_terminated_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.append(&RegistryEntry::new("a", "/srv/a")).unwrap();
        store.append(&RegistryEntry::new("b", "/srv/b")).unwrap();
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            "a:/srv/a\nb:/srv/b\n"
        );
    }

    #[test]
    fn append_repairs_missing_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "a:/srv/a").unwrap();
        store.append(&RegistryEntry::new("b", "/srv/b")).unwrap();
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn store_layer_permits_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.append(&RegistryEntry::new("dup", "/srv/one")).unwrap();
        store.append(&RegistryEntry::new("dup", "/srv/two")).unwrap();

        let entries = store.load().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.name == "dup"));
        assert_eq!(store.find("dup").unwrap().unwrap().path, PathBuf::from("/srv/one"));
    }

    #[test]
    fn append_unique_rejects_existing_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.append_unique(&RegistryEntry::new("a", "/srv/a")).unwrap();
        let err = store
            .append_unique(&RegistryEntry::new("a", "/srv/other"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered { .. }));
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn rewrite_empty_leaves_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.append(&RegistryEntry::new("a", "/srv/a")).unwrap();
        store.rewrite(&[]).unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "");
    }

    #[test]
    fn rewrite_then_load_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let entries = vec![
            RegistryEntry::new("x", "/srv/x"),
            RegistryEntry::new("y", "/srv/y"),
        ];
        store.rewrite(&entries).unwrap();
        let first = store.load().unwrap();
        let second = store.load().unwrap();
        assert_eq!(first, entries);
        assert_eq!(first, second);
    }

    #[test]
    fn remove_missing_name_leaves_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.append(&RegistryEntry::new("a", "/srv/a")).unwrap();
        let before = fs::read(store.path()).unwrap();

        let err = store.remove("missing").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn remove_drops_every_entry_with_the_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.append(&RegistryEntry::new("a", "/srv/a1")).unwrap();
        store.append(&RegistryEntry::new("b", "/srv/b")).unwrap();
        store.append(&RegistryEntry::new("a", "/srv/a2")).unwrap();

        let removed = store.remove("a").unwrap();
        assert_eq!(removed.path, PathBuf::from("/srv/a1"));
        assert_eq!(store.load().unwrap(), vec![RegistryEntry::new("b", "/srv/b")]);
    }

    #[test]
    fn failed_modify_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.append(&RegistryEntry::new("a", "/srv/a")).unwrap();

        let result = store.modify(&mut |entries: &mut Vec<RegistryEntry>| {
            entries.clear();
            Err(RegistryError::NotFound { name: "z".into() })
        });
        assert!(result.is_err());
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_removals_do_not_lose_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(&dir));
        let names: Vec<String> = (0..16).map(|i| format!("db{i}")).collect();
        for name in &names {
            store
                .append(&RegistryEntry::new(name.clone(), format!("/srv/{name}")))
                .unwrap();
        }

        let threads: Vec<_> = names
            .iter()
            .take(8)
            .cloned()
            .map(|name| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.remove(&name).unwrap())
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let remaining: Vec<String> = store.load().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(remaining, names[8..].to_vec());
    }

    #[test]
    fn separate_instances_share_the_advisory_lock() {
        let dir = tempfile::tempdir().unwrap();
        let a = Arc::new(store_in(&dir));
        let b = Arc::new(store_in(&dir));
        for i in 0..10 {
            a.append(&RegistryEntry::new(format!("db{i}"), "/srv")).unwrap();
        }

        let ta = {
            let a = Arc::clone(&a);
            std::thread::spawn(move || {
                for i in 0..5 {
                    a.remove(&format!("db{i}")).unwrap();
                }
            })
        };
        let tb = {
            let b = Arc::clone(&b);
            std::thread::spawn(move || {
                for i in 5..10 {
                    b.remove(&format!("db{i}")).unwrap();
                }
            })
        };
        ta.join().unwrap();
        tb.join().unwrap();

        assert!(a.load().unwrap().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn appends_load_back_in_order(
            names in proptest::collection::hash_set("[a-z][a-z0-9_-]{0,11}", 0..12)
        ) {
            let dir = tempfile::tempdir().unwrap();
            let store = store_in(&dir);
            let entries: Vec<RegistryEntry> = names
                .into_iter()
                .map(|n| {
                    let path = format!("/srv/{n}");
                    RegistryEntry::new(n, path)
                })
                .collect();
            for entry in &entries {
                store.append(entry).unwrap();
            }
            prop_assert_eq!(store.load().unwrap(), entries);
        }
    }
}

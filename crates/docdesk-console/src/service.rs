//! Registry service: the operations behind the database list.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docdesk_engine::{DocumentEngine, EngineError, OpenOptions};
use docdesk_registry::{validate_name, validate_path, RegistryEntry, RegistryError, RegistryStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConsoleError, ConsoleResult};
use crate::pagination::paginate;
use crate::probe::{DatabaseProbe, ProbeReport};
use crate::session::with_handle;

/// One row of the database list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSummary {
    pub name: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub probe: ProbeReport,
}

/// A page of the database list plus its pagination metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseListPage {
    pub databases: Vec<DatabaseSummary>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_count: usize,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

/// Registers, lists, and removes databases.
///
/// Both collaborators are injected: the registry store (file-backed in
/// production) and the document engine the probe and opens go through.
pub struct RegistryService {
    store: Arc<dyn RegistryStore>,
    engine: Arc<dyn DocumentEngine>,
    probe: DatabaseProbe,
}

impl RegistryService {
    pub fn new(store: Arc<dyn RegistryStore>, engine: Arc<dyn DocumentEngine>) -> Self {
        let probe = DatabaseProbe::new(Arc::clone(&engine));
        Self {
            store,
            engine,
            probe,
        }
    }

    pub fn store(&self) -> &dyn RegistryStore {
        self.store.as_ref()
    }

    pub fn engine(&self) -> &dyn DocumentEngine {
        self.engine.as_ref()
    }

    pub fn probe(&self) -> &DatabaseProbe {
        &self.probe
    }

    /// Register a database that already exists at `path`.
    ///
    /// The parent directory of `path` is created if missing. The database
    /// itself is opened read-only, then normally if that fails, only to
    /// confirm it is openable; it is never created here.
    pub fn register_existing(&self, name: &str, path: &Path) -> ConsoleResult<RegistryEntry> {
        require(name, path)?;
        validate_name(name)?;
        let path = std::path::absolute(path)?;
        validate_path(&path)?;
        self.ensure_unregistered(name)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.confirm_openable(&path)?;

        let entry = RegistryEntry::new(name, path);
        self.store.append_unique(&entry)?;
        info!(name, path = %entry.path.display(), "registered existing database");
        Ok(entry)
    }

    /// Create a new database at `base_path/name` and register it.
    pub fn create_new(&self, name: &str, base_path: &Path) -> ConsoleResult<RegistryEntry> {
        require(name, base_path)?;
        validate_name(name)?;
        let path = std::path::absolute(base_path)?.join(name);
        validate_path(&path)?;
        self.ensure_unregistered(name)?;

        let options = OpenOptions::read_write().create(true);
        with_handle(self.engine.as_ref(), &path, &options, |h| h.info())?;

        let entry = RegistryEntry::new(name, path);
        self.store.append_unique(&entry)?;
        info!(name, path = %entry.path.display(), "created database");
        Ok(entry)
    }

    /// One page of registered databases, each freshly probed.
    pub fn list_page(&self, page: usize, page_size: usize) -> ConsoleResult<DatabaseListPage> {
        let entries = self.store.load()?;
        let window = paginate(entries.len(), page, page_size);

        let databases = window
            .slice(&entries)
            .iter()
            .map(|entry| DatabaseSummary {
                name: entry.name.clone(),
                path: entry.path.clone(),
                probe: self.probe.check(&entry.path),
            })
            .collect();

        Ok(DatabaseListPage {
            databases,
            current_page: window.page,
            total_pages: window.total_pages,
            total_count: entries.len(),
            has_next_page: window.has_next,
            has_prev_page: window.has_prev,
        })
    }

    /// The registry entry for `name` (first match).
    pub fn resolve(&self, name: &str) -> ConsoleResult<RegistryEntry> {
        self.store
            .find(name)?
            .ok_or_else(|| ConsoleError::NotFound(name.to_string()))
    }

    /// Resolve `name` and probe its database.
    pub fn status(&self, name: &str) -> ConsoleResult<DatabaseSummary> {
        let entry = self.resolve(name)?;
        let probe = self.probe.check(&entry.path);
        Ok(DatabaseSummary {
            name: entry.name,
            path: entry.path,
            probe,
        })
    }

    /// Remove `name` from the registry. The database is left untouched.
    pub fn unregister(&self, name: &str) -> ConsoleResult<RegistryEntry> {
        let removed = self.store.remove(name)?;
        info!(name, path = %removed.path.display(), "unregistered database");
        Ok(removed)
    }

    /// Destroy the database's storage, then remove it from the registry.
    ///
    /// If the destroy fails the registry entry stays. Storage that is
    /// already gone counts as destroyed.
    pub fn delete_database(&self, name: &str) -> ConsoleResult<RegistryEntry> {
        let entry = self.resolve(name)?;

        match self.engine.open(&entry.path, &OpenOptions::read_write()) {
            Ok(handle) => handle.destroy()?,
            Err(EngineError::NotFound(_)) => {
                warn!(name, path = %entry.path.display(), "database storage already gone");
            }
            Err(source) => {
                return Err(ConsoleError::Open {
                    path: entry.path.clone(),
                    source,
                })
            }
        }

        match self.store.remove(name) {
            Ok(_) => {}
            Err(RegistryError::NotFound { .. }) => {
                warn!(name, "database entry vanished before removal");
            }
            Err(e) => return Err(e.into()),
        }
        info!(name, path = %entry.path.display(), "deleted database");
        Ok(entry)
    }

    fn ensure_unregistered(&self, name: &str) -> ConsoleResult<()> {
        if self.store.find(name)?.is_some() {
            return Err(ConsoleError::AlreadyRegistered(name.to_string()));
        }
        Ok(())
    }

    fn confirm_openable(&self, path: &Path) -> ConsoleResult<()> {
        let engine = self.engine.as_ref();
        match with_handle(engine, path, &OpenOptions::read_only(), |h| h.info()) {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "read-only open failed, retrying normally");
                with_handle(engine, path, &OpenOptions::read_write(), |h| h.info())
                    .map(|_| ())
                    .map_err(|e| match e {
                        ConsoleError::Engine(source) => ConsoleError::Open {
                            path: path.to_path_buf(),
                            source,
                        },
                        other => other,
                    })
            }
        }
    }
}

fn require(name: &str, path: &Path) -> ConsoleResult<()> {
    if name.trim().is_empty() || path.as_os_str().is_empty() {
        return Err(ConsoleError::Validation(
            "database name and path are required".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdesk_engine::{DirectoryEngine, InMemoryEngine, OpenMode};
    use docdesk_registry::{FileRegistryStore, InMemoryRegistryStore};
    use crate::probe::DatabaseStatus;

    struct Fixture {
        engine: Arc<InMemoryEngine>,
        store: Arc<InMemoryRegistryStore>,
        service: RegistryService,
        // Registration creates parent directories on disk.
        root: tempfile::TempDir,
    }

    impl Fixture {
        fn at(&self, name: &str) -> PathBuf {
            self.root.path().join(name)
        }
    }

    fn fixture() -> Fixture {
        let engine = Arc::new(InMemoryEngine::new());
        let store = Arc::new(InMemoryRegistryStore::new());
        let service = RegistryService::new(store.clone(), engine.clone());
        Fixture {
            engine,
            store,
            service,
            root: tempfile::tempdir().unwrap(),
        }
    }

    #[test]
    fn register_existing_appends_entry() {
        let f = fixture();
        let path = f.at("nested/people");
        f.engine.create_database(&path);
        let entry = f.service.register_existing("people", &path).unwrap();
        assert_eq!(entry, RegistryEntry::new("people", path.clone()));
        assert_eq!(f.store.load().unwrap(), vec![entry]);
        assert!(f.at("nested").is_dir());
        assert_eq!(f.engine.open_handles(), 0);
    }

    #[test]
    fn register_falls_back_to_normal_open() {
        let f = fixture();
        let path = f.at("db");
        f.engine.create_database(&path);
        f.engine.fail_open(&path, OpenMode::ReadOnly);
        assert!(f.service.register_existing("db", &path).is_ok());
    }

    #[test]
    fn register_fails_when_both_opens_fail() {
        let f = fixture();
        let path = f.at("db");
        f.engine.create_database(&path);
        f.engine.fail_open(&path, OpenMode::ReadOnly);
        f.engine.fail_open(&path, OpenMode::ReadWrite);
        let err = f.service.register_existing("db", &path).unwrap_err();
        assert!(matches!(err, ConsoleError::Open { .. }));
        assert!(f.store.load().unwrap().is_empty());
        assert_eq!(f.engine.open_handles(), 0);
    }

    #[test]
    fn register_missing_database_is_open_error() {
        let f = fixture();
        let path = f.at("none");
        let err = f.service.register_existing("db", &path).unwrap_err();
        assert!(matches!(err, ConsoleError::Open { .. }));
        assert!(!f.engine.contains(&path));
    }

    #[test]
    fn register_requires_name_and_path() {
        let f = fixture();
        let path = f.at("db");
        assert!(matches!(
            f.service.register_existing("", &path),
            Err(ConsoleError::Validation(_))
        ));
        assert!(matches!(
            f.service.register_existing("db", Path::new("")),
            Err(ConsoleError::Validation(_))
        ));
        assert!(matches!(
            f.service.register_existing("a:b", &path),
            Err(ConsoleError::Validation(_))
        ));
    }

    #[test]
    fn register_rejects_duplicate_names() {
        let f = fixture();
        f.engine.create_database(f.at("a"));
        f.engine.create_database(f.at("b"));
        f.service.register_existing("db", &f.at("a")).unwrap();
        let err = f.service.register_existing("db", &f.at("b")).unwrap_err();
        assert!(matches!(err, ConsoleError::AlreadyRegistered(_)));
        assert_eq!(f.store.load().unwrap().len(), 1);
    }

    #[test]
    fn create_new_joins_name_and_initializes() {
        let f = fixture();
        let entry = f.service.create_new("orders", Path::new("/srv")).unwrap();
        assert_eq!(entry.path, PathBuf::from("/srv/orders"));
        assert!(f.engine.contains("/srv/orders"));
        assert_eq!(f.store.load().unwrap().len(), 1);
        assert_eq!(f.engine.open_handles(), 0);
    }

    #[test]
    fn create_new_engine_failure_is_open_error() {
        let f = fixture();
        f.engine.fail_open("/srv/orders", OpenMode::ReadWrite);
        let err = f.service.create_new("orders", Path::new("/srv")).unwrap_err();
        assert!(matches!(err, ConsoleError::Open { .. }));
        assert!(f.store.load().unwrap().is_empty());
    }

    #[test]
    fn list_page_probes_each_entry_in_window() {
        let f = fixture();
        for i in 0..7 {
            let path = format!("/srv/db{i}");
            if i != 6 {
                f.engine.create_database(&path);
            }
            f.store.append(&RegistryEntry::new(format!("db{i}"), path)).unwrap();
        }
        f.engine.place_lock_marker("/srv/db5");

        let page = f.service.list_page(2, 5).unwrap();
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.total_count, 7);
        assert!(page.has_prev_page);
        assert!(!page.has_next_page);
        let statuses: Vec<_> = page
            .databases
            .iter()
            .map(|d| (d.name.as_str(), d.probe.status))
            .collect();
        assert_eq!(
            statuses,
            vec![("db5", DatabaseStatus::Locked), ("db6", DatabaseStatus::Error)]
        );
        assert_eq!(f.engine.open_handles(), 0);
    }

    #[test]
    fn list_page_beyond_end_is_empty() {
        let f = fixture();
        f.store.append(&RegistryEntry::new("a", "/a")).unwrap();
        let page = f.service.list_page(4, 5).unwrap();
        assert!(page.databases.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn unregister_missing_is_not_found() {
        let f = fixture();
        f.store.append(&RegistryEntry::new("a", "/a")).unwrap();
        assert!(matches!(
            f.service.unregister("missing"),
            Err(ConsoleError::NotFound(_))
        ));
        assert_eq!(f.store.load().unwrap().len(), 1);
    }

    #[test]
    fn unregister_keeps_storage() {
        let f = fixture();
        f.engine.create_database("/srv/a");
        f.store.append(&RegistryEntry::new("a", "/srv/a")).unwrap();
        f.service.unregister("a").unwrap();
        assert!(f.store.load().unwrap().is_empty());
        assert!(f.engine.contains("/srv/a"));
    }

    #[test]
    fn delete_destroys_then_unregisters() {
        let f = fixture();
        f.engine.create_database("/srv/a");
        f.store.append(&RegistryEntry::new("a", "/srv/a")).unwrap();
        f.service.delete_database("a").unwrap();
        assert!(!f.engine.contains("/srv/a"));
        assert!(f.store.load().unwrap().is_empty());
    }

    #[test]
    fn failed_destroy_keeps_registry_entry() {
        let f = fixture();
        f.engine.create_database("/srv/a");
        f.engine.fail_destroy("/srv/a");
        f.store.append(&RegistryEntry::new("a", "/srv/a")).unwrap();

        let err = f.service.delete_database("a").unwrap_err();
        assert!(matches!(err, ConsoleError::Engine(_)));
        assert_eq!(f.store.load().unwrap(), vec![RegistryEntry::new("a", "/srv/a")]);
        assert_eq!(f.engine.open_handles(), 0);
    }

    #[test]
    fn delete_locked_database_is_open_error() {
        let f = fixture();
        f.engine.create_database("/srv/a");
        f.engine.place_lock_marker("/srv/a");
        f.store.append(&RegistryEntry::new("a", "/srv/a")).unwrap();
        assert!(matches!(
            f.service.delete_database("a"),
            Err(ConsoleError::Open { .. })
        ));
        assert!(f.engine.contains("/srv/a"));
        assert_eq!(f.store.load().unwrap().len(), 1);
    }

    #[test]
    fn delete_with_storage_already_gone_removes_entry() {
        let f = fixture();
        f.store.append(&RegistryEntry::new("a", "/srv/gone")).unwrap();
        let removed = f.service.delete_database("a").unwrap();
        assert_eq!(removed.path, PathBuf::from("/srv/gone"));
        assert!(f.store.load().unwrap().is_empty());
        assert!(!f.engine.contains("/srv/gone"));
    }

    #[test]
    fn register_of_foreign_directory_leaves_its_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryRegistryStore::new());
        let service = RegistryService::new(store.clone(), Arc::new(DirectoryEngine::new()));
        let marker = dir.path().join(docdesk_engine::LOCK_MARKER);
        std::fs::write(&marker, "foreign").unwrap();

        let err = service.register_existing("x", dir.path()).unwrap_err();
        assert!(matches!(err, ConsoleError::Open { .. }));
        assert_eq!(std::fs::read_to_string(&marker).unwrap(), "foreign");
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn delete_missing_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.service.delete_database("nope"),
            Err(ConsoleError::NotFound(_))
        ));
    }

    #[test]
    fn resolve_takes_first_duplicate() {
        let f = fixture();
        f.store.append(&RegistryEntry::new("dup", "/one")).unwrap();
        f.store.append(&RegistryEntry::new("dup", "/two")).unwrap();
        assert_eq!(f.service.resolve("dup").unwrap().path, PathBuf::from("/one"));
    }

    #[test]
    fn end_to_end_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileRegistryStore::new(dir.path().join("db_registry.txt")));
        let service = RegistryService::new(store.clone(), Arc::new(DirectoryEngine::new()));

        let created = service.create_new("fresh", &dir.path().join("data")).unwrap();
        assert!(created.path.join(docdesk_engine::STORE_FILE).is_file());

        // Register the same directory under a second name.
        service.register_existing("alias", &created.path).unwrap();

        let page = service.list_page(1, 5).unwrap();
        assert_eq!(page.databases.len(), 2);
        assert!(page
            .databases
            .iter()
            .all(|d| d.probe.status == DatabaseStatus::Available));

        service.unregister("alias").unwrap();
        service.delete_database("fresh").unwrap();
        assert!(!created.path.exists());
        assert!(store.load().unwrap().is_empty());
    }
}

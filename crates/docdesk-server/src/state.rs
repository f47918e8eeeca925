use std::sync::Arc;

use docdesk_console::{DocumentService, RegistryService};
use docdesk_engine::{DirectoryEngine, DocumentEngine};
use docdesk_registry::{FileRegistryStore, RegistryStore};

use crate::config::ConsoleConfig;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConsoleConfig>,
    pub registry: Arc<RegistryService>,
    pub documents: DocumentService,
}

impl AppState {
    /// File-backed registry at `config.registry_file` over on-disk databases.
    pub fn new(config: ConsoleConfig) -> Self {
        let store = Arc::new(FileRegistryStore::new(config.registry_file.clone()));
        Self::with_backends(config, store, Arc::new(DirectoryEngine::new()))
    }

    pub fn with_backends(
        config: ConsoleConfig,
        store: Arc<dyn RegistryStore>,
        engine: Arc<dyn DocumentEngine>,
    ) -> Self {
        let registry = Arc::new(RegistryService::new(store, engine));
        Self {
            config: Arc::new(config),
            documents: DocumentService::new(Arc::clone(&registry)),
            registry,
        }
    }
}

//! Document CRUD over registered databases.

use std::sync::Arc;

use docdesk_engine::{
    AllDocsOptions, AllDocsRow, DatabaseInfo, Document, DocumentWrite, OpenOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{ConsoleError, ConsoleResult};
use crate::pagination::paginate;
use crate::probe::DatabaseStatus;
use crate::service::RegistryService;
use crate::session::with_handle;

/// One page of a database's documents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentListPage {
    pub name: String,
    pub info: DatabaseInfo,
    pub rows: Vec<AllDocsRow>,
    pub current_page: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    /// Another writer holds the database; it was read without locking.
    pub locked: bool,
    pub status_message: String,
}

/// Lists and edits the documents of databases known to a [`RegistryService`].
#[derive(Clone)]
pub struct DocumentService {
    registry: Arc<RegistryService>,
}

impl DocumentService {
    pub fn new(registry: Arc<RegistryService>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RegistryService {
        &self.registry
    }

    pub fn list(&self, db: &str, page: usize, page_size: usize) -> ConsoleResult<DocumentListPage> {
        let summary = self.registry.status(db)?;
        if summary.probe.status == DatabaseStatus::Error {
            return Err(ConsoleError::Unreachable {
                name: summary.name,
                message: summary.probe.status_message().to_string(),
            });
        }
        let locked = summary.probe.is_locked();
        let options = if locked {
            OpenOptions::read_only()
        } else {
            OpenOptions::read_write()
        };

        let page = page.max(1);
        let page_size = page_size.max(1);
        let (info, rows) = with_handle(self.registry.engine(), &summary.path, &options, |h| {
            let info = h.info()?;
            let listing = h.all_docs(&AllDocsOptions {
                include_docs: true,
                limit: Some(page_size),
                skip: (page - 1).saturating_mul(page_size),
            })?;
            Ok((info, listing.rows))
        })?;

        let total = usize::try_from(info.doc_count).unwrap_or(usize::MAX);
        let window = paginate(total, page, page_size);
        Ok(DocumentListPage {
            name: summary.name,
            info,
            rows,
            current_page: window.page,
            total_pages: window.total_pages,
            has_next_page: window.has_next,
            has_prev_page: window.has_prev,
            locked,
            status_message: summary.probe.status_message().to_string(),
        })
    }

    pub fn get(&self, db: &str, id: &str) -> ConsoleResult<Document> {
        let entry = self.registry.resolve(db)?;
        with_handle(
            self.registry.engine(),
            &entry.path,
            &OpenOptions::read_only(),
            |h| h.get(id),
        )
    }

    /// Insert a new document. An empty `_id` gets a generated UUID v7.
    pub fn create(&self, db: &str, mut doc: Document) -> ConsoleResult<DocumentWrite> {
        let entry = self.registry.resolve(db)?;
        if doc.id.is_empty() {
            doc.id = uuid::Uuid::now_v7().to_string();
        }
        doc.rev = None;
        let written = with_handle(
            self.registry.engine(),
            &entry.path,
            &OpenOptions::read_write(),
            |h| h.put(doc),
        )?;
        info!(db, id = %written.id, rev = %written.rev, "created document");
        Ok(written)
    }

    /// Replace the body of document `id`, keeping its identity.
    pub fn update(
        &self,
        db: &str,
        id: &str,
        body: Map<String, Value>,
    ) -> ConsoleResult<DocumentWrite> {
        let entry = self.registry.resolve(db)?;
        let written = with_handle(
            self.registry.engine(),
            &entry.path,
            &OpenOptions::read_write(),
            |h| {
                let current = h.get(id)?;
                h.put(Document::new(current.id, body).with_identity(id, current.rev))
            },
        )?;
        info!(db, id, rev = %written.rev, "updated document");
        Ok(written)
    }

    pub fn delete(&self, db: &str, id: &str) -> ConsoleResult<DocumentWrite> {
        let entry = self.registry.resolve(db)?;
        let removed = with_handle(
            self.registry.engine(),
            &entry.path,
            &OpenOptions::read_write(),
            |h| {
                let current = h.get(id)?;
                let rev = current.rev.unwrap_or_default();
                h.remove(id, &rev)
            },
        )?;
        info!(db, id, "deleted document");
        Ok(removed)
    }
}

//! Revision-tracked document table shared by both engine backends.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::{AllDocsOptions, AllDocsResponse, AllDocsRow, DatabaseInfo, Document, DocumentWrite};
use crate::error::{EngineError, EngineResult};

/// Number of hex characters kept from the revision digest.
const REV_HASH_LEN: usize = 32;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct DocumentTable {
    pub update_seq: u64,
    pub docs: BTreeMap<String, StoredRevision>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoredRevision {
    pub rev: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    #[serde(default)]
    pub body: Map<String, Value>,
}

impl DocumentTable {
    pub fn doc_count(&self) -> u64 {
        self.docs.values().filter(|d| !d.deleted).count() as u64
    }

    pub fn info(&self, db_name: String) -> DatabaseInfo {
        DatabaseInfo {
            db_name,
            doc_count: self.doc_count(),
            update_seq: self.update_seq,
        }
    }

    pub fn get(&self, id: &str) -> EngineResult<Document> {
        match self.docs.get(id) {
            Some(stored) if !stored.deleted => Ok(Document {
                id: id.to_string(),
                rev: Some(stored.rev.clone()),
                body: stored.body.clone(),
            }),
            _ => Err(EngineError::DocumentNotFound(id.to_string())),
        }
    }

    pub fn all_docs(&self, options: &AllDocsOptions) -> AllDocsResponse {
        let live = self.docs.iter().filter(|(_, d)| !d.deleted);
        let limit = options.limit.unwrap_or(usize::MAX);
        let rows = live
            .skip(options.skip)
            .take(limit)
            .map(|(id, stored)| AllDocsRow {
                id: id.clone(),
                rev: stored.rev.clone(),
                doc: options.include_docs.then(|| Document {
                    id: id.clone(),
                    rev: Some(stored.rev.clone()),
                    body: stored.body.clone(),
                }),
            })
            .collect();
        AllDocsResponse {
            total_rows: self.doc_count(),
            offset: options.skip,
            rows,
        }
    }

    /// Insert or update a document.
    ///
    /// A live document can only be replaced by naming its current revision.
    /// A deleted document may be recreated without a revision.
    pub fn put(&mut self, doc: Document) -> EngineResult<DocumentWrite> {
        validate_id(&doc.id)?;
        let previous = match (self.docs.get(&doc.id), doc.rev.as_deref()) {
            (Some(stored), Some(rev)) if stored.rev == rev => Some(stored.rev.clone()),
            (Some(stored), None) if stored.deleted => Some(stored.rev.clone()),
            (None, None) => None,
            _ => return Err(EngineError::Conflict { id: doc.id.clone() }),
        };

        let rev = next_revision(previous.as_deref(), &doc.body);
        self.docs.insert(
            doc.id.clone(),
            StoredRevision {
                rev: rev.clone(),
                deleted: false,
                body: doc.body,
            },
        );
        self.update_seq += 1;
        Ok(DocumentWrite { id: doc.id, rev })
    }

    /// Delete a document at the given revision.
    ///
    /// With `compact` the entry is dropped outright; otherwise a tombstone
    /// keeps the revision history so a recreated document continues it.
    pub fn remove(&mut self, id: &str, rev: &str, compact: bool) -> EngineResult<DocumentWrite> {
        let stored = match self.docs.get(id) {
            Some(stored) if !stored.deleted => stored,
            _ => return Err(EngineError::DocumentNotFound(id.to_string())),
        };
        if stored.rev != rev {
            return Err(EngineError::Conflict { id: id.to_string() });
        }

        let tombstone_rev = next_revision(Some(rev), &Map::new());
        if compact {
            self.docs.remove(id);
        } else {
            self.docs.insert(
                id.to_string(),
                StoredRevision {
                    rev: tombstone_rev.clone(),
                    deleted: true,
                    body: Map::new(),
                },
            );
        }
        self.update_seq += 1;
        Ok(DocumentWrite {
            id: id.to_string(),
            rev: tombstone_rev,
        })
    }
}

fn validate_id(id: &str) -> EngineResult<()> {
    if id.is_empty() {
        return Err(EngineError::InvalidDocument("document id must not be empty".into()));
    }
    if id.starts_with('_') && !id.starts_with("_design/") && !id.starts_with("_local/") {
        return Err(EngineError::InvalidDocument(format!(
            "document id is reserved: {id}"
        )));
    }
    Ok(())
}

/// `<generation>-<digest>`, generation counting up from the previous revision.
fn next_revision(previous: Option<&str>, body: &Map<String, Value>) -> String {
    let generation = previous
        .and_then(|rev| rev.split_once('-'))
        .and_then(|(head, _)| head.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;

    let mut hasher = blake3::Hasher::new();
    hasher.update(previous.unwrap_or_default().as_bytes());
    hasher.update(&serde_json::to_vec(body).unwrap_or_default());
    let digest = hex::encode(hasher.finalize().as_bytes());
    format!("{generation}-{}", &digest[..REV_HASH_LEN])
}

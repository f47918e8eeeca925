use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EngineError, EngineResult};

/// A JSON document with its identity fields lifted out of the body.
///
/// On the wire the document is a flat object: `_id` and `_rev` sit next to
/// the user's fields. In memory they are typed fields and `body` never
/// contains either key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id", default)]
    pub id: String,

    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Document {
    /// Create a document without a revision (a new document).
    pub fn new(id: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            rev: None,
            body: strip_reserved(body),
        }
    }

    /// Parse a document from JSON text. The text must be a JSON object.
    pub fn from_json(text: &str) -> EngineResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| EngineError::InvalidDocument(e.to_string()))?;
        Self::from_value(value)
    }

    /// Convert a JSON value into a document. The value must be an object.
    pub fn from_value(value: Value) -> EngineResult<Self> {
        if !value.is_object() {
            return Err(EngineError::InvalidDocument(
                "document must be a JSON object".into(),
            ));
        }
        let mut doc: Document = serde_json::from_value(value)
            .map_err(|e| EngineError::InvalidDocument(e.to_string()))?;
        doc.body = strip_reserved(doc.body);
        Ok(doc)
    }

    /// Replace the identity fields, keeping the body.
    pub fn with_identity(mut self, id: impl Into<String>, rev: Option<String>) -> Self {
        self.id = id.into();
        self.rev = rev;
        self
    }

    /// The flat JSON form, `_id`/`_rev` included.
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(self.body.len() + 2);
        map.insert("_id".into(), Value::String(self.id.clone()));
        if let Some(rev) = &self.rev {
            map.insert("_rev".into(), Value::String(rev.clone()));
        }
        map.extend(self.body.iter().map(|(k, v)| (k.clone(), v.clone())));
        Value::Object(map)
    }

    /// Pretty-printed JSON, as shown in an edit form.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.to_value()).unwrap_or_default()
    }
}

fn strip_reserved(mut body: Map<String, Value>) -> Map<String, Value> {
    body.remove("_id");
    body.remove("_rev");
    body
}

/// Result of the `info()` metadata query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub db_name: String,
    pub doc_count: u64,
    pub update_seq: u64,
}

/// Options for [`crate::DatabaseHandle::all_docs`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllDocsOptions {
    pub include_docs: bool,
    pub limit: Option<usize>,
    pub skip: usize,
}

/// One row of an `all_docs` listing, ordered by id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    pub rev: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<Document>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllDocsResponse {
    pub total_rows: u64,
    pub offset: usize,
    pub rows: Vec<AllDocsRow>,
}

/// Acknowledgement of a document write or removal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentWrite {
    pub id: String,
    pub rev: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_lifts_identity_fields() {
        let doc = Document::from_json(r#"{"_id":"a","_rev":"1-x","name":"Ada"}"#).unwrap();
        assert_eq!(doc.id, "a");
        assert_eq!(doc.rev.as_deref(), Some("1-x"));
        assert_eq!(doc.body.get("name"), Some(&json!("Ada")));
        assert!(!doc.body.contains_key("_id"));
        assert!(!doc.body.contains_key("_rev"));
    }

    #[test]
    fn parse_without_id_defaults_to_empty() {
        let doc = Document::from_json(r#"{"n":1}"#).unwrap();
        assert!(doc.id.is_empty());
        assert!(doc.rev.is_none());
    }

    #[test]
    fn parse_rejects_non_objects() {
        assert!(matches!(
            Document::from_json("[1,2]"),
            Err(EngineError::InvalidDocument(_))
        ));
        assert!(matches!(
            Document::from_json("not json"),
            Err(EngineError::InvalidDocument(_))
        ));
    }

    #[test]
    fn parse_rejects_non_string_id() {
        assert!(Document::from_json(r#"{"_id": 7}"#).is_err());
    }

    #[test]
    fn new_strips_reserved_keys_from_body() {
        let body = json!({"_id": "spoof", "_rev": "9-z", "k": true});
        let doc = Document::new("real", body.as_object().unwrap().clone());
        assert_eq!(doc.id, "real");
        assert_eq!(doc.body.len(), 1);
    }

    #[test]
    fn to_value_is_flat() {
        let doc = Document::new("d1", json!({"x": 1}).as_object().unwrap().clone())
            .with_identity("d1", Some("2-abc".into()));
        assert_eq!(doc.to_value(), json!({"_id": "d1", "_rev": "2-abc", "x": 1}));
    }
}

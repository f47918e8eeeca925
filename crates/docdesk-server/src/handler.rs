//! Request handlers.
//!
//! Every handler that touches the registry or a database runs the work on
//! the blocking pool. Mutations answer with a 303 redirect to the page that
//! shows the result; reads answer with the JSON view model for that page.

use std::path::PathBuf;

use axum::extract::{Form, Path, Query, State};
use axum::response::{Json, Redirect};
use docdesk_console::{DatabaseListPage, DocumentListPage};
use docdesk_engine::{Document, EngineError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// `?page=N`. Anything that is not a positive number means page 1.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<String>,
}

impl PageQuery {
    pub fn page(&self) -> usize {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<usize>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DatabaseForm {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "dbPath", default)]
    pub db_path: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DocumentForm {
    #[serde(default)]
    pub content: String,
}

/// What the new/edit document forms are filled with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEditor {
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
}

async fn blocking<T, F>(work: F) -> ServerResult<T>
where
    F: FnOnce() -> ServerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
}

fn database_location(name: &str) -> String {
    format!("/database/{}", urlencoding::encode(name))
}

fn parse_content(content: &str) -> ServerResult<Document> {
    Document::from_json(content).map_err(|e| match e {
        EngineError::InvalidDocument(msg) => ServerError::BadRequest(msg),
        other => ServerError::Internal(other.to_string()),
    })
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": "docdesk",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn list_databases(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ServerResult<Json<DatabaseListPage>> {
    let page = query.page();
    let size = state.config.list_page_size;
    let registry = state.registry.clone();
    let listing = blocking(move || Ok(registry.list_page(page, size)?)).await?;
    Ok(Json(listing))
}

pub async fn register_database(
    State(state): State<AppState>,
    Form(form): Form<DatabaseForm>,
) -> ServerResult<Redirect> {
    let registry = state.registry.clone();
    blocking(move || {
        registry.register_existing(form.name.trim(), &PathBuf::from(form.db_path.trim()))?;
        Ok(())
    })
    .await?;
    Ok(Redirect::to("/"))
}

pub async fn create_database(
    State(state): State<AppState>,
    Form(form): Form<DatabaseForm>,
) -> ServerResult<Redirect> {
    let registry = state.registry.clone();
    blocking(move || {
        registry.create_new(form.name.trim(), &PathBuf::from(form.db_path.trim()))?;
        Ok(())
    })
    .await?;
    Ok(Redirect::to("/"))
}

pub async fn show_database(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<PageQuery>,
) -> ServerResult<Json<DocumentListPage>> {
    let page = query.page();
    let size = state.config.document_page_size;
    let documents = state.documents.clone();
    let listing = blocking(move || Ok(documents.list(&name, page, size)?)).await?;
    Ok(Json(listing))
}

pub async fn delete_database(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ServerResult<Redirect> {
    let registry = state.registry.clone();
    blocking(move || {
        registry.delete_database(&name)?;
        Ok(())
    })
    .await?;
    Ok(Redirect::to("/"))
}

pub async fn unregister_database(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ServerResult<Redirect> {
    let registry = state.registry.clone();
    blocking(move || {
        registry.unregister(&name)?;
        Ok(())
    })
    .await?;
    Ok(Redirect::to("/"))
}

pub async fn new_document(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ServerResult<Json<DocumentEditor>> {
    let registry = state.registry.clone();
    let entry = blocking(move || Ok(registry.resolve(&name)?)).await?;
    Ok(Json(DocumentEditor {
        database: entry.name,
        id: None,
        content: Document::default().to_pretty_json(),
    }))
}

pub async fn create_document(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Form(form): Form<DocumentForm>,
) -> ServerResult<Redirect> {
    let doc = parse_content(&form.content)?;
    let documents = state.documents.clone();
    let location = database_location(&name);
    blocking(move || {
        documents.create(&name, doc)?;
        Ok(())
    })
    .await?;
    Ok(Redirect::to(&location))
}

pub async fn edit_document(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> ServerResult<Json<DocumentEditor>> {
    let documents = state.documents.clone();
    let doc = {
        let name = name.clone();
        blocking(move || Ok(documents.get(&name, &id)?)).await?
    };
    Ok(Json(DocumentEditor {
        database: name,
        id: Some(doc.id.clone()),
        content: doc.to_pretty_json(),
    }))
}

pub async fn update_document(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    Form(form): Form<DocumentForm>,
) -> ServerResult<Redirect> {
    let doc = parse_content(&form.content)?;
    let documents = state.documents.clone();
    let location = database_location(&name);
    blocking(move || {
        documents.update(&name, &id, doc.body)?;
        Ok(())
    })
    .await?;
    Ok(Redirect::to(&location))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> ServerResult<Redirect> {
    let documents = state.documents.clone();
    let location = database_location(&name);
    blocking(move || {
        documents.delete(&name, &id)?;
        Ok(())
    })
    .await?;
    Ok(Redirect::to(&location))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_defaults_to_first_page() {
        let q = |p: Option<&str>| PageQuery {
            page: p.map(str::to_string),
        };
        assert_eq!(q(None).page(), 1);
        assert_eq!(q(Some("3")).page(), 3);
        assert_eq!(q(Some("0")).page(), 1);
        assert_eq!(q(Some("abc")).page(), 1);
        assert_eq!(q(Some("-2")).page(), 1);
    }

    #[test]
    fn database_location_escapes_name() {
        assert_eq!(database_location("people"), "/database/people");
        assert_eq!(database_location("my db"), "/database/my%20db");
    }

    #[test]
    fn non_object_content_is_bad_request() {
        assert!(matches!(parse_content("[1, 2]"), Err(ServerError::BadRequest(_))));
        assert!(matches!(parse_content("{oops"), Err(ServerError::BadRequest(_))));
        assert!(parse_content(r#"{"_id": "a"}"#).is_ok());
    }
}

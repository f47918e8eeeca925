use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all console endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handler::list_databases))
        .route("/health", get(handler::health))
        .route("/database/register", post(handler::register_database))
        .route("/database/create", post(handler::create_database))
        .route("/database/:name", get(handler::show_database))
        .route("/database/:name/delete", post(handler::delete_database))
        .route("/database/:name/unregister", post(handler::unregister_database))
        .route("/database/:name/doc/new", get(handler::new_document))
        .route("/database/:name/doc/create", post(handler::create_document))
        .route("/database/:name/doc/:id/edit", get(handler::edit_document))
        .route("/database/:name/doc/:id/update", post(handler::update_document))
        .route("/database/:name/doc/:id/delete", post(handler::delete_document))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! HTTP server for the docdesk console.
//!
//! Serves the database list, registration and creation forms, and document
//! editing for registered databases. Pages are JSON view models; every
//! mutation redirects to the page that shows its result.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::ConsoleConfig;
pub use error::{ServerError, ServerResult};
pub use handler::DocumentEditor;
pub use router::build_router;
pub use server::DocdeskServer;
pub use state::AppState;

//! Core of the docdesk console.
//!
//! Ties the registry to the document engine:
//!
//! - [`probe`]: decides whether a database directory is available, locked by
//!   another writer, or unreachable
//! - [`pagination`]: page windows shared by the database and document lists
//! - [`service`]: [`RegistryService`], which registers, creates, lists,
//!   unregisters, and deletes databases
//! - [`documents`]: [`DocumentService`], which lists and edits documents in
//!   a registered database
//!
//! Engine calls block. Every handle opened here is closed before the call
//! that opened it returns, on success and failure alike.

pub mod documents;
pub mod error;
pub mod pagination;
pub mod probe;
pub mod service;

mod session;

pub use documents::{DocumentListPage, DocumentService};
pub use error::{ConsoleError, ConsoleResult};
pub use pagination::{paginate, PageWindow};
pub use probe::{DatabaseProbe, DatabaseStatus, ProbeReport};
pub use service::{DatabaseListPage, DatabaseSummary, RegistryService};

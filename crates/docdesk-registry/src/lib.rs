//! Registry of known databases.
//!
//! The registry maps an operator-chosen name to the filesystem path of a
//! database directory. It is persisted as a flat text file, one `name:path`
//! entry per line, in registration order. The file is the single source of
//! truth: nothing is cached between calls.
//!
//! # Modules
//!
//! - [`entry`]: [`RegistryEntry`] and the line codec
//! - [`names`]: name and path validation
//! - [`traits`]: the [`RegistryStore`] trait
//! - [`file`]: [`FileRegistryStore`], the production backend
//! - [`memory`]: [`InMemoryRegistryStore`] for tests
//!
//! # Concurrency
//!
//! Every mutation runs under a lock scoped to the store instance; the file
//! backend additionally takes an advisory lock on a sidecar `.lock` file so
//! separate processes do not lose each other's updates. Read-modify-write
//! sequences go through [`RegistryStore::modify`] or
//! [`RegistryStore::append_unique`], which hold the lock for the whole
//! sequence.

pub mod entry;
pub mod error;
pub mod file;
pub mod memory;
pub mod names;
pub mod traits;

pub use entry::{parse_registry, serialize_registry, RegistryEntry};
pub use error::{RegistryError, RegistryResult};
pub use file::FileRegistryStore;
pub use memory::InMemoryRegistryStore;
pub use names::{validate_name, validate_path};
pub use traits::RegistryStore;

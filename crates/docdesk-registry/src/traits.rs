//! The [`RegistryStore`] trait defining the registry storage interface.

use crate::entry::RegistryEntry;
use crate::error::{RegistryError, RegistryResult};

/// Storage backend for the database registry.
///
/// Implementations must be thread-safe (`Send + Sync`). The store layer
/// does not enforce name uniqueness on [`append`](Self::append); callers
/// that need it use [`append_unique`](Self::append_unique).
pub trait RegistryStore: Send + Sync {
    /// Read every entry in append order.
    ///
    /// A missing registry is created empty and yields an empty list.
    fn load(&self) -> RegistryResult<Vec<RegistryEntry>>;

    /// Append one entry. Existing entries are never rewritten.
    fn append(&self, entry: &RegistryEntry) -> RegistryResult<()>;

    /// Atomically replace the whole registry with `entries`.
    fn rewrite(&self, entries: &[RegistryEntry]) -> RegistryResult<()>;

    /// Read-modify-write under the store's exclusive lock.
    ///
    /// `change` receives the current entries and edits them in place. If it
    /// returns an error nothing is written; if it leaves the entries
    /// unchanged nothing is written either.
    fn modify(
        &self,
        change: &mut dyn FnMut(&mut Vec<RegistryEntry>) -> RegistryResult<()>,
    ) -> RegistryResult<()>;

    /// Append `entry` unless its name is already registered, checking and
    /// appending under one exclusive lock.
    fn append_unique(&self, entry: &RegistryEntry) -> RegistryResult<()>;

    /// First entry with the given name.
    fn find(&self, name: &str) -> RegistryResult<Option<RegistryEntry>> {
        Ok(self.load()?.into_iter().find(|e| e.name == name))
    }

    /// Remove every entry with the given name.
    ///
    /// Fails with [`RegistryError::NotFound`] (and writes nothing) when no
    /// entry matches. Returns the first removed entry.
    fn remove(&self, name: &str) -> RegistryResult<RegistryEntry> {
        let mut removed = None;
        self.modify(&mut |entries: &mut Vec<RegistryEntry>| {
            let first = entries
                .iter()
                .find(|e| e.name == name)
                .cloned()
                .ok_or_else(|| RegistryError::NotFound {
                    name: name.to_string(),
                })?;
            entries.retain(|e| e.name != name);
            removed = Some(first);
            Ok(())
        })?;
        removed.ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
        })
    }
}

//! In-memory registry store for testing and ephemeral use.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::entry::RegistryEntry;
use crate::error::{RegistryError, RegistryResult};
use crate::traits::RegistryStore;

/// An in-memory implementation of [`RegistryStore`].
///
/// Entries live in a `Vec` behind a `RwLock`; data is lost when the store is
/// dropped.
#[derive(Debug, Default)]
pub struct InMemoryRegistryStore {
    entries: RwLock<Vec<RegistryEntry>>,
}

impl InMemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `entries`, in order.
    pub fn with_entries(entries: Vec<RegistryEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    fn read(&self) -> RegistryResult<RwLockReadGuard<'_, Vec<RegistryEntry>>> {
        self.entries
            .read()
            .map_err(|e| RegistryError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> RegistryResult<RwLockWriteGuard<'_, Vec<RegistryEntry>>> {
        self.entries
            .write()
            .map_err(|e| RegistryError::LockPoisoned(e.to_string()))
    }
}

impl RegistryStore for InMemoryRegistryStore {
    fn load(&self) -> RegistryResult<Vec<RegistryEntry>> {
        Ok(self.read()?.clone())
    }

    fn append(&self, entry: &RegistryEntry) -> RegistryResult<()> {
        self.write()?.push(entry.clone());
        Ok(())
    }

    fn rewrite(&self, entries: &[RegistryEntry]) -> RegistryResult<()> {
        *self.write()? = entries.to_vec();
        Ok(())
    }

    fn modify(
        &self,
        change: &mut dyn FnMut(&mut Vec<RegistryEntry>) -> RegistryResult<()>,
    ) -> RegistryResult<()> {
        let mut guard = self.write()?;
        let mut next = guard.clone();
        change(&mut next)?;
        *guard = next;
        Ok(())
    }

    fn append_unique(&self, entry: &RegistryEntry) -> RegistryResult<()> {
        let mut guard = self.write()?;
        if guard.iter().any(|e| e.name == entry.name) {
            return Err(RegistryError::AlreadyRegistered {
                name: entry.name.clone(),
            });
        }
        guard.push(entry.clone());
        Ok(())
    }
}

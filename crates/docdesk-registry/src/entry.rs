//! Registry entries and the `name:path` line format.
//!
//! The first `:` on a line separates the name from the path. Names never
//! contain `:` (see [`crate::names`]), so paths may.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A registered database: operator-chosen name and directory path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub path: PathBuf,
}

impl RegistryEntry {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize as a single line, without the terminating newline.
    pub fn to_line(&self) -> String {
        format!("{}:{}", self.name, self.path.to_string_lossy())
    }

    /// Parse a `name:path` line. Returns `None` for lines without a `:`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let (name, path) = line.split_once(':')?;
        Some(Self::new(name, path))
    }
}

/// Parse registry file content. Blank lines are skipped; malformed lines are
/// logged and skipped.
pub fn parse_registry(content: &str) -> Vec<RegistryEntry> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let entry = RegistryEntry::parse_line(line);
            if entry.is_none() {
                warn!(line, "skipping malformed registry line");
            }
            entry
        })
        .collect()
}

/// Newline-joined entries, with a trailing newline only when non-empty.
pub fn serialize_registry(entries: &[RegistryEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let mut out = entries
        .iter()
        .map(RegistryEntry::to_line)
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}

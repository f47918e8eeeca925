//! Validation of names and paths before they enter the registry.
//!
//! The line format has no escaping, so a name must not contain `:` (the
//! field separator) and neither field may contain a line break.

use std::path::Path;

use crate::error::{RegistryError, RegistryResult};

const LINE_BREAKS: &[char] = &['\n', '\r'];

/// Validate a database name, returning `Ok(())` if it can be registered.
///
/// # Examples
///
/// ```
/// use docdesk_registry::names::validate_name;
///
/// assert!(validate_name("customers").is_ok());
/// assert!(validate_name("").is_err());
/// assert!(validate_name("a:b").is_err());
/// ```
pub fn validate_name(name: &str) -> RegistryResult<()> {
    let invalid = |reason: &str| RegistryError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if name.contains(':') {
        return Err(invalid("name must not contain ':'"));
    }
    if name.contains(LINE_BREAKS) {
        return Err(invalid("name must not contain line breaks"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(invalid("name must not contain path separators"));
    }
    Ok(())
}

/// Validate a database path, returning `Ok(())` if it can be registered.
pub fn validate_path(path: &Path) -> RegistryResult<()> {
    let invalid = |reason: &str| RegistryError::InvalidPath {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    // The registry file is UTF-8; a lossy conversion would store another path.
    let Some(text) = path.to_str() else {
        return Err(invalid("path must be valid UTF-8"));
    };
    if text.trim().is_empty() {
        return Err(invalid("path must not be empty"));
    }
    if text.contains(LINE_BREAKS) {
        return Err(invalid("path must not contain line breaks"));
    }
    Ok(())
}

//! Open-use-close wrapper around engine handles.

use std::path::Path;

use docdesk_engine::{DatabaseHandle, DocumentEngine, EngineResult, OpenOptions};

use crate::error::{ConsoleError, ConsoleResult};

/// Open `path`, run `work`, and close the handle whatever `work` returned.
///
/// Open failures become [`ConsoleError::Open`]; failures inside `work` or on
/// close become [`ConsoleError::Engine`]. A failure from `work` wins over a
/// failure from close.
pub(crate) fn with_handle<T>(
    engine: &dyn DocumentEngine,
    path: &Path,
    options: &OpenOptions,
    work: impl FnOnce(&mut dyn DatabaseHandle) -> EngineResult<T>,
) -> ConsoleResult<T> {
    let mut handle = engine.open(path, options).map_err(|source| ConsoleError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let out = work(handle.as_mut());
    let closed = handle.close();
    let out = out?;
    closed?;
    Ok(out)
}

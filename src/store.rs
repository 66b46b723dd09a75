//! Atomic JSON file persistence.
//!
//! Every durable file in the system (rate cache, rate history, users,
//! portfolios, session) goes through these two functions. Writes land in
//! `<path>.tmp` first and are renamed over the target, so a crash mid-write
//! never exposes a torn file to readers. There is no cross-file transaction.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::errors::CoreError;

/// Reads a JSON value from `path`, returning `default()` when the file is
/// missing or empty.
pub fn read_json_or<T, F>(path: &Path, default: F) -> Result<T, CoreError>
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    if !path.exists() {
        debug!(path = %path.display(), "file missing, using default");
        return Ok(default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        debug!(path = %path.display(), "file empty, using default");
        return Ok(default());
    }
    serde_json::from_str(&contents)
        .map_err(|e| CoreError::Storage(format!("malformed JSON in {}: {e}", path.display())))
}

/// Serializes `value` and atomically replaces `path` with it.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(&tmp, serialized)?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), "file written atomically");
    Ok(())
}

//! JSON file helpers with consistent warning logs.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::fs::io_error;
use crate::Result;

/// Read a JSON document, falling back to `T::default()`.
///
/// A missing file is expected on first start and logged at debug; an
/// unreadable or malformed file is logged as a warning.
pub fn read_json_or_default<T>(path: &Path, what: &'static str) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), what, "File not found, using defaults");
            return T::default();
        }
        Err(e) => {
            warn!(path = %path.display(), what, error = %e, "Failed to read file, using defaults");
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                path = %path.display(),
                what,
                raw_len = raw.len(),
                error = %e,
                "Malformed JSON, using defaults"
            );
            T::default()
        }
    }
}

/// Write `value` as pretty JSON, atomically replacing `path`.
///
/// The document is written to a temp file in the same directory and renamed
/// over the target, so readers see either the old or the new content.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| io_error("creating directory", dir, e))?;

    let body = serde_json::to_vec_pretty(value)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| io_error("creating temp file in", dir, e))?;
    tmp.write_all(&body)
        .map_err(|e| io_error("writing temp file for", path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| io_error("syncing temp file for", path, e))?;
    tmp.persist(path)
        .map_err(|e| io_error("replacing", path, e.error))?;
    Ok(())
}

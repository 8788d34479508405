//! Jira lookup cache file.

use crate::error::{Result, XportError};
use crate::model::MetadataCache;
use std::fs;
use std::path::Path;
use tracing::info;

/// Load a cache file. A missing file is an empty cache.
///
/// # Errors
///
/// Returns an I/O error, or `XportError::JsonFile` if the file is malformed.
pub fn load_cache(path: &Path) -> Result<MetadataCache> {
    if !path.exists() {
        return Ok(MetadataCache::new());
    }
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|source| XportError::JsonFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the cache as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_cache(path: &Path, cache: &MetadataCache) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(cache)?;
    fs::write(path, json)?;
    info!(path = %path.display(), entries = cache.len(), "Metadata saved");
    Ok(())
}

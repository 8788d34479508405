//! Backup directory scanning.
//!
//! [`collect_issue_ids`] gathers every issue id referenced by the backup and
//! aborts on malformed JSON. [`BackupSnapshot::load`] reads everything the
//! list and export commands need and skips unreadable files with a warning.

mod snapshot;

pub use snapshot::BackupSnapshot;

use crate::error::{Result, XportError};
use crate::model::normalize_id;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Filename prefixes scanned for issue ids.
pub const ID_FILE_PREFIXES: [&str; 4] = ["tests", "preconditions", "testPlans", "testSets"];

/// Top-level list keys, in lookup priority order.
pub const LIST_KEYS: [&str; 4] = ["tests", "preconditions", "testPlans", "testSets"];

/// JSON files in `dir` whose name starts with `prefix`, sorted by name.
///
/// Matching is case-sensitive so `tests*` never picks up `testSets*`.
///
/// # Errors
///
/// Returns `DirectoryNotFound` if `dir` is missing, or an I/O error if it
/// cannot be listed.
pub fn matching_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(XportError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(prefix)
            && name.ends_with(".json")
            && entry.file_type()?.is_file()
        {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Read and parse one JSON file, naming the file on failure.
///
/// # Errors
///
/// Returns an I/O error or `XportError::JsonFile`.
pub fn read_json_file(path: &Path) -> Result<Value> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|source| XportError::JsonFile {
        path: path.to_path_buf(),
        source,
    })
}

/// The first non-empty list among [`LIST_KEYS`].
#[must_use]
pub fn primary_items(document: &Value) -> &[Value] {
    LIST_KEYS
        .iter()
        .filter_map(|key| document.get(*key).and_then(Value::as_array))
        .find(|items| !items.is_empty())
        .map_or(&[], Vec::as_slice)
}

/// Collect the ids of every test, precondition, test plan and test set.
///
/// The result is sorted and deduplicated, so repeated runs over the same
/// directory always agree.
///
/// # Errors
///
/// Returns `DirectoryNotFound` for a missing directory and
/// `XportError::JsonFile` for the first malformed file.
pub fn collect_issue_ids(dir: &Path) -> Result<BTreeSet<String>> {
    let mut ids = BTreeSet::new();

    for prefix in ID_FILE_PREFIXES {
        for file in matching_files(dir, prefix)? {
            debug!(file = %file.display(), "Scanning file");
            let document = read_json_file(&file)?;
            ids.extend(
                primary_items(&document)
                    .iter()
                    .filter_map(|item| item.get("id").and_then(normalize_id)),
            );
        }
    }

    info!(count = ids.len(), dir = %dir.display(), "Collected issue ids");
    Ok(ids)
}

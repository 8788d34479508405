//! Dataset linkage and packaging. Datasets are not imported through the
//! API; they are bundled as CSV sheets for manual upload.

use crate::error::Result;
use crate::format::csv::dataset_csv;
use crate::model::{Dataset, ExportedTest};
use crate::scan::BackupSnapshot;
use crate::util::archive::write_archive;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Default bundle name.
pub const DEFAULT_DATASETS_FILE: &str = "xray_datasets.zip";

/// Datasets of keyed tests, by key. Tests without a key have no sheet name
/// and are left out.
#[must_use]
pub fn link_datasets<'a>(
    snapshot: &'a BackupSnapshot,
    tests: &[ExportedTest],
) -> BTreeMap<String, &'a Dataset> {
    tests
        .iter()
        .filter(|test| !test.key.is_empty())
        .filter_map(|test| {
            snapshot
                .dataset_for(&test.id, &test.test_version_id)
                .map(|dataset| (test.key.clone(), dataset))
        })
        .collect()
}

/// Write one `dataset_<KEY>.csv` per dataset with rows into a ZIP bundle.
/// Returns the entry names; nothing is written when no dataset has rows.
///
/// # Errors
///
/// Returns an error if the bundle cannot be written.
pub fn package_datasets(datasets: &BTreeMap<String, &Dataset>, dest: &Path) -> Result<Vec<String>> {
    let entries: Vec<(String, Vec<u8>)> = datasets
        .iter()
        .filter_map(|(key, dataset)| {
            dataset_csv(dataset).map(|csv| (format!("dataset_{key}.csv"), csv.into_bytes()))
        })
        .collect();
    if entries.is_empty() {
        return Ok(Vec::new());
    }
    write_archive(dest, &entries)?;
    info!(path = %dest.display(), sheets = entries.len(), "Datasets packaged");
    Ok(entries.into_iter().map(|(name, _)| name).collect())
}

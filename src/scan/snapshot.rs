use super::{matching_files, read_json_file};
use crate::error::Result;
use crate::metadata::load_cache;
use crate::model::{AttachmentIndex, AttachmentMeta, Dataset, MetadataCache, TestCase, TestSet};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Everything read from an unpacked backup.
#[derive(Debug, Clone, Default)]
pub struct BackupSnapshot {
    pub tests: Vec<TestCase>,
    pub datasets: Vec<Dataset>,
    pub preconditions: Vec<Value>,
    pub test_plans: Vec<Value>,
    pub test_sets: Vec<TestSet>,
    pub test_repositories: usize,
    pub issue_histories: usize,
    pub metadata: MetadataCache,
    pub attachments: AttachmentIndex,
    /// Files or items skipped while loading.
    pub warnings: Vec<String>,
}

impl BackupSnapshot {
    /// Load a backup directory, its metadata cache, and optionally the
    /// attachment metadata files next to the extracted attachments.
    ///
    /// Unreadable files and items are skipped and listed in `warnings`.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryNotFound` for a missing directory, or an error if
    /// the metadata cache exists but cannot be read.
    pub fn load(dir: &Path, attachments_dir: Option<&Path>, cache_file: &str) -> Result<Self> {
        let mut snapshot = Self::default();

        snapshot.tests = snapshot.load_items(dir, "tests", "tests")?;
        snapshot.datasets = snapshot.load_items(dir, "datasets", "datasets")?;
        snapshot.preconditions = snapshot.load_items(dir, "preconditions", "preconditions")?;
        snapshot.test_plans = snapshot.load_items(dir, "testPlans", "testPlans")?;
        snapshot.test_sets = snapshot.load_items(dir, "testSets", "testSets")?;
        snapshot.test_repositories = snapshot.count_documents(dir, "testRepository")?;
        snapshot.issue_histories = snapshot.count_documents(dir, "issueHistory")?;
        snapshot.metadata = load_cache(&dir.join(cache_file))?;

        if let Some(att_dir) = attachments_dir {
            snapshot.attachments = snapshot.load_attachment_index(att_dir)?;
        }

        debug!(
            tests = snapshot.tests.len(),
            datasets = snapshot.datasets.len(),
            test_sets = snapshot.test_sets.len(),
            metadata = snapshot.metadata.len(),
            attachments = snapshot.attachments.len(),
            "Backup snapshot loaded"
        );
        Ok(snapshot)
    }

    fn skip(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }

    fn load_items<T: DeserializeOwned>(
        &mut self,
        dir: &Path,
        prefix: &str,
        list_key: &str,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for file in matching_files(dir, prefix)? {
            let document = match read_json_file(&file) {
                Ok(document) => document,
                Err(err) => {
                    self.skip(format!("Could not load {}: {err}", file.display()));
                    continue;
                }
            };
            let Some(list) = document.get(list_key).and_then(Value::as_array) else {
                continue;
            };
            for (index, raw) in list.iter().enumerate() {
                match serde_json::from_value::<T>(raw.clone()) {
                    Ok(item) => items.push(item),
                    Err(err) => self.skip(format!(
                        "Skipping {list_key}[{index}] in {}: {err}",
                        file.display()
                    )),
                }
            }
        }
        Ok(items)
    }

    fn count_documents(&mut self, dir: &Path, prefix: &str) -> Result<usize> {
        let mut count = 0;
        for file in matching_files(dir, prefix)? {
            match read_json_file(&file) {
                Ok(_) => count += 1,
                Err(err) => self.skip(format!("Could not load {}: {err}", file.display())),
            }
        }
        Ok(count)
    }

    fn load_attachment_index(&mut self, dir: &Path) -> Result<AttachmentIndex> {
        let mut index = AttachmentIndex::new();
        for file in matching_files(dir, "metadata_")? {
            let parsed = read_json_file(&file).and_then(|document| {
                let section = document
                    .get("attachment_metadata")
                    .cloned()
                    .unwrap_or(Value::Object(serde_json::Map::new()));
                Ok(serde_json::from_value::<HashMap<String, AttachmentMeta>>(
                    section,
                )?)
            });
            match parsed {
                Ok(entries) => index.extend(entries),
                Err(err) => self.skip(format!("Could not load {}: {err}", file.display())),
            }
        }
        Ok(index)
    }

    /// Test sets that contain the given test id.
    pub fn test_sets_containing<'a>(&'a self, test_id: &'a str) -> impl Iterator<Item = &'a TestSet> {
        self.test_sets
            .iter()
            .filter(move |set| set.tests.iter().any(|id| id == test_id))
    }

    /// First dataset linked to the test's id or version id.
    #[must_use]
    pub fn dataset_for(&self, test_id: &str, test_version_id: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|dataset| {
            !dataset.test_issue_id.is_empty()
                && (dataset.test_issue_id == test_id || dataset.test_issue_id == test_version_id)
        })
    }
}

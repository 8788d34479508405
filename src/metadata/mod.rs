//! Jira metadata fetcher.
//!
//! Issue ids are split into bounded `id in (...)` searches. A failed batch
//! is logged and skipped; after a transport failure the fetcher waits the
//! configured retry delay before moving on.

mod cache;

pub use cache::{load_cache, save_cache};

use crate::client::{IssueTracker, SearchQuery};
use crate::config::MetadataSettings;
use crate::model::{IssueMetadata, MetadataCache};
use crate::util::pause;
use crate::util::progress::ProgressTracker;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Fields requested for every issue.
pub const METADATA_FIELDS: [&str; 9] = [
    "key",
    "summary",
    "description",
    "status",
    "assignee",
    "reporter",
    "issuelinks",
    "issuetype",
    "comment",
];

/// Outcome of a metadata fetch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchReport {
    pub metadata: MetadataCache,
    pub batches: usize,
    /// 1-based numbers of the batches that failed.
    pub failed_batches: Vec<usize>,
}

/// Keep numeric ids only, sort them, and split into batches of at most
/// `batch_size`. Digit strings too large for a `u64` are logged and dropped.
#[must_use]
pub fn partition_ids<'a, I>(ids: I, batch_size: usize) -> Vec<Vec<u64>>
where
    I: IntoIterator<Item = &'a str>,
{
    let numeric: BTreeSet<u64> = ids
        .into_iter()
        .filter(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|id| match id.parse::<u64>() {
            Ok(number) => Some(number),
            Err(err) => {
                warn!(id, error = %err, "Skipping id that does not fit a Jira issue id");
                None
            }
        })
        .collect();
    let numeric: Vec<u64> = numeric.into_iter().collect();

    numeric
        .chunks(batch_size.max(1))
        .map(<[u64]>::to_vec)
        .collect()
}

/// Build the search for one batch.
#[must_use]
pub fn batch_query(batch: &[u64]) -> SearchQuery {
    let list = batch
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    SearchQuery::new(format!("id in ({list})"), &METADATA_FIELDS, batch.len())
}

/// Fetch metadata for every numeric id. Never fails as a whole: failed
/// batches are recorded in the report.
pub fn fetch_metadata(
    tracker: &dyn IssueTracker,
    ids: &BTreeSet<String>,
    settings: &MetadataSettings,
    progress: &ProgressTracker,
) -> FetchReport {
    let batches = partition_ids(ids.iter().map(String::as_str), settings.batch_size);
    let total = batches.len();
    let mut report = FetchReport {
        batches: total,
        ..Default::default()
    };
    progress.bar().set_length(total as u64);

    for (index, batch) in batches.iter().enumerate() {
        let number = index + 1;
        progress.set_message(format!("batch {number}/{total}"));
        info!(batch = number, total, size = batch.len(), "Fetching metadata batch");

        match tracker.search(&batch_query(batch)) {
            Ok(issues) => {
                let before = report.metadata.len();
                report
                    .metadata
                    .extend(issues.iter().filter_map(IssueMetadata::from_jira_issue));
                let added = report.metadata.len() - before;
                if added < issues.len() {
                    warn!(
                        batch = number,
                        skipped = issues.len() - added,
                        "Some issues in batch had no usable id"
                    );
                }
            }
            Err(err) => {
                warn!(batch = number, error = %err, "Metadata batch failed");
                report.failed_batches.push(number);
                if err.is_transport() {
                    pause(settings.retry_delay);
                }
            }
        }
        progress.inc(1);
    }

    progress.finish_and_clear();
    info!(
        fetched = report.metadata.len(),
        failed = report.failed_batches.len(),
        "Metadata fetch finished"
    );
    report
}

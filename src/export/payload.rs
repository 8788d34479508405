//! Payload assembly: backup tests plus cached metadata become bulk import
//! items.

use crate::model::{ExportedTest, IssueMetadata, MetadataCache};
use crate::scan::BackupSnapshot;
use std::collections::HashMap;
use tracing::warn;

/// Keys of the given ids that the cache knows, in input order.
fn keys_for<'a, I>(ids: I, metadata: &MetadataCache) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    ids.into_iter()
        .filter_map(|id| metadata.get(id))
        .filter(|meta| !meta.key.is_empty())
        .map(|meta| meta.key.clone())
        .collect()
}

/// Build one payload item per selected test id, in selection order.
///
/// Preconditions and test sets are resolved to issue keys through the
/// metadata cache; ids the cache does not know are dropped.
#[must_use]
pub fn build_payload(snapshot: &BackupSnapshot, selected_ids: &[String]) -> Vec<ExportedTest> {
    let by_id: HashMap<&str, _> = snapshot
        .tests
        .iter()
        .map(|test| (test.id.as_str(), test))
        .collect();
    let empty = IssueMetadata::default();

    selected_ids
        .iter()
        .filter_map(|id| {
            let Some(test) = by_id.get(id.as_str()) else {
                warn!(id = %id, "Selected test is not in the backup");
                return None;
            };
            let meta = snapshot.metadata.get(id).unwrap_or(&empty);
            let mut item = ExportedTest::from_test(&meta.key, test, meta);
            item.xray_preconditions =
                keys_for(&test.pre_condition_target_issue_ids, &snapshot.metadata);
            let set_ids: Vec<String> = snapshot
                .test_sets_containing(&test.id)
                .map(|set| set.id.clone())
                .collect();
            item.xray_test_sets = keys_for(&set_ids, &snapshot.metadata);
            Some(item)
        })
        .collect()
}

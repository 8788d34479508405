//! Attachment reconciliation.
//!
//! Step text references attachments as `!xray-attachment://<id>[|label]!`.
//! Ids Xray no longer knows are re-uploaded from the backup's attachment
//! directory and every marker is rewritten to the new id.

use crate::client::{AttachmentStatus, TestTracker};
use crate::error::XportError;
use crate::model::{AttachmentIndex, ExportedTest};
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{error, info, warn};

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!xray-attachment://([a-f0-9\-]+)(?:\|[^!]*)?!").expect("marker regex")
});
static MARKER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"xray-attachment://([a-f0-9\-]+)").expect("marker id regex"));

/// Attachment ids referenced by a piece of text, in order.
#[must_use]
pub fn extract_attachment_ids(text: &str) -> Vec<String> {
    MARKER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Distinct attachment ids across every step of every test, in first-seen
/// order.
#[must_use]
pub fn collect_attachment_ids(tests: &[ExportedTest]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tests
        .iter()
        .flat_map(|test| &test.steps)
        .flat_map(|step| step.text_fields())
        .flat_map(extract_attachment_ids)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Outcome of checking every referenced attachment against Xray.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AttachmentScan {
    pub checked: usize,
    pub present: Vec<String>,
    pub missing: Vec<String>,
    /// Checks answered 401; these are neither present nor repaired.
    pub unauthorized: Vec<String>,
}

/// Check each referenced attachment. A 401 is logged as an auth fault and
/// the scan carries on; any other non-200 (or a failed request) marks the
/// id missing.
pub fn scan_attachments(tracker: &dyn TestTracker, tests: &[ExportedTest]) -> AttachmentScan {
    let mut scan = AttachmentScan::default();
    for id in collect_attachment_ids(tests) {
        scan.checked += 1;
        match tracker.attachment_status(&id) {
            Ok(AttachmentStatus::Present) => scan.present.push(id),
            Ok(AttachmentStatus::Unauthorized) => {
                error!(attachment = %id, "Attachment check was not authorized");
                scan.unauthorized.push(id);
            }
            Ok(AttachmentStatus::Missing(status)) => {
                info!(attachment = %id, status, "Attachment missing");
                scan.missing.push(id);
            }
            Err(err) => {
                warn!(attachment = %id, error = %err, "Attachment check failed, treating as missing");
                scan.missing.push(id);
            }
        }
    }
    info!(
        checked = scan.checked,
        missing = scan.missing.len(),
        unauthorized = scan.unauthorized.len(),
        "Attachments verified"
    );
    scan
}

/// Outcome of re-uploading missing attachments.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairReport {
    /// Old id -> new id.
    pub uploaded: BTreeMap<String, String>,
    /// No filename known for these ids; markers stay dangling.
    pub no_metadata: Vec<String>,
    /// Filename known but the file is not in the attachment directory.
    pub missing_file: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Re-upload missing attachments from `attachments_dir`.
///
/// The file stored under its old id is copied to its original filename and
/// uploaded under that name.
pub fn repair_missing(
    tracker: &dyn TestTracker,
    missing: &[String],
    attachments_dir: &Path,
    index: &AttachmentIndex,
) -> RepairReport {
    let mut report = RepairReport::default();
    for old_id in missing {
        let Some(meta) = index.get(old_id).filter(|meta| !meta.filename.is_empty()) else {
            warn!(attachment = %old_id, "No metadata for missing attachment, leaving it unresolved");
            report.no_metadata.push(old_id.clone());
            continue;
        };
        let source = attachments_dir.join(old_id);
        if !source.is_file() {
            warn!(attachment = %old_id, path = %source.display(), "Attachment file not found in backup");
            report.missing_file.push(old_id.clone());
            continue;
        }

        let renamed = attachments_dir.join(&meta.filename);
        let copied = if renamed == source {
            Ok(0)
        } else {
            fs::copy(&source, &renamed)
        };
        let uploaded = copied
            .and_then(|_| fs::read(&renamed))
            .map_err(XportError::from)
            .and_then(|content| tracker.upload_attachment(&meta.filename, content));
        match uploaded {
            Ok(new_id) => {
                info!(attachment = %old_id, new_id = %new_id, filename = %meta.filename, "Attachment uploaded");
                report.uploaded.insert(old_id.clone(), new_id);
            }
            Err(err) => {
                warn!(attachment = %old_id, error = %err, "Attachment upload failed");
                report.failed.push((old_id.clone(), err.to_string()));
            }
        }
    }
    report
}

/// Rewrite marker ids in `text`. Only whole ids in the mapping change;
/// labels and everything else are left byte-identical.
#[must_use]
pub fn remap_text(text: &str, mapping: &BTreeMap<String, String>) -> String {
    MARKER_ID
        .replace_all(text, |caps: &Captures<'_>| {
            let id = &caps[1];
            mapping.get(id).map_or_else(
                || caps[0].to_string(),
                |new_id| format!("xray-attachment://{new_id}"),
            )
        })
        .into_owned()
}

/// Rewrite markers in every step field. Returns the number of fields changed.
pub fn remap_markers(tests: &mut [ExportedTest], mapping: &BTreeMap<String, String>) -> usize {
    if mapping.is_empty() {
        return 0;
    }
    let mut changed = 0;
    for step in tests.iter_mut().flat_map(|test| test.steps.iter_mut()) {
        for field in step.text_fields_mut() {
            let updated = remap_text(field, mapping);
            if updated != *field {
                *field = updated;
                changed += 1;
            }
        }
    }
    changed
}

//! Bulk import submission and status polling.

use crate::client::{ImportStatus, TestTracker};
use crate::error::Result;
use crate::model::ExportedTest;
use crate::util::{PollPolicy, PollStep, poll};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// Import job status as reported by one poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "details", rename_all = "snake_case")]
pub enum UploadStatus {
    Successful,
    Failed(Value),
    PartiallySuccessful(Value),
    Unsuccessful(Value),
    InProgress,
    /// The status endpoint answered something other than 200.
    NotResponding(u16),
}

impl UploadStatus {
    #[must_use]
    pub fn from_report(report: ImportStatus) -> Self {
        match report {
            ImportStatus::NotResponding(code) => Self::NotResponding(code),
            ImportStatus::Reported(body) => {
                match body.get("status").and_then(Value::as_str).unwrap_or_default() {
                    "successful" => Self::Successful,
                    "failed" => Self::Failed(body),
                    "partially_successful" => Self::PartiallySuccessful(body),
                    "unsuccessful" => Self::Unsuccessful(body),
                    _ => Self::InProgress,
                }
            }
        }
    }

    /// Whether polling stops here.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        !matches!(self, Self::InProgress)
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Successful)
    }

    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Successful => "Export completed".to_string(),
            Self::Failed(details) => format!("Export failed: {details}"),
            Self::PartiallySuccessful(details) => format!("Export partially successful: {details}"),
            Self::Unsuccessful(details) => format!("Export unsuccessful: {details}"),
            Self::InProgress => "Export still in progress".to_string(),
            Self::NotResponding(code) => format!("Xray not responding (HTTP {code})"),
        }
    }
}

/// Result of one upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub job_id: String,
    pub submitted: usize,
    pub polls: u32,
    /// Last status seen; `None` when no poll completed.
    pub last_status: Option<UploadStatus>,
    /// The poll budget ran out before a final status.
    pub timed_out: bool,
    /// Keys of the submitted tests that already had one.
    pub updated_keys: Vec<String>,
}

/// Submit `tests` as one bulk import and poll until a final status or the
/// budget runs out. An empty list submits nothing and returns `None`.
///
/// # Errors
///
/// Returns an error when submission fails or carries no job id, or when a
/// status request cannot be sent.
pub fn upload_tests(
    tracker: &dyn TestTracker,
    tests: &[ExportedTest],
    policy: &PollPolicy,
    on_status: &mut dyn FnMut(&UploadStatus),
) -> Result<Option<UploadOutcome>> {
    if tests.is_empty() {
        info!("Nothing to upload");
        return Ok(None);
    }

    let job_id = tracker.submit_bulk_import(tests)?;
    info!(job_id = %job_id, tests = tests.len(), "Bulk import submitted");

    let mut polls = 0;
    let mut last_status = None;
    let finished = poll(policy, |attempt| {
        polls = attempt;
        let status = UploadStatus::from_report(tracker.import_status(&job_id)?);
        on_status(&status);
        let step = if status.is_final() {
            PollStep::Done(())
        } else {
            PollStep::Continue
        };
        last_status = Some(status);
        Ok(step)
    })?;

    let timed_out = finished.is_none();
    if timed_out {
        warn!(job_id = %job_id, polls, "Import status still open after poll budget");
    }
    if let Some(status) = &last_status {
        info!(job_id = %job_id, outcome = %status.message(), "Bulk import finished");
    }

    Ok(Some(UploadOutcome {
        job_id,
        submitted: tests.len(),
        polls,
        last_status,
        timed_out,
        updated_keys: tests
            .iter()
            .filter(|test| !test.key.is_empty())
            .map(|test| test.key.clone())
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryTestTracker;
    use crate::error::XportError;
    use crate::model::{ExportFields, ProjectRef, TestType};
    use serde_json::json;
    use std::time::Duration;

    fn item(key: &str) -> ExportedTest {
        ExportedTest {
            key: key.to_string(),
            kind: Value::Null,
            generic: Value::Null,
            cucumber: Value::Null,
            cucumber_type: Value::Null,
            id: "1".to_string(),
            test_version_id: String::new(),
            fields: ExportFields {
                project: key.is_empty().then(|| ProjectRef {
                    key: "P".to_string(),
                }),
                ..Default::default()
            },
            steps: Vec::new(),
            xray_issue_type: String::new(),
            xray_testtype: TestType::Manual,
            xray_preconditions: Vec::new(),
            xray_test_sets: Vec::new(),
        }
    }

    fn policy(attempts: u32) -> PollPolicy {
        PollPolicy::bounded(Duration::ZERO, attempts)
    }

    #[test]
    fn statuses_map_to_outcomes() {
        let status = |s: &str| UploadStatus::from_report(ImportStatus::Reported(json!({"status": s})));
        assert!(status("successful").is_success());
        assert!(status("failed").is_final());
        assert!(status("partially_successful").is_final());
        assert!(status("unsuccessful").is_final());
        assert!(!status("working").is_final());
        assert!(UploadStatus::NotResponding(503).is_final());
        assert_eq!(UploadStatus::NotResponding(503).message(), "Xray not responding (HTTP 503)");
    }

    #[test]
    fn empty_selection_never_submits() {
        let xray = InMemoryTestTracker::new();
        let outcome = upload_tests(&xray, &[], &policy(3), &mut |_| {}).expect("upload");
        assert!(outcome.is_none());
        assert!(xray.imports().is_empty());
    }

    #[test]
    fn polls_until_final_status() {
        let xray = InMemoryTestTracker::new().with_import_job(
            Some("job-7"),
            vec![
                ImportStatus::Reported(json!({"status": "working"})),
                ImportStatus::Reported(json!({"status": "successful"})),
            ],
        );
        let mut seen = Vec::new();
        let outcome = upload_tests(&xray, &[item("P-1"), item("")], &policy(100), &mut |s| {
            seen.push(s.clone());
        })
        .expect("upload")
        .expect("submitted");

        assert_eq!(outcome.job_id, "job-7");
        assert_eq!(outcome.polls, 2);
        assert_eq!(outcome.last_status, Some(UploadStatus::Successful));
        assert!(!outcome.timed_out);
        assert_eq!(outcome.updated_keys, vec!["P-1"]);
        assert_eq!(seen.len(), 2);
        assert_eq!(xray.imports()[0].len(), 2);
    }

    #[test]
    fn budget_exhaustion_is_reported() {
        let xray = InMemoryTestTracker::new().with_import_job(Some("job-8"), Vec::new());
        let outcome = upload_tests(&xray, &[item("P-1")], &policy(3), &mut |_| {})
            .expect("upload")
            .expect("submitted");
        assert!(outcome.timed_out);
        assert_eq!(xray.import_polls(), 3);
        assert_eq!(outcome.last_status, Some(UploadStatus::InProgress));
    }

    #[test]
    fn missing_job_id_fails() {
        let xray = InMemoryTestTracker::new().with_import_job(None, Vec::new());
        let err = upload_tests(&xray, &[item("P-1")], &policy(3), &mut |_| {}).unwrap_err();
        assert!(matches!(err, XportError::MissingJobId { .. }));
        assert_eq!(xray.import_polls(), 0);
    }
}

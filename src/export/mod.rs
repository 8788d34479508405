//! Export reconciler.
//!
//! Turns a selection of backup tests into a bulk import: builds the payload,
//! settles every key with Jira (manually or automatically), repairs
//! attachments Xray lost, packages datasets for manual upload and submits
//! the rest.
//!
//! Every step after confirmation runs against the [`ExportSession`] so the
//! order is enforced by its state.

pub mod attachments;
pub mod datasets;
pub mod payload;
pub mod prompt;
pub mod resolve;
pub mod session;
pub mod upload;
pub mod wizard;

pub use attachments::{AttachmentScan, RepairReport};
pub use payload::build_payload;
pub use prompt::{Notice, Prompter, ScriptedPrompter, StepChoice, TerminalPrompter};
pub use resolve::KeyResolution;
pub use session::{ExportSession, SessionState};
pub use upload::{UploadOutcome, UploadStatus};
pub use wizard::ConfirmMode;

use crate::client::{IssueTracker, TestTracker};
use crate::error::Result;
use crate::scan::BackupSnapshot;
use crate::util::PollPolicy;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Switches for one export run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub mode: ConfirmMode,
    /// Flat directory of attachment files named by id.
    pub attachments_dir: PathBuf,
    pub datasets_out: PathBuf,
    pub json_out: Option<PathBuf>,
    /// Stop before anything is written to Xray.
    pub dry_run: bool,
    /// Upload without asking.
    pub assume_yes: bool,
    pub poll: PollPolicy,
}

/// How one selected test ended up.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedTest {
    pub id: String,
    pub original_key: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub resolution: Option<KeyResolution>,
}

/// Everything an export run did.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub state: SessionState,
    pub selected: usize,
    pub tests: Vec<ResolvedTest>,
    /// Ids of tests left without key and project; never uploaded.
    pub blocked: Vec<String>,
    pub attachments: AttachmentScan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repair: Option<RepairReport>,
    pub remapped_fields: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasets_bundle: Option<PathBuf>,
    pub dataset_sheets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_dump: Option<PathBuf>,
    pub dry_run: bool,
    /// The operator declined the upload.
    pub declined: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadOutcome>,
}

/// Run the reconciler over the selected test ids.
///
/// # Errors
///
/// Returns an error when the operator aborts, a write to disk fails, or the
/// bulk import cannot be submitted.
pub fn run_export(
    snapshot: &BackupSnapshot,
    selected_ids: &[String],
    jira: &dyn IssueTracker,
    xray: &dyn TestTracker,
    prompter: &mut dyn Prompter,
    options: &ExportOptions,
) -> Result<ExportReport> {
    let mut session = ExportSession::new(build_payload(snapshot, selected_ids));
    info!(tests = session.len(), "Export session started");

    match options.mode {
        ConfirmMode::Manual => wizard::run_manual(&mut session, jira, prompter)?,
        ConfirmMode::Automatic { delay } => {
            let total = session.len();
            wizard::run_automatic(&mut session, jira, delay, &mut |index, resolution| {
                let notice = if matches!(resolution, KeyResolution::Blocked) {
                    Notice::Error
                } else {
                    Notice::Info
                };
                prompter.notify(
                    notice,
                    &format!("[{}/{total}] {}", index + 1, resolution.describe()),
                );
            })?;
        }
    }
    prompter.notify(Notice::Success, "All test keys prepared");

    let scan = attachments::scan_attachments(xray, session.tests());
    if !scan.unauthorized.is_empty() {
        prompter.notify(
            Notice::Error,
            &format!(
                "Xray refused {} attachment check(s); check the client credentials",
                scan.unauthorized.len()
            ),
        );
    }
    session.mark_attachments_checked()?;

    let linked = datasets::link_datasets(snapshot, session.tests());
    let dataset_sheets = datasets::package_datasets(&linked, &options.datasets_out)?;
    let datasets_bundle = (!dataset_sheets.is_empty()).then(|| options.datasets_out.clone());
    if let Some(bundle) = &datasets_bundle {
        prompter.notify(
            Notice::Warning,
            &format!(
                "Some tests contain datasets; upload them manually from {}",
                bundle.display()
            ),
        );
    }

    let blocked: Vec<String> = session.blocked().iter().map(|test| test.id.clone()).collect();
    if !blocked.is_empty() {
        warn!(count = blocked.len(), "Tests without key or project are left out of the upload");
    }

    let mut report = ExportReport {
        state: session.state(),
        selected: session.len(),
        tests: Vec::new(),
        blocked,
        attachments: scan,
        repair: None,
        remapped_fields: 0,
        datasets_bundle,
        dataset_sheets,
        json_dump: None,
        dry_run: options.dry_run,
        declined: false,
        upload: None,
    };

    let proceed = if options.dry_run {
        info!("Dry run, nothing is sent to Xray");
        false
    } else if options.assume_yes || session.is_empty() {
        true
    } else {
        let count = session.uploadable().len();
        let accepted = prompter.confirm(&format!("Upload {count} test(s) to Xray?"))?;
        report.declined = !accepted;
        accepted
    };

    if proceed {
        let repair = attachments::repair_missing(
            xray,
            &report.attachments.missing,
            &options.attachments_dir,
            &snapshot.attachments,
        );
        if !report.attachments.missing.is_empty() && repair.uploaded.is_empty() {
            prompter.notify(
                Notice::Warning,
                "No attachments were uploaded; proceeding with the original attachment ids",
            );
        }
        report.remapped_fields = attachments::remap_markers(session.tests_mut()?, &repair.uploaded);
        report.repair = Some(repair);
    }

    // The dump must exist even when the submit below fails.
    if let Some(path) = &options.json_out {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&session.uploadable())?)?;
        info!(path = %path.display(), "Payload written");
        report.json_dump = Some(path.clone());
    }

    if proceed {
        let outcome = upload::upload_tests(
            xray,
            &session.uploadable(),
            &options.poll,
            &mut |status| {
                let notice = match status {
                    UploadStatus::Successful => Notice::Success,
                    UploadStatus::InProgress => Notice::Info,
                    _ => Notice::Error,
                };
                prompter.notify(notice, &status.message());
            },
        )?;
        if let Some(outcome) = &outcome {
            session.mark_uploaded()?;
            if outcome.updated_keys.is_empty() {
                prompter.notify(Notice::Info, "No valid Jira keys were confirmed.");
            } else {
                let links: Vec<String> = outcome
                    .updated_keys
                    .iter()
                    .map(|key| format!("{key} ({})", jira.browse_url(key)))
                    .collect();
                prompter.notify(Notice::Success, &format!("Updated issues: {}", links.join(" | ")));
            }
        }
        report.upload = outcome;
    }

    report.state = session.state();
    report.tests = session
        .tests()
        .iter()
        .enumerate()
        .map(|(index, test)| ResolvedTest {
            id: test.id.clone(),
            original_key: session.original_key(index).to_string(),
            key: test.key.clone(),
            project: test.fields.project.as_ref().map(|p| p.key.clone()),
            resolution: session.resolutions().get(index).cloned().flatten(),
        })
        .collect();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ImportStatus, InMemoryIssueTracker, InMemoryTestTracker};
    use crate::model::{AttachmentMeta, ExportedTest, IssueMetadata, TestCase, TestStep};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn snapshot() -> BackupSnapshot {
        let mut snapshot = BackupSnapshot::default();
        snapshot.tests.push(TestCase {
            id: "100".to_string(),
            steps: vec![TestStep {
                action: "Open !xray-attachment://abc-1|width=300!".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        snapshot.tests.push(TestCase {
            id: "101".to_string(),
            ..Default::default()
        });
        snapshot.metadata.insert(
            "100".to_string(),
            IssueMetadata {
                key: "P-1".to_string(),
                summary: "Login".to_string(),
                issuetype: "Test".to_string(),
                ..Default::default()
            },
        );
        snapshot.attachments.insert(
            "abc-1".to_string(),
            AttachmentMeta {
                filename: "screen.png".to_string(),
            },
        );
        snapshot
    }

    fn options(dir: &TempDir) -> ExportOptions {
        ExportOptions {
            mode: ConfirmMode::Automatic {
                delay: Duration::ZERO,
            },
            attachments_dir: dir.path().join("attachments"),
            datasets_out: dir.path().join("xray_datasets.zip"),
            json_out: None,
            dry_run: false,
            assume_yes: true,
            poll: PollPolicy::bounded(Duration::ZERO, 3),
        }
    }

    fn ids() -> Vec<String> {
        vec!["100".to_string(), "101".to_string()]
    }

    #[test]
    fn dry_run_stops_before_writes() {
        let temp = TempDir::new().expect("tempdir");
        let jira = InMemoryIssueTracker::new().with_existing(["P-1"]);
        let xray = InMemoryTestTracker::new();
        let mut prompter = ScriptedPrompter::default();
        let options = ExportOptions {
            dry_run: true,
            json_out: Some(temp.path().join("out/payload.json")),
            ..options(&temp)
        };

        let report =
            run_export(&snapshot(), &ids(), &jira, &xray, &mut prompter, &options).expect("export");

        assert_eq!(report.state, SessionState::AttachmentsChecked);
        assert_eq!(report.blocked, vec!["101".to_string()]);
        assert_eq!(report.attachments.missing, vec!["abc-1".to_string()]);
        assert!(xray.imports().is_empty());
        assert!(xray.uploads().is_empty());

        let dumped: Vec<ExportedTest> =
            serde_json::from_str(&fs::read_to_string(temp.path().join("out/payload.json")).expect("read"))
                .expect("parse");
        assert_eq!(dumped.len(), 1);
        assert_eq!(dumped[0].key, "P-1");
    }

    #[test]
    fn full_run_repairs_attachments_and_uploads() {
        let temp = TempDir::new().expect("tempdir");
        let options = options(&temp);
        fs::create_dir_all(&options.attachments_dir).expect("mkdir");
        fs::write(options.attachments_dir.join("abc-1"), b"png").expect("write");

        let jira = InMemoryIssueTracker::new().with_existing(["P-1"]);
        let xray = InMemoryTestTracker::new().with_import_job(
            Some("job-1"),
            vec![
                ImportStatus::Reported(json!({"status": "working"})),
                ImportStatus::Reported(json!({"status": "successful"})),
            ],
        );
        let mut prompter = ScriptedPrompter::default();

        let report =
            run_export(&snapshot(), &ids(), &jira, &xray, &mut prompter, &options).expect("export");

        assert_eq!(report.state, SessionState::Uploaded);
        assert_eq!(report.remapped_fields, 1);
        let imports = xray.imports();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].len(), 1);
        assert_eq!(
            imports[0][0].steps[0].action,
            "Open !xray-attachment://new-1|width=300!"
        );
        assert_eq!(xray.uploads()[0].0, "screen.png");

        let upload = report.upload.expect("upload outcome");
        assert_eq!(upload.last_status, Some(UploadStatus::Successful));
        assert_eq!(upload.updated_keys, vec!["P-1".to_string()]);
        assert!(prompter.noticed(prompt::Notice::Success, "https://jira.test/browse/P-1"));
    }

    #[test]
    fn declined_upload_sends_nothing() {
        let temp = TempDir::new().expect("tempdir");
        let jira = InMemoryIssueTracker::new().with_existing(["P-1"]);
        let xray = InMemoryTestTracker::new().with_present_attachments(&["abc-1"]);
        let mut prompter = ScriptedPrompter::default().with_confirmations(&[false]);
        let options = ExportOptions {
            assume_yes: false,
            ..options(&temp)
        };

        let report =
            run_export(&snapshot(), &ids(), &jira, &xray, &mut prompter, &options).expect("export");

        assert!(report.declined);
        assert!(report.upload.is_none());
        assert!(xray.imports().is_empty());
        assert_eq!(report.tests[0].resolution, Some(KeyResolution::Existing("P-1".to_string())));
    }

    #[test]
    fn manual_quit_aborts_the_run() {
        let temp = TempDir::new().expect("tempdir");
        let jira = InMemoryIssueTracker::new();
        let xray = InMemoryTestTracker::new();
        let mut prompter = ScriptedPrompter::new(vec![StepChoice::Quit]);
        let options = ExportOptions {
            mode: ConfirmMode::Manual,
            ..options(&temp)
        };

        let err = run_export(&snapshot(), &ids(), &jira, &xray, &mut prompter, &options)
            .expect_err("aborted");
        assert!(matches!(err, crate::error::XportError::Aborted));
        assert!(xray.attachment_checks().is_empty());
    }
}

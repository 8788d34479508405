//! Export workflow over a backup on disk, driven against the in-memory
//! Jira and Xray trackers.

mod common;

use common::fixtures::{CACHE_FILE, write_backup, write_json};
use serde_json::json;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use xray_porter::client::{ImportStatus, InMemoryIssueTracker, InMemoryTestTracker};
use xray_porter::error::XportError;
use xray_porter::export::{
    ConfirmMode, ExportOptions, KeyResolution, Notice, ScriptedPrompter, SessionState, StepChoice,
    UploadStatus, run_export,
};
use xray_porter::model::ExportedTest;
use xray_porter::scan::BackupSnapshot;
use xray_porter::util::PollPolicy;

struct Fixture {
    _temp: TempDir,
    root: PathBuf,
    snapshot: BackupSnapshot,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path().to_path_buf();
    let backup = root.join("backup");
    let attachments = root.join("attachments");
    write_backup(&backup, true);
    write_json(
        &attachments,
        "metadata_1.json",
        &json!({"attachment_metadata": {"abc-1": {"filename": "login.png"}}}),
    );
    fs::write(attachments.join("abc-1"), b"png-bytes").expect("write attachment");

    let snapshot = BackupSnapshot::load(&backup, Some(&attachments), CACHE_FILE).expect("load");
    Fixture {
        _temp: temp,
        root,
        snapshot,
    }
}

fn options(root: &Path, mode: ConfirmMode) -> ExportOptions {
    ExportOptions {
        mode,
        attachments_dir: root.join("attachments"),
        datasets_out: root.join("out/xray_datasets.zip"),
        json_out: Some(root.join("out/payload.json")),
        dry_run: false,
        assume_yes: true,
        poll: PollPolicy::bounded(Duration::ZERO, 5),
    }
}

fn all_ids() -> Vec<String> {
    ["100", "101", "102"].iter().map(|id| (*id).to_string()).collect()
}

fn successful_xray() -> InMemoryTestTracker {
    InMemoryTestTracker::new().with_import_job(
        Some("job-7"),
        vec![
            ImportStatus::Reported(json!({"status": "pending"})),
            ImportStatus::Reported(json!({"status": "successful"})),
        ],
    )
}

fn zip_entry(path: &Path, name: &str) -> String {
    let mut archive = zip::ZipArchive::new(File::open(path).expect("open bundle")).expect("zip");
    let mut entry = archive.by_name(name).expect("entry");
    let mut content = String::new();
    entry.read_to_string(&mut content).expect("read entry");
    content
}

#[test]
fn automatic_export_reconciles_and_uploads() {
    let _log = common::test_log("automatic_export_reconciles_and_uploads");
    let fx = fixture();
    let jira = InMemoryIssueTracker::new()
        .with_existing(["QA-1"])
        .with_jql_result(
            "summary ~ \"Smoke script\" AND description IS EMPTY",
            &["QA-77", "QA-78"],
        );
    let xray = successful_xray();
    let mut prompter = ScriptedPrompter::default();
    let options = options(
        &fx.root,
        ConfirmMode::Automatic {
            delay: Duration::ZERO,
        },
    );

    let report = run_export(&fx.snapshot, &all_ids(), &jira, &xray, &mut prompter, &options)
        .expect("export");

    assert_eq!(report.state, SessionState::Uploaded);
    assert_eq!(report.selected, 3);
    assert_eq!(report.blocked, vec!["102".to_string()]);
    assert_eq!(report.tests[0].resolution, Some(KeyResolution::Existing("QA-1".to_string())));
    assert_eq!(report.tests[1].original_key, "QA-2");
    assert_eq!(report.tests[1].key, "QA-77");
    assert_eq!(report.tests[2].resolution, Some(KeyResolution::Blocked));
    assert!(jira.searches().iter().all(|query| !query.jql.contains("Login works")));

    // Blocked tests never reach Xray.
    let imports = xray.imports();
    assert_eq!(imports.len(), 1);
    let submitted: Vec<&str> = imports[0].iter().map(|test| test.key.as_str()).collect();
    assert_eq!(submitted, vec!["QA-1", "QA-77"]);
    assert_eq!(imports[0][0].xray_preconditions, vec!["QA-9"]);
    assert_eq!(imports[0][0].xray_test_sets, vec!["QA-20"]);
    assert_eq!(
        imports[0][0].steps[1].action,
        "Submit !xray-attachment://new-1|width=200!"
    );

    let uploads = xray.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "login.png");
    assert_eq!(uploads[0].1, b"png-bytes".to_vec());
    assert_eq!(report.remapped_fields, 1);

    assert_eq!(report.dataset_sheets, vec!["dataset_QA-1.csv".to_string()]);
    let bundle = report.datasets_bundle.clone().expect("bundle written");
    let sheet = zip_entry(&bundle, "dataset_QA-1.csv");
    assert!(sheet.starts_with("user,browser*"), "sheet: {sheet}");
    assert!(sheet.contains("alice,firefox"));

    let upload = report.upload.expect("upload outcome");
    assert_eq!(upload.job_id, "job-7");
    assert_eq!(upload.last_status, Some(UploadStatus::Successful));
    assert_eq!(upload.updated_keys, vec!["QA-1".to_string(), "QA-77".to_string()]);

    assert!(prompter.noticed(Notice::Success, "All test keys prepared"));
    assert!(prompter.noticed(Notice::Warning, "upload them manually"));
    assert!(prompter.noticed(Notice::Error, "[3/3]"));
    assert!(prompter.noticed(Notice::Success, "QA-1 (https://jira.test/browse/QA-1)"));

    let dumped: Vec<ExportedTest> =
        serde_json::from_str(&fs::read_to_string(fx.root.join("out/payload.json")).expect("dump"))
            .expect("parse dump");
    assert_eq!(dumped.len(), 2);
    assert!(dumped[0].steps[1].action.contains("new-1"));
}

#[test]
fn stale_key_without_match_creates_new_issue() {
    let _log = common::test_log("stale_key_without_match_creates_new_issue");
    let fx = fixture();
    let jira = InMemoryIssueTracker::new().with_existing(["QA-1"]);
    let xray = successful_xray();
    let mut prompter = ScriptedPrompter::default();
    let options = options(
        &fx.root,
        ConfirmMode::Automatic {
            delay: Duration::ZERO,
        },
    );

    let report = run_export(
        &fx.snapshot,
        &["101".to_string()],
        &jira,
        &xray,
        &mut prompter,
        &options,
    )
    .expect("export");

    assert_eq!(
        report.tests[0].resolution,
        Some(KeyResolution::CreateNew {
            project: "QA".to_string()
        })
    );
    assert_eq!(report.tests[0].project.as_deref(), Some("QA"));
    let imports = xray.imports();
    assert!(imports[0][0].key.is_empty());
    assert_eq!(
        imports[0][0].fields.project.as_ref().map(|p| p.key.as_str()),
        Some("QA")
    );
    assert!(report.dataset_sheets.is_empty());
    assert!(report.datasets_bundle.is_none());
    assert!(prompter.noticed(Notice::Info, "No valid Jira keys were confirmed."));
}

#[test]
fn manual_export_follows_operator_choices() {
    let _log = common::test_log("manual_export_follows_operator_choices");
    let fx = fixture();
    let jira = InMemoryIssueTracker::new().with_existing(["QA-1", "QA-55"]);
    let xray = successful_xray().with_present_attachments(&["abc-1"]);
    let mut prompter = ScriptedPrompter::new(vec![
        StepChoice::Keep,
        StepChoice::EnterKey("QA-404".to_string()),
        StepChoice::EnterKey("QA-55".to_string()),
        StepChoice::CreateNew,
        StepChoice::Skip,
    ])
    .with_confirmations(&[true]);
    let options = ExportOptions {
        assume_yes: false,
        ..options(&fx.root, ConfirmMode::Manual)
    };

    let report = run_export(&fx.snapshot, &all_ids(), &jira, &xray, &mut prompter, &options)
        .expect("export");

    assert_eq!(report.tests[0].key, "QA-1");
    assert_eq!(report.tests[1].resolution, Some(KeyResolution::Manual("QA-55".to_string())));
    assert_eq!(report.blocked, vec!["102".to_string()]);
    assert!(prompter.noticed(Notice::Error, "QA-404"));
    assert!(prompter.noticed(Notice::Success, "Valid Jira key set: QA-55"));
    assert!(prompter.noticed(Notice::Warning, "Test skipped"));

    // The attachment is still known to Xray, so nothing is re-uploaded.
    assert_eq!(report.attachments.present, vec!["abc-1".to_string()]);
    assert!(xray.uploads().is_empty());
    assert_eq!(report.remapped_fields, 0);
    assert_eq!(xray.imports()[0].len(), 2);
    assert_eq!(report.state, SessionState::Uploaded);
}

#[test]
fn declined_upload_still_writes_the_dump() {
    let _log = common::test_log("declined_upload_still_writes_the_dump");
    let fx = fixture();
    let jira = InMemoryIssueTracker::new().with_existing(["QA-1", "QA-2"]);
    let xray = successful_xray();
    let mut prompter = ScriptedPrompter::default().with_confirmations(&[false]);
    let options = ExportOptions {
        assume_yes: false,
        ..options(
            &fx.root,
            ConfirmMode::Automatic {
                delay: Duration::ZERO,
            },
        )
    };

    let report = run_export(
        &fx.snapshot,
        &["100".to_string(), "101".to_string()],
        &jira,
        &xray,
        &mut prompter,
        &options,
    )
    .expect("export");

    assert!(report.declined);
    assert!(report.upload.is_none());
    assert_eq!(report.state, SessionState::AttachmentsChecked);
    assert!(xray.imports().is_empty());
    assert!(xray.uploads().is_empty());
    assert_eq!(report.json_dump, Some(fx.root.join("out/payload.json")));
}

#[test]
fn failed_submit_keeps_the_remapped_dump() {
    let _log = common::test_log("failed_submit_keeps_the_remapped_dump");
    let fx = fixture();
    let jira = InMemoryIssueTracker::new().with_existing(["QA-1"]);
    let xray = InMemoryTestTracker::new().with_import_job(None, Vec::new());
    let mut prompter = ScriptedPrompter::default();
    let options = options(
        &fx.root,
        ConfirmMode::Automatic {
            delay: Duration::ZERO,
        },
    );

    let err = run_export(
        &fx.snapshot,
        &["100".to_string()],
        &jira,
        &xray,
        &mut prompter,
        &options,
    )
    .unwrap_err();
    assert!(matches!(err, XportError::MissingJobId { .. }), "got {err:?}");

    // The attachment went up before the submit failed.
    assert_eq!(xray.uploads().len(), 1);
    let dumped: Vec<ExportedTest> =
        serde_json::from_str(&fs::read_to_string(fx.root.join("out/payload.json")).expect("dump"))
            .expect("parse dump");
    assert_eq!(dumped.len(), 1);
    assert_eq!(dumped[0].key, "QA-1");
    assert_eq!(
        dumped[0].steps[1].action,
        "Submit !xray-attachment://new-1|width=200!"
    );
}

#[test]
fn unauthorized_attachment_checks_are_reported() {
    let _log = common::test_log("unauthorized_attachment_checks_are_reported");
    let fx = fixture();
    let jira = InMemoryIssueTracker::new().with_existing(["QA-1"]);
    let xray = successful_xray().with_unauthorized_attachments(&["abc-1"]);
    let mut prompter = ScriptedPrompter::default();
    let options = ExportOptions {
        dry_run: true,
        ..options(
            &fx.root,
            ConfirmMode::Automatic {
                delay: Duration::ZERO,
            },
        )
    };

    let report = run_export(
        &fx.snapshot,
        &["100".to_string()],
        &jira,
        &xray,
        &mut prompter,
        &options,
    )
    .expect("export");

    assert_eq!(report.attachments.unauthorized, vec!["abc-1".to_string()]);
    assert!(prompter.noticed(Notice::Error, "refused 1 attachment check(s)"));
    assert_eq!(xray.attachment_checks(), vec!["abc-1".to_string()]);
    assert!(xray.imports().is_empty());
}

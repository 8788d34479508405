//! Backup workflow: download, metadata enrichment, cache storage, and
//! reading the result back the way `list` and `export` do.

mod common;

use common::fixtures::{CACHE_FILE, write_backup};
use serde_json::{Value, json};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;
use xray_porter::backup::{BackupPaths, BackupPlan, run_backup};
use xray_porter::catalog::build_rows;
use xray_porter::client::{
    BackupArchive, BackupRequest, InMemoryIssueTracker, InMemoryTestTracker,
};
use xray_porter::config::{ConfigLayer, Settings, default_config_layer};
use xray_porter::scan::BackupSnapshot;
use xray_porter::util::archive::{contains_entry, write_archive};

fn settings(batch_size: &str) -> Settings {
    let mut layer = ConfigLayer::merge_layers(&[default_config_layer()]);
    layer.set("backup.poll-interval", "0");
    layer.set("metadata.retry-delay", "0");
    layer.set("metadata.batch-size", batch_size);
    Settings::from_layer(&layer).expect("settings")
}

/// Zip the fixture backup (without cache) and return the archive bytes.
fn base_archive(temp: &Path) -> Vec<u8> {
    let staging = temp.join("staging");
    write_backup(&staging, false);
    let mut entries: Vec<(String, Vec<u8>)> = fs::read_dir(&staging)
        .expect("list staging")
        .map(|entry| {
            let entry = entry.expect("entry");
            (
                entry.file_name().to_string_lossy().into_owned(),
                fs::read(entry.path()).expect("read fixture"),
            )
        })
        .collect();
    entries.sort();
    let zip_path = temp.join("base.zip");
    write_archive(&zip_path, &entries).expect("write zip");
    let bytes = fs::read(&zip_path).expect("read zip");
    fs::remove_file(zip_path).expect("cleanup");
    bytes
}

fn jira_issue(id: &str, key: &str, summary: &str, status: &str) -> Value {
    json!({
        "id": id,
        "key": key,
        "fields": {
            "summary": summary,
            "status": {"name": status},
            "assignee": {"displayName": "Alex"},
            "issuetype": {"name": "Test"}
        }
    })
}

fn jira() -> InMemoryIssueTracker {
    InMemoryIssueTracker::new().with_issues(vec![
        jira_issue("100", "QA-1", "Login works", "Done"),
        jira_issue("101", "QA-2", "Smoke script", "To Do"),
        jira_issue("200", "QA-9", "User exists", "Done"),
        jira_issue("300", "QA-20", "Regression", "Open"),
    ])
}

fn cache_in_archive(zip_path: &Path) -> Value {
    let mut archive = zip::ZipArchive::new(File::open(zip_path).expect("open")).expect("zip");
    let mut entry = archive.by_name(CACHE_FILE).expect("cache entry");
    let mut content = String::new();
    entry.read_to_string(&mut content).expect("read cache");
    serde_json::from_str(&content).expect("cache json")
}

#[test]
fn backup_enriches_and_lists() {
    let _log = common::test_log("backup_enriches_and_lists");
    let temp = TempDir::new().expect("tempdir");
    let out = temp.path().join("backups");
    let paths = BackupPaths::for_date(&out, out.join("xray-backup"), "2025-06-30");
    let xray = InMemoryTestTracker::new()
        .with_backup_job("job-42", &["working", "working", "successful"])
        .with_archives(base_archive(temp.path()), Vec::new());
    let jira = jira();
    let plan = BackupPlan {
        request: BackupRequest {
            with_attachment: false,
            project_ids: vec!["10000".to_string()],
            modified_since: None,
        },
        keep_extracted: true,
        ..Default::default()
    };

    let report =
        run_backup(|| Ok(&xray), &jira, &settings("2"), &paths, &plan).expect("backup");

    assert_eq!(report.job_id.as_deref(), Some("job-42"));
    assert_eq!(report.issue_ids, 5);
    assert_eq!(report.batches, 3);
    assert!(report.failed_batches.is_empty());
    assert_eq!(report.metadata_entries, 4);
    assert!(report.cache_appended);
    assert!(!report.cleaned_up);
    assert!(report.attachment_zip.is_none());
    assert_eq!(xray.downloads(), vec![BackupArchive::Base]);
    assert_eq!(xray.backup_requests()[0].project_ids, vec!["10000".to_string()]);

    let queries: Vec<String> = jira.searches().into_iter().map(|q| q.jql).collect();
    assert_eq!(
        queries,
        vec!["id in (100, 101)", "id in (102, 200)", "id in (300)"]
    );

    let cache = cache_in_archive(&paths.base_zip);
    assert_eq!(cache["100"]["key"], "QA-1");
    assert_eq!(cache["300"]["summary"], "Regression");

    let snapshot = BackupSnapshot::load(&paths.extract_dir, None, CACHE_FILE).expect("snapshot");
    let rows = build_rows(&snapshot);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].key, "QA-1");
    assert_eq!(rows[0].assignee, "Alex");
    assert_eq!(rows[0].preconditions, vec!["200".to_string()]);
    assert!(rows[0].has_dataset);
    assert_eq!(rows[1].status, "To Do");
    assert!(rows[2].key.is_empty());
}

#[test]
fn failed_batches_are_reported_not_fatal() {
    let _log = common::test_log("failed_batches_are_reported_not_fatal");
    let temp = TempDir::new().expect("tempdir");
    let out = temp.path().join("backups");
    let paths = BackupPaths::for_date(&out, out.join("xray-backup"), "2025-06-30");
    let xray = InMemoryTestTracker::new()
        .with_backup_job("job-1", &["successful"])
        .with_archives(base_archive(temp.path()), Vec::new());
    let jira = jira().failing_call(2);

    let report = run_backup(
        || Ok(&xray),
        &jira,
        &settings("2"),
        &paths,
        &BackupPlan::default(),
    )
    .expect("backup");

    assert_eq!(report.failed_batches, vec![2]);
    assert_eq!(report.metadata_entries, 3);
    assert!(report.cleaned_up);
    assert!(!paths.extract_dir.exists());

    let cache = cache_in_archive(&paths.base_zip);
    assert!(cache.get("200").is_none());
    assert_eq!(cache["101"]["key"], "QA-2");
}

#[test]
fn second_run_same_day_keeps_the_archive() {
    let _log = common::test_log("second_run_same_day_keeps_the_archive");
    let temp = TempDir::new().expect("tempdir");
    let out = temp.path().join("backups");
    let paths = BackupPaths::for_date(&out, out.join("xray-backup"), "2025-06-30");
    let xray = InMemoryTestTracker::new()
        .with_backup_job("job-1", &["successful"])
        .with_archives(base_archive(temp.path()), Vec::new());

    run_backup(|| Ok(&xray), &jira(), &settings("50"), &paths, &BackupPlan::default())
        .expect("first backup");
    let first = fs::read(&paths.base_zip).expect("archive");

    let report = run_backup(
        || -> xray_porter::Result<InMemoryTestTracker> { panic!("must not connect") },
        &jira(),
        &settings("50"),
        &paths,
        &BackupPlan::default(),
    )
    .expect("second backup");

    assert!(report.skipped_download);
    assert!(!report.cache_appended);
    assert!(contains_entry(&paths.base_zip, CACHE_FILE).expect("inspect"));
    assert_eq!(fs::read(&paths.base_zip).expect("archive"), first);
    assert_eq!(xray.downloads().len(), 1);
}

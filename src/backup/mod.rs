//! Backup fetcher.
//!
//! One run produces the dated archive pair, unpacks the base archive, collects
//! issue ids, fetches their Jira metadata and folds the resulting cache back
//! into the archive so later exports can work from the archive alone.
//!
//! An archive already present for today short-circuits the download. A base
//! archive that fails to unpack is removed again so the next run retries.

use crate::client::{BackupArchive, BackupRequest, IssueTracker, TestTracker};
use crate::config::Settings;
use crate::error::{Result, XportError};
use crate::metadata::{fetch_metadata, save_cache};
use crate::scan::collect_issue_ids;
use crate::util::archive::{append_file, contains_entry, extract_zip};
use crate::util::progress::{ProgressTracker, create_download_bar, create_spinner};
use crate::util::{PollPolicy, PollStep, poll};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Files and directories used by the backup for one date stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupPaths {
    pub base_zip: PathBuf,
    pub attachment_zip: PathBuf,
    pub extract_dir: PathBuf,
    pub attachment_dir: PathBuf,
}

impl BackupPaths {
    #[must_use]
    pub fn for_date(output_dir: &Path, extract_dir: PathBuf, stamp: &str) -> Self {
        Self {
            base_zip: output_dir.join(format!("XRAY-{stamp}.zip")),
            attachment_zip: output_dir.join(format!("XRAY-{stamp}-attachment.zip")),
            extract_dir,
            attachment_dir: output_dir.join(format!("XRAY-{stamp}-attachment")),
        }
    }
}

/// Per-run switches from the command line.
#[derive(Debug, Clone, Default)]
pub struct BackupPlan {
    pub request: BackupRequest,
    /// Download even when today's archive exists.
    pub force: bool,
    pub keep_extracted: bool,
    pub extract_attachments: bool,
    pub show_progress: bool,
}

/// What a backup run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackupReport {
    pub base_zip: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_zip: Option<PathBuf>,
    pub skipped_download: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub issue_ids: usize,
    pub metadata_entries: usize,
    pub batches: usize,
    pub failed_batches: Vec<usize>,
    pub cache_appended: bool,
    pub cleaned_up: bool,
}

/// Poll a backup job until it reports `successful`.
///
/// # Errors
///
/// Returns `XportError::BackupStatus` for any status other than `working` or
/// `successful`, or the first transport error.
pub fn wait_for_backup(
    xray: &dyn TestTracker,
    job_id: &str,
    interval: Duration,
    show_progress: bool,
) -> Result<()> {
    let spinner = create_spinner("Waiting for backup job", show_progress);
    let outcome = poll(&PollPolicy::unbounded(interval), |attempt| {
        let status = xray.backup_status(job_id)?;
        info!(
            job_id,
            attempt,
            status = %status.status,
            progress = status.progress.as_deref().unwrap_or("-"),
            "Backup job status"
        );
        match status.status.as_str() {
            "successful" => Ok(PollStep::Done(())),
            "working" => {
                if let Some(progress) = &status.progress {
                    spinner.set_message(format!("Backup in progress: {progress}"));
                }
                Ok(PollStep::Continue)
            }
            other => Err(XportError::BackupStatus {
                status: other.to_string(),
            }),
        }
    });
    spinner.finish_and_clear();
    outcome.map(|_| ())
}

/// Stream one archive to `dest`.
///
/// # Errors
///
/// Returns an error if the request or the write fails.
pub fn download_archive(
    xray: &dyn TestTracker,
    archive: BackupArchive,
    dest: &Path,
    show_progress: bool,
) -> Result<u64> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let name = dest
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    let bar = create_download_bar(&format!("Downloading {name}"), show_progress);
    let mut writer = bar.wrap_write(BufWriter::new(File::create(dest)?));
    let written = xray.download_backup(archive, &mut writer)?;
    writer.flush()?;
    bar.finish_and_clear();
    info!(path = %dest.display(), bytes = written, "Archive downloaded");
    Ok(written)
}

/// Trigger a backup, wait for it, download both archives and unpack them.
///
/// A missing job id means a backup may already be queued; the archives are
/// downloaded directly.
///
/// # Errors
///
/// Returns an error on authentication failure, an unexpected job status, a
/// failed download, or an archive that cannot be unpacked.
pub fn fetch_backup(
    xray: &dyn TestTracker,
    paths: &BackupPaths,
    plan: &BackupPlan,
    poll_interval: Duration,
) -> Result<Option<String>> {
    let job_id = xray.start_backup(&plan.request)?;
    match &job_id {
        Some(job_id) => {
            info!(job_id = %job_id, "Backup job started");
            wait_for_backup(xray, job_id, poll_interval, plan.show_progress)?;
        }
        None => warn!("Backup job id missing; a backup may already be queued, downloading directly"),
    }

    download_archive(xray, BackupArchive::Base, &paths.base_zip, plan.show_progress)?;
    if plan.request.with_attachment {
        download_archive(
            xray,
            BackupArchive::Attachments,
            &paths.attachment_zip,
            plan.show_progress,
        )?;
    }

    unpack_base(paths)?;
    if plan.request.with_attachment && plan.extract_attachments {
        let entries = extract_zip(&paths.attachment_zip, &paths.attachment_dir)?;
        info!(entries, dir = %paths.attachment_dir.display(), "Attachments extracted");
    }
    Ok(job_id)
}

/// Unpack the base archive into the extract directory. A corrupt archive is
/// deleted so it no longer marks the day as backed up.
fn unpack_base(paths: &BackupPaths) -> Result<()> {
    match extract_zip(&paths.base_zip, &paths.extract_dir) {
        Ok(entries) => {
            info!(entries, dir = %paths.extract_dir.display(), "Backup extracted");
            Ok(())
        }
        Err(err) => {
            warn!(path = %paths.base_zip.display(), error = %err, "Removing archive that failed to unpack");
            if let Err(remove_err) = fs::remove_file(&paths.base_zip) {
                warn!(error = %remove_err, "Could not remove broken archive");
            }
            Err(err)
        }
    }
}

/// Full backup flow: download (unless today's archive exists), collect ids,
/// fetch metadata, store the cache in the archive, and clean up.
///
/// `connect_xray` is only called when a download is needed.
///
/// # Errors
///
/// Returns an error for any fatal condition of the download, a missing
/// extract directory, a malformed backup file, or a failed archive update.
pub fn run_backup<T, F>(
    connect_xray: F,
    jira: &dyn IssueTracker,
    settings: &Settings,
    paths: &BackupPaths,
    plan: &BackupPlan,
) -> Result<BackupReport>
where
    T: TestTracker,
    F: FnOnce() -> Result<T>,
{
    let mut report = BackupReport {
        base_zip: paths.base_zip.clone(),
        ..Default::default()
    };

    if paths.base_zip.exists() && !plan.force {
        info!(path = %paths.base_zip.display(), "Already backed up today, skipping download");
        report.skipped_download = true;
        if !paths.extract_dir.is_dir() {
            unpack_base(paths)?;
        }
    } else {
        let xray = connect_xray()?;
        report.job_id = fetch_backup(&xray, paths, plan, settings.backup.poll_interval)?;
    }
    if paths.attachment_zip.exists() {
        report.attachment_zip = Some(paths.attachment_zip.clone());
    }

    if !paths.extract_dir.is_dir() {
        return Err(XportError::DirectoryNotFound {
            path: paths.extract_dir.clone(),
        });
    }

    let ids = collect_issue_ids(&paths.extract_dir)?;
    report.issue_ids = ids.len();

    let progress = if plan.show_progress {
        ProgressTracker::new(0, "Fetching Jira metadata")
    } else {
        ProgressTracker::hidden()
    };
    let fetched = fetch_metadata(jira, &ids, &settings.metadata, &progress);
    report.metadata_entries = fetched.metadata.len();
    report.batches = fetched.batches;
    report.failed_batches = fetched.failed_batches;

    let cache_name = settings.backup.cache_file.as_str();
    let cache_path = paths.extract_dir.join(cache_name);
    save_cache(&cache_path, &fetched.metadata)?;

    if contains_entry(&paths.base_zip, cache_name)? {
        warn!(entry = cache_name, "Archive already holds a metadata cache, leaving it untouched");
    } else {
        append_file(&paths.base_zip, &cache_path, cache_name)?;
        report.cache_appended = true;
        info!(path = %paths.base_zip.display(), entry = cache_name, "Metadata cache added to archive");
    }

    if !plan.keep_extracted {
        fs::remove_dir_all(&paths.extract_dir)?;
        report.cleaned_up = true;
        info!(dir = %paths.extract_dir.display(), "Extracted backup removed");
    }

    Ok(report)
}

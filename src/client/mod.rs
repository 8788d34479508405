//! Remote service seams.
//!
//! Workflows talk to Jira through [`IssueTracker`] and to Xray Cloud through
//! [`TestTracker`]. The `reqwest::blocking` implementations live in
//! [`jira`] and [`xray`]; [`memory`] holds scripted in-memory versions used
//! by the test suites.

pub mod jira;
pub mod memory;
pub mod xray;

pub use jira::JiraClient;
pub use memory::{InMemoryIssueTracker, InMemoryTestTracker};
pub use xray::XrayClient;

use crate::error::Result;
use crate::model::ExportedTest;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;

/// A Jira search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub jql: String,
    pub fields: Vec<String>,
    pub max_results: usize,
}

impl SearchQuery {
    #[must_use]
    pub fn new(jql: impl Into<String>, fields: &[&str], max_results: usize) -> Self {
        Self {
            jql: jql.into(),
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
            max_results,
        }
    }
}

/// Issue tracker operations used by the metadata fetcher and reconciler.
pub trait IssueTracker {
    /// Run a JQL search and return the raw `issues` array.
    ///
    /// # Errors
    ///
    /// Returns `XportError::Http` for non-200 responses, `Transport` for
    /// network failures, and `UnexpectedResponse` for unparseable bodies.
    fn search(&self, query: &SearchQuery) -> Result<Vec<Value>>;

    /// Whether `GET /rest/api/2/issue/{key}` answers 200.
    ///
    /// # Errors
    ///
    /// Returns an error only when no response was received.
    fn issue_exists(&self, key: &str) -> Result<bool>;

    /// Human link to an issue.
    fn browse_url(&self, key: &str) -> String;
}

/// Backup job request body.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackupRequest {
    pub with_attachment: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub project_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_since: Option<String>,
}

/// Snapshot of a running backup job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupJobStatus {
    pub status: String,
    pub progress: Option<String>,
}

/// Which backup archive to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupArchive {
    Base,
    Attachments,
}

impl BackupArchive {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Base => "/api/v2/backup/file",
            Self::Attachments => "/api/v2/backup/file/attachment",
        }
    }
}

/// Result of an attachment existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentStatus {
    Present,
    Unauthorized,
    Missing(u16),
}

/// Result of one bulk import status poll.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportStatus {
    /// Status endpoint answered 200 with this body.
    Reported(Value),
    /// Status endpoint answered something else.
    NotResponding(u16),
}

/// Test tracker operations used by the backup fetcher and reconciler.
pub trait TestTracker {
    /// Trigger a backup job. `Ok(None)` when no job id came back.
    ///
    /// # Errors
    ///
    /// Returns an error for authentication or transport failures.
    fn start_backup(&self, request: &BackupRequest) -> Result<Option<String>>;

    /// # Errors
    ///
    /// Returns an error for non-200 answers or unparseable bodies.
    fn backup_status(&self, job_id: &str) -> Result<BackupJobStatus>;

    /// Stream a backup archive into `dest`, returning the bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error for non-200 answers or write failures.
    fn download_backup(&self, archive: BackupArchive, dest: &mut dyn Write) -> Result<u64>;

    /// # Errors
    ///
    /// Returns an error only when no response was received.
    fn attachment_status(&self, attachment_id: &str) -> Result<AttachmentStatus>;

    /// Upload a file and return the new attachment id.
    ///
    /// # Errors
    ///
    /// Returns an error for non-200 answers or a response without an id.
    fn upload_attachment(&self, filename: &str, content: Vec<u8>) -> Result<String>;

    /// Submit a bulk import and return its job id.
    ///
    /// # Errors
    ///
    /// Returns `XportError::Http` unless the answer is 200/202, and
    /// `MissingJobId` when the body carries no job id.
    fn submit_bulk_import(&self, tests: &[ExportedTest]) -> Result<String>;

    /// # Errors
    ///
    /// Returns an error only when no response was received.
    fn import_status(&self, job_id: &str) -> Result<ImportStatus>;
}

impl<T: TestTracker + ?Sized> TestTracker for &T {
    fn start_backup(&self, request: &BackupRequest) -> Result<Option<String>> {
        (**self).start_backup(request)
    }

    fn backup_status(&self, job_id: &str) -> Result<BackupJobStatus> {
        (**self).backup_status(job_id)
    }

    fn download_backup(&self, archive: BackupArchive, dest: &mut dyn Write) -> Result<u64> {
        (**self).download_backup(archive, dest)
    }

    fn attachment_status(&self, attachment_id: &str) -> Result<AttachmentStatus> {
        (**self).attachment_status(attachment_id)
    }

    fn upload_attachment(&self, filename: &str, content: Vec<u8>) -> Result<String> {
        (**self).upload_attachment(filename, content)
    }

    fn submit_bulk_import(&self, tests: &[ExportedTest]) -> Result<String> {
        (**self).submit_bulk_import(tests)
    }

    fn import_status(&self, job_id: &str) -> Result<ImportStatus> {
        (**self).import_status(job_id)
    }
}

/// Read a JSON body, mapping parse failures to `UnexpectedResponse`.
pub(crate) fn json_body(response: reqwest::blocking::Response, url: &str) -> Result<Value> {
    let text = response.text()?;
    serde_json::from_str(&text).map_err(|e| crate::error::XportError::UnexpectedResponse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Short, single-line excerpt of a response body for error messages.
pub(crate) fn body_excerpt(body: &str) -> String {
    const LIMIT: usize = 300;
    let flat = body.replace(['\n', '\r'], " ");
    if flat.chars().count() > LIMIT {
        let cut: String = flat.chars().take(LIMIT).collect();
        format!("{cut}...")
    } else {
        flat
    }
}

//! In-memory service implementations.
//!
//! Both trackers answer from scripted data and record every call so tests
//! can assert on what a workflow asked for. Interior mutability uses
//! `RefCell` because the traits are only ever driven from one thread.

use super::{
    AttachmentStatus, BackupArchive, BackupJobStatus, BackupRequest, ImportStatus, IssueTracker,
    SearchQuery, TestTracker,
};
use crate::error::{Result, XportError};
use crate::model::{ExportedTest, normalize_id};
use serde_json::{Value, json};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Write;

/// Scripted Jira.
#[derive(Debug, Default)]
pub struct InMemoryIssueTracker {
    base_url: String,
    existing: HashSet<String>,
    issues: Vec<Value>,
    jql_results: HashMap<String, Vec<String>>,
    failing_calls: HashSet<usize>,
    search_calls: Cell<usize>,
    searches: RefCell<Vec<SearchQuery>>,
    exists_checks: RefCell<Vec<String>>,
}

impl InMemoryIssueTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: "https://jira.test".to_string(),
            ..Default::default()
        }
    }

    /// Keys that answer 200 on the existence check.
    #[must_use]
    pub fn with_existing<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.existing.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Raw issues served to `id in (...)` searches.
    #[must_use]
    pub fn with_issues(mut self, issues: Vec<Value>) -> Self {
        self.issues.extend(issues);
        self
    }

    /// Keys returned for an exact JQL string.
    #[must_use]
    pub fn with_jql_result(mut self, jql: impl Into<String>, keys: &[&str]) -> Self {
        self.jql_results
            .insert(jql.into(), keys.iter().map(|k| (*k).to_string()).collect());
        self
    }

    /// Make the n-th search call (1-based) answer HTTP 500.
    #[must_use]
    pub fn failing_call(mut self, call: usize) -> Self {
        self.failing_calls.insert(call);
        self
    }

    #[must_use]
    pub fn searches(&self) -> Vec<SearchQuery> {
        self.searches.borrow().clone()
    }

    #[must_use]
    pub fn exists_checks(&self) -> Vec<String> {
        self.exists_checks.borrow().clone()
    }

    fn ids_in(jql: &str) -> Option<HashSet<String>> {
        let inner = jql.strip_prefix("id in (")?.strip_suffix(')')?;
        Some(
            inner
                .split(',')
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        )
    }
}

impl IssueTracker for InMemoryIssueTracker {
    fn search(&self, query: &SearchQuery) -> Result<Vec<Value>> {
        let call = self.search_calls.get() + 1;
        self.search_calls.set(call);
        self.searches.borrow_mut().push(query.clone());

        if self.failing_calls.contains(&call) {
            return Err(XportError::Http {
                status: 500,
                url: format!("{}/rest/api/2/search", self.base_url),
                body: "scripted failure".to_string(),
            });
        }

        if let Some(ids) = Self::ids_in(&query.jql) {
            return Ok(self
                .issues
                .iter()
                .filter(|issue| {
                    issue
                        .get("id")
                        .and_then(normalize_id)
                        .is_some_and(|id| ids.contains(&id))
                })
                .take(query.max_results)
                .cloned()
                .collect());
        }

        Ok(self
            .jql_results
            .get(&query.jql)
            .map(|keys| {
                keys.iter()
                    .take(query.max_results)
                    .map(|key| json!({"key": key}))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn issue_exists(&self, key: &str) -> Result<bool> {
        self.exists_checks.borrow_mut().push(key.to_string());
        Ok(self.existing.contains(key))
    }

    fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{key}", self.base_url)
    }
}

/// Scripted Xray.
#[derive(Debug, Default)]
pub struct InMemoryTestTracker {
    backup_job: Option<String>,
    backup_statuses: RefCell<VecDeque<String>>,
    base_archive: Vec<u8>,
    attachment_archive: Vec<u8>,
    present: HashSet<String>,
    unauthorized: HashSet<String>,
    rejected_uploads: HashSet<String>,
    import_job: Option<String>,
    import_statuses: RefCell<VecDeque<ImportStatus>>,
    backup_requests: RefCell<Vec<BackupRequest>>,
    downloads: RefCell<Vec<BackupArchive>>,
    attachment_checks: RefCell<Vec<String>>,
    uploads: RefCell<Vec<(String, Vec<u8>)>>,
    imports: RefCell<Vec<Vec<ExportedTest>>>,
    import_polls: Cell<usize>,
}

impl InMemoryTestTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Job id returned by `start_backup`, and the statuses its polls see.
    /// The last status repeats once the script runs out.
    #[must_use]
    pub fn with_backup_job(mut self, job_id: &str, statuses: &[&str]) -> Self {
        self.backup_job = Some(job_id.to_string());
        self.backup_statuses = RefCell::new(statuses.iter().map(|s| (*s).to_string()).collect());
        self
    }

    #[must_use]
    pub fn with_archives(mut self, base: Vec<u8>, attachments: Vec<u8>) -> Self {
        self.base_archive = base;
        self.attachment_archive = attachments;
        self
    }

    /// Attachment ids the existence check finds.
    #[must_use]
    pub fn with_present_attachments(mut self, ids: &[&str]) -> Self {
        self.present.extend(ids.iter().map(|id| (*id).to_string()));
        self
    }

    /// Attachment ids whose existence check answers 401.
    #[must_use]
    pub fn with_unauthorized_attachments(mut self, ids: &[&str]) -> Self {
        self.unauthorized
            .extend(ids.iter().map(|id| (*id).to_string()));
        self
    }

    /// Filenames whose upload is refused.
    #[must_use]
    pub fn rejecting_upload(mut self, filename: &str) -> Self {
        self.rejected_uploads.insert(filename.to_string());
        self
    }

    /// Job id for bulk imports (`None` answers without one) and the status
    /// polls it reports. The last status repeats once the script runs out.
    #[must_use]
    pub fn with_import_job(mut self, job_id: Option<&str>, statuses: Vec<ImportStatus>) -> Self {
        self.import_job = job_id.map(str::to_string);
        self.import_statuses = RefCell::new(statuses.into());
        self
    }

    #[must_use]
    pub fn backup_requests(&self) -> Vec<BackupRequest> {
        self.backup_requests.borrow().clone()
    }

    #[must_use]
    pub fn downloads(&self) -> Vec<BackupArchive> {
        self.downloads.borrow().clone()
    }

    #[must_use]
    pub fn attachment_checks(&self) -> Vec<String> {
        self.attachment_checks.borrow().clone()
    }

    #[must_use]
    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.uploads.borrow().clone()
    }

    #[must_use]
    pub fn imports(&self) -> Vec<Vec<ExportedTest>> {
        self.imports.borrow().clone()
    }

    #[must_use]
    pub fn import_polls(&self) -> usize {
        self.import_polls.get()
    }

    fn next_scripted<T: Clone>(queue: &RefCell<VecDeque<T>>) -> Option<T> {
        let mut queue = queue.borrow_mut();
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl TestTracker for InMemoryTestTracker {
    fn start_backup(&self, request: &BackupRequest) -> Result<Option<String>> {
        self.backup_requests.borrow_mut().push(request.clone());
        Ok(self.backup_job.clone())
    }

    fn backup_status(&self, _job_id: &str) -> Result<BackupJobStatus> {
        let status = Self::next_scripted(&self.backup_statuses).unwrap_or_default();
        Ok(BackupJobStatus {
            status,
            progress: None,
        })
    }

    fn download_backup(&self, archive: BackupArchive, dest: &mut dyn Write) -> Result<u64> {
        self.downloads.borrow_mut().push(archive);
        let bytes = match archive {
            BackupArchive::Base => &self.base_archive,
            BackupArchive::Attachments => &self.attachment_archive,
        };
        dest.write_all(bytes)?;
        Ok(bytes.len() as u64)
    }

    fn attachment_status(&self, attachment_id: &str) -> Result<AttachmentStatus> {
        self.attachment_checks
            .borrow_mut()
            .push(attachment_id.to_string());
        Ok(if self.unauthorized.contains(attachment_id) {
            AttachmentStatus::Unauthorized
        } else if self.present.contains(attachment_id) {
            AttachmentStatus::Present
        } else {
            AttachmentStatus::Missing(404)
        })
    }

    fn upload_attachment(&self, filename: &str, content: Vec<u8>) -> Result<String> {
        if self.rejected_uploads.contains(filename) {
            return Err(XportError::Http {
                status: 400,
                url: "memory://api/v1/attachments".to_string(),
                body: "scripted rejection".to_string(),
            });
        }
        let mut uploads = self.uploads.borrow_mut();
        uploads.push((filename.to_string(), content));
        Ok(format!("new-{}", uploads.len()))
    }

    fn submit_bulk_import(&self, tests: &[ExportedTest]) -> Result<String> {
        self.imports.borrow_mut().push(tests.to_vec());
        self.import_job.clone().ok_or_else(|| XportError::MissingJobId {
            operation: "bulk import".to_string(),
        })
    }

    fn import_status(&self, _job_id: &str) -> Result<ImportStatus> {
        self.import_polls.set(self.import_polls.get() + 1);
        Ok(Self::next_scripted(&self.import_statuses)
            .unwrap_or(ImportStatus::Reported(json!({"status": "working"}))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_search_filters_issues() {
        let jira = InMemoryIssueTracker::new().with_issues(vec![
            json!({"id": "100", "key": "P-1"}),
            json!({"id": 101, "key": "P-2"}),
            json!({"id": "102", "key": "P-3"}),
        ]);
        let hits = jira
            .search(&SearchQuery::new("id in (100, 102)", &["key"], 50))
            .expect("search");
        let keys: Vec<_> = hits.iter().map(|h| h["key"].clone()).collect();
        assert_eq!(keys, vec![json!("P-1"), json!("P-3")]);
    }

    #[test]
    fn scripted_statuses_repeat_last() {
        let xray = InMemoryTestTracker::new().with_backup_job("job", &["working", "successful"]);
        assert_eq!(xray.backup_status("job").expect("status").status, "working");
        assert_eq!(xray.backup_status("job").expect("status").status, "successful");
        assert_eq!(xray.backup_status("job").expect("status").status, "successful");
    }

    #[test]
    fn uploads_get_fresh_ids() {
        let xray = InMemoryTestTracker::new();
        assert_eq!(xray.upload_attachment("a.png", vec![1]).expect("upload"), "new-1");
        assert_eq!(xray.upload_attachment("b.png", vec![2]).expect("upload"), "new-2");
        assert_eq!(xray.uploads().len(), 2);
    }
}

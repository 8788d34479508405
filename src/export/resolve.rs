//! Key resolution against Jira.
//!
//! A test keeps its key when Jira knows it. Otherwise the first issue whose
//! summary and description match wins, and failing that the test is queued
//! for creation in the project its old key came from. Matching is a best
//! effort: Jira's result order decides between several hits.

use crate::client::{IssueTracker, SearchQuery};
use crate::model::{ExportedTest, ProjectRef, is_issue_key, project_prefix};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// Upper bound on summary/description matches requested.
pub const MATCH_LIMIT: usize = 50;

/// How a test's key was settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "resolution", content = "value", rename_all = "snake_case")]
pub enum KeyResolution {
    /// Current key exists in Jira.
    Existing(String),
    /// First summary/description match.
    Matched(String),
    /// Key typed and validated by the operator.
    Manual(String),
    /// No key; Xray creates a new issue in this project.
    CreateNew { project: String },
    /// No key and no project to create one in. Never uploaded.
    Blocked,
}

impl KeyResolution {
    /// Write the resolution into a payload item.
    pub fn apply(&self, test: &mut ExportedTest) {
        match self {
            Self::Existing(key) | Self::Matched(key) | Self::Manual(key) => {
                test.key.clone_from(key);
                test.fields.project = None;
            }
            Self::CreateNew { project } => {
                test.key.clear();
                test.fields.project = Some(ProjectRef {
                    key: project.clone(),
                });
            }
            Self::Blocked => {
                test.key.clear();
                test.fields.project = None;
            }
        }
    }

    /// The key the test ends up with, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Existing(key) | Self::Matched(key) | Self::Manual(key) => Some(key),
            Self::CreateNew { .. } | Self::Blocked => None,
        }
    }

    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Existing(key) => format!("existing key {key} is valid"),
            Self::Matched(key) => format!("matched by summary/description: {key}"),
            Self::Manual(key) => format!("key set manually: {key}"),
            Self::CreateNew { project } => format!("new issue will be created in project {project}"),
            Self::Blocked => "no match and no project prefix; test will not be uploaded".to_string(),
        }
    }
}

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"h[1-6]\.\s*").expect("heading regex"));
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("bold regex"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_(.*?)_").expect("italic regex"));
static MONOSPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("monospace regex"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\|(.*?)\]").expect("link regex"));
static IMAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!(.*?)!").expect("image regex"));
static LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[*#\-]+ ").expect("list regex"));
static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\\\").expect("line break regex"));
static BRACKET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\[\]]").expect("bracket regex"));

/// Strip Jira wiki markup down to plain text.
///
/// Applied in order: headings, bold, italic, monospace, links (label kept),
/// images, list bullets, `\\` line breaks, leftover brackets.
#[must_use]
pub fn strip_wiki_markup(text: &str) -> String {
    let text = HEADING.replace_all(text, "");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = MONOSPACE.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = IMAGE.replace_all(&text, "");
    let text = LIST.replace_all(&text, "");
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = BRACKET.replace_all(&text, "");
    text.trim().to_string()
}

/// Escape a value for a double-quoted JQL string.
#[must_use]
pub fn escape_jql(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Search for issues with this summary and description. An empty
/// description matches issues without one.
#[must_use]
pub fn match_query(summary: &str, description: &str) -> SearchQuery {
    let summary = escape_jql(summary);
    let jql = if description.trim().is_empty() {
        format!("summary ~ \"{summary}\" AND description IS EMPTY")
    } else {
        let description = escape_jql(&strip_wiki_markup(description));
        format!("summary ~ \"{summary}\" AND description ~ \"{description}\"")
    };
    SearchQuery::new(jql, &["key"], MATCH_LIMIT)
}

/// Whether Jira knows `key`. A failed check counts as unknown, and text
/// that is not shaped like an issue key is never sent.
pub fn key_exists(tracker: &dyn IssueTracker, key: &str) -> bool {
    if key.is_empty() {
        return false;
    }
    if !is_issue_key(key) {
        warn!(key, "Not an issue key, skipping the Jira check");
        return false;
    }
    match tracker.issue_exists(key) {
        Ok(exists) => exists,
        Err(err) => {
            warn!(key, error = %err, "Key check failed, treating key as unknown");
            false
        }
    }
}

/// Keys of issues matching the test's summary and description, best first.
/// A failed search yields no matches.
pub fn find_matches(tracker: &dyn IssueTracker, summary: &str, description: &str) -> Vec<String> {
    let query = match_query(summary, description);
    debug!(jql = %query.jql, "Searching for matching issue");
    match tracker.search(&query) {
        Ok(issues) => issues
            .iter()
            .filter_map(|issue| issue.get("key").and_then(Value::as_str))
            .map(str::to_string)
            .collect(),
        Err(err) => {
            warn!(error = %err, "Summary search failed");
            Vec::new()
        }
    }
}

/// Resolution for a test that will be created as a new issue. The project
/// comes from the first candidate key with a prefix.
#[must_use]
pub fn create_new(candidates: &[&str]) -> KeyResolution {
    candidates
        .iter()
        .find_map(|key| project_prefix(key))
        .map_or(KeyResolution::Blocked, |project| KeyResolution::CreateNew { project })
}

/// Resolve a key without operator input: keep a valid key, else take the
/// first match, else create new (or block when no project is derivable).
///
/// `original_key` is the key the test had in the backup; it is a fallback
/// source for the project prefix.
pub fn resolve_automatic(
    tracker: &dyn IssueTracker,
    test: &ExportedTest,
    original_key: &str,
) -> KeyResolution {
    if key_exists(tracker, &test.key) {
        return KeyResolution::Existing(test.key.clone());
    }
    let resolution = find_matches(tracker, &test.fields.summary, &test.fields.description)
        .into_iter()
        .next()
        .map_or_else(
            || create_new(&[test.key.as_str(), original_key]),
            KeyResolution::Matched,
        );
    match &resolution {
        KeyResolution::Blocked => warn!(
            id = %test.id,
            "No match and cannot detect project prefix; test will not be uploaded"
        ),
        other => info!(id = %test.id, "{}", other.describe()),
    }
    resolution
}

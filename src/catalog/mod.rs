//! Test catalog: the filterable, sortable table behind `xport list` and the
//! export selection.

use crate::error::{Result, XportError, find_similar_keys};
use crate::model::{IssueMetadata, TestType};
use crate::scan::BackupSnapshot;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// One row of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogRow {
    /// 1-based position in backup order.
    pub index: usize,
    pub id: String,
    pub key: String,
    pub summary: String,
    pub assignee: String,
    pub reporter: String,
    pub status: String,
    pub test_type: TestType,
    pub step_count: usize,
    pub preconditions: Vec<String>,
    pub has_dataset: bool,
}

/// Build one row per backup test, in backup order.
#[must_use]
pub fn build_rows(snapshot: &BackupSnapshot) -> Vec<CatalogRow> {
    let empty = IssueMetadata::default();
    snapshot
        .tests
        .iter()
        .enumerate()
        .map(|(position, test)| {
            let meta = snapshot.metadata.get(&test.id).unwrap_or(&empty);
            let summary = if meta.summary.is_empty() {
                test.first_action().to_string()
            } else {
                meta.summary.clone()
            };
            CatalogRow {
                index: position + 1,
                id: test.id.clone(),
                key: meta.key.clone(),
                summary,
                assignee: meta.assignee.clone(),
                reporter: meta.reporter.clone(),
                status: meta.status.clone(),
                test_type: test.test_type(),
                step_count: test.steps.len(),
                preconditions: test.pre_condition_target_issue_ids.clone(),
                has_dataset: snapshot
                    .dataset_for(&test.id, &test.test_version_id)
                    .is_some(),
            }
        })
        .collect()
}

/// Column to sort by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Index,
    Key,
    Summary,
    Status,
    Steps,
}

impl SortKey {
    pub const ALL: [&'static str; 5] = ["index", "key", "summary", "status", "steps"];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Key => "key",
            Self::Summary => "summary",
            Self::Status => "status",
            Self::Steps => "steps",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = XportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "index" => Ok(Self::Index),
            "key" => Ok(Self::Key),
            "summary" => Ok(Self::Summary),
            "status" => Ok(Self::Status),
            "steps" => Ok(Self::Steps),
            other => Err(XportError::Validation {
                field: "sort".to_string(),
                reason: format!(
                    "invalid sort field '{other}' (expected one of: {})",
                    Self::ALL.join(", ")
                ),
            }),
        }
    }
}

/// Filters applied to the catalog, in this order: index range, keyword, key
/// substring, sort, limit.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub from: Option<usize>,
    pub to: Option<usize>,
    pub keyword: Option<String>,
    pub key: Option<String>,
    pub sort: SortKey,
    pub reverse: bool,
    pub limit: Option<usize>,
}

impl CatalogFilter {
    /// # Errors
    ///
    /// Returns a validation error when `from` is past `to`.
    pub fn validate(&self) -> Result<()> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(XportError::validation(
                    "from",
                    format!("start index {from} is after end index {to}"),
                ));
            }
        }
        Ok(())
    }

    fn matches(&self, row: &CatalogRow, keyword: Option<&str>, key: Option<&str>) -> bool {
        if self.from.is_some_and(|from| row.index < from) {
            return false;
        }
        if self.to.is_some_and(|to| row.index > to) {
            return false;
        }
        if keyword.is_some_and(|needle| !row.summary.to_lowercase().contains(needle)) {
            return false;
        }
        if key.is_some_and(|needle| !row.key.to_lowercase().contains(needle)) {
            return false;
        }
        true
    }
}

/// Apply a filter to the rows.
///
/// # Errors
///
/// Returns a validation error for an inverted index range.
pub fn apply_filter(rows: &[CatalogRow], filter: &CatalogFilter) -> Result<Vec<CatalogRow>> {
    filter.validate()?;
    let keyword = filter
        .keyword
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    let key = filter
        .key
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut selected: Vec<CatalogRow> = rows
        .iter()
        .filter(|row| filter.matches(row, keyword.as_deref(), key.as_deref()))
        .cloned()
        .collect();

    match filter.sort {
        SortKey::Index => selected.sort_by_key(|row| row.index),
        SortKey::Key => selected.sort_by(|a, b| a.key.cmp(&b.key).then(a.index.cmp(&b.index))),
        SortKey::Summary => selected.sort_by(|a, b| {
            a.summary
                .to_lowercase()
                .cmp(&b.summary.to_lowercase())
                .then(a.index.cmp(&b.index))
        }),
        SortKey::Status => {
            selected.sort_by(|a, b| a.status.cmp(&b.status).then(a.index.cmp(&b.index)));
        }
        SortKey::Steps => selected.sort_by(|a, b| {
            a.step_count
                .cmp(&b.step_count)
                .then(a.index.cmp(&b.index))
        }),
    }
    if filter.reverse {
        selected.reverse();
    }
    if let Some(limit) = filter.limit.filter(|limit| *limit > 0) {
        selected.truncate(limit);
    }
    Ok(selected)
}

/// Resolve operator-supplied keys (or internal ids) to test ids, keeping the
/// order given and dropping repeats.
///
/// # Errors
///
/// Returns `UnknownSelectionKey` with close matches for the first token that
/// names no test.
pub fn resolve_selection<S: AsRef<str>>(rows: &[CatalogRow], tokens: &[S]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for token in tokens {
        let token = token.as_ref().trim();
        if token.is_empty() {
            continue;
        }
        let found = rows
            .iter()
            .find(|row| (!row.key.is_empty() && row.key.eq_ignore_ascii_case(token)) || row.id == token);
        let Some(row) = found else {
            let known = rows
                .iter()
                .filter(|row| !row.key.is_empty())
                .map(|row| row.key.as_str());
            return Err(XportError::UnknownSelectionKey {
                key: token.to_string(),
                suggestions: find_similar_keys(token, known, 3),
            });
        };
        if seen.insert(row.id.clone()) {
            ids.push(row.id.clone());
        }
    }
    Ok(ids)
}

/// Split a comma-separated selection into tokens.
#[must_use]
pub fn split_selection(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TestCase, TestStep};

    fn row(index: usize, key: &str, summary: &str, status: &str, steps: usize) -> CatalogRow {
        CatalogRow {
            index,
            id: (1000 + index).to_string(),
            key: key.to_string(),
            summary: summary.to_string(),
            assignee: String::new(),
            reporter: String::new(),
            status: status.to_string(),
            test_type: TestType::Manual,
            step_count: steps,
            preconditions: Vec::new(),
            has_dataset: false,
        }
    }

    fn rows() -> Vec<CatalogRow> {
        vec![
            row(1, "PROJ-3", "Login works", "Done", 4),
            row(2, "PROJ-1", "Logout", "Open", 1),
            row(3, "", "Checkout flow", "Open", 7),
            row(4, "OTHER-9", "Login with SSO", "Done", 2),
        ]
    }

    #[test]
    fn summary_falls_back_to_first_action() {
        let mut snapshot = BackupSnapshot::default();
        snapshot.tests.push(TestCase {
            id: "5".to_string(),
            steps: vec![TestStep {
                action: "Open the app".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        let rows = build_rows(&snapshot);
        assert_eq!(rows[0].summary, "Open the app");
        assert_eq!(rows[0].step_count, 1);
        assert!(rows[0].key.is_empty());
    }

    #[test]
    fn keyword_and_range_filter() {
        let filter = CatalogFilter {
            from: Some(1),
            to: Some(3),
            keyword: Some("LOGIN".to_string()),
            ..Default::default()
        };
        let out = apply_filter(&rows(), &filter).expect("filter");
        let keys: Vec<_> = out.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["PROJ-3"]);
    }

    #[test]
    fn sort_by_steps_reversed_with_limit() {
        let filter = CatalogFilter {
            sort: SortKey::Steps,
            reverse: true,
            limit: Some(2),
            ..Default::default()
        };
        let out = apply_filter(&rows(), &filter).expect("filter");
        let indexes: Vec<_> = out.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![3, 1]);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let filter = CatalogFilter {
            from: Some(5),
            to: Some(2),
            ..Default::default()
        };
        assert!(apply_filter(&rows(), &filter).is_err());
    }

    #[test]
    fn sort_key_parses_case_insensitively() {
        assert_eq!("Summary".parse::<SortKey>().expect("parse"), SortKey::Summary);
        assert!("priority".parse::<SortKey>().is_err());
    }

    #[test]
    fn selection_accepts_keys_and_ids() {
        let ids = resolve_selection(&rows(), &["proj-1", "1003", "PROJ-1"]).expect("resolve");
        assert_eq!(ids, vec!["1002", "1003"]);
    }

    #[test]
    fn unknown_selection_suggests_close_keys() {
        let err = resolve_selection(&rows(), &["PROJ-4"]).unwrap_err();
        match err {
            XportError::UnknownSelectionKey { key, suggestions } => {
                assert_eq!(key, "PROJ-4");
                assert!(suggestions.contains(&"PROJ-1".to_string()));
                assert!(suggestions.contains(&"PROJ-3".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn split_selection_drops_blanks() {
        assert_eq!(split_selection(" A-1, ,B-2,"), vec!["A-1", "B-2"]);
    }
}

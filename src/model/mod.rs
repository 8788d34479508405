//! Core data types for `xray_porter`.
//!
//! This module defines the shapes read from an Xray backup and written back
//! to the bulk import endpoint:
//! - `TestCase` / `TestStep` - tests as stored in `tests*.json`
//! - `IssueMetadata` - one entry of the Jira lookup cache
//! - `Dataset` - parameter tables from `datasets*.json`
//! - `TestSet` - test set membership from `testSets*.json`
//! - `AttachmentMeta` - filenames from the attachment `metadata_*.json` files
//! - `ExportedTest` - the bulk import payload item

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Jira lookup cache: internal issue id -> metadata.
pub type MetadataCache = BTreeMap<String, IssueMetadata>;

/// Attachment index: attachment id -> metadata.
pub type AttachmentIndex = HashMap<String, AttachmentMeta>;

/// Normalize an identifier that may arrive as a number or a string.
///
/// Returns `None` for null, empty strings, `0`, and non-scalar values.
#[must_use]
pub fn normalize_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => {
            if n.as_u64() == Some(0) || n.as_i64() == Some(0) {
                None
            } else {
                Some(n.to_string())
            }
        }
        _ => None,
    }
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_id(&value).unwrap_or_default())
}

fn id_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(value
        .unwrap_or_default()
        .iter()
        .filter_map(normalize_id)
        .collect())
}

fn nullable_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

fn truthy_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().is_some_and(is_truthy))
}

/// Loose truthiness for the weakly typed backup flags: empty and zero are false.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Render a pass-through value; missing values become an empty string.
fn or_empty(value: &Value) -> Value {
    if value.is_null() {
        Value::String(String::new())
    } else {
        value.clone()
    }
}

/// A single manual test step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestStep {
    #[serde(default, deserialize_with = "nullable_string")]
    pub action: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub data: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub result: String,
}

impl TestStep {
    /// Iterate the text fields that may contain attachment markers.
    pub fn text_fields(&self) -> [&str; 3] {
        [&self.action, &self.data, &self.result]
    }

    /// Mutable access to the same fields, in the same order.
    pub fn text_fields_mut(&mut self) -> [&mut String; 3] {
        [&mut self.action, &mut self.data, &mut self.result]
    }
}

/// Test type tag understood by the bulk import endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestType {
    #[default]
    Manual,
    Generic,
    Cucumber,
}

impl TestType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "Manual",
            Self::Generic => "Generic",
            Self::Cucumber => "Cucumber",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A test as stored in a backup `tests*.json` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[serde(default, deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "id_string")]
    pub test_version_id: String,
    #[serde(default, rename = "type")]
    pub kind: Value,
    #[serde(default)]
    pub generic: Value,
    #[serde(default)]
    pub cucumber: Value,
    #[serde(default)]
    pub cucumber_type: Value,
    #[serde(default, deserialize_with = "id_list")]
    pub pre_condition_target_issue_ids: Vec<String>,
    #[serde(default)]
    pub steps: Vec<TestStep>,
}

impl TestCase {
    /// Cucumber wins over generic; everything else is manual.
    #[must_use]
    pub fn test_type(&self) -> TestType {
        if is_truthy(&self.cucumber) {
            TestType::Cucumber
        } else if is_truthy(&self.generic) {
            TestType::Generic
        } else {
            TestType::Manual
        }
    }

    /// Action text of the first step, used when Jira has no summary.
    #[must_use]
    pub fn first_action(&self) -> &str {
        self.steps.first().map_or("", |step| step.action.as_str())
    }
}

/// One entry of the Jira lookup cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IssueMetadata {
    #[serde(default, deserialize_with = "nullable_string")]
    pub key: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub summary: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub status: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub assignee: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub reporter: String,
    #[serde(default)]
    pub links: Value,
    #[serde(default, deserialize_with = "nullable_string")]
    pub issuetype: String,
    #[serde(default)]
    pub comments: Value,
}

impl IssueMetadata {
    /// Build a cache entry from a raw Jira search result issue.
    ///
    /// Returns `None` when the issue carries no usable id.
    #[must_use]
    pub fn from_jira_issue(issue: &Value) -> Option<(String, Self)> {
        let id = normalize_id(issue.get("id")?)?;
        let fields = issue.get("fields").unwrap_or(&Value::Null);
        let text = |value: Option<&Value>| {
            value
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default()
        };
        let nested = |field: &str, name: &str| text(fields.get(field).and_then(|f| f.get(name)));

        let meta = Self {
            key: text(issue.get("key")),
            summary: text(fields.get("summary")),
            description: text(fields.get("description")),
            status: nested("status", "name"),
            assignee: nested("assignee", "displayName"),
            reporter: nested("reporter", "displayName"),
            links: fields.get("issuelinks").cloned().unwrap_or(Value::Null),
            issuetype: nested("issuetype", "name"),
            comments: fields
                .get("comment")
                .and_then(|c| c.get("comments"))
                .cloned()
                .unwrap_or(Value::Null),
        };
        Some((id, meta))
    }
}

/// Dataset parameter definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Parameter {
    #[serde(rename = "_id", default, deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(default, deserialize_with = "truthy_flag")]
    pub combinations: bool,
}

impl Parameter {
    /// Column title; combination parameters carry a trailing `*`.
    #[must_use]
    pub fn column_title(&self) -> String {
        if self.combinations {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// One dataset row: parameter id -> value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DatasetRow {
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
}

/// A parameter dataset linked to a test.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default, deserialize_with = "id_string")]
    pub test_issue_id: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub rows: Vec<DatasetRow>,
}

/// A test set and the ids of its member tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestSet {
    #[serde(default, deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "id_list")]
    pub tests: Vec<String>,
}

/// Attachment metadata entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentMeta {
    #[serde(default, deserialize_with = "nullable_string")]
    pub filename: String,
}

/// Target project for a test that Xray should create as a new issue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectRef {
    pub key: String,
}

/// Jira fields carried by an exported test.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportFields {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectRef>,
}

/// One item of the bulk import payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportedTest {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: Value,
    pub generic: Value,
    pub cucumber: Value,
    #[serde(rename = "cucumberType")]
    pub cucumber_type: Value,
    pub id: String,
    #[serde(rename = "testVersionId")]
    pub test_version_id: String,
    pub fields: ExportFields,
    pub steps: Vec<TestStep>,
    pub xray_issue_type: String,
    pub xray_testtype: TestType,
    #[serde(default)]
    pub xray_preconditions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub xray_test_sets: Vec<String>,
}

impl ExportedTest {
    /// Build a payload item from a backup test and its cached metadata.
    #[must_use]
    pub fn from_test(key: &str, test: &TestCase, meta: &IssueMetadata) -> Self {
        Self {
            key: key.to_string(),
            kind: or_empty(&test.kind),
            generic: or_empty(&test.generic),
            cucumber: or_empty(&test.cucumber),
            cucumber_type: or_empty(&test.cucumber_type),
            id: test.id.clone(),
            test_version_id: test.test_version_id.clone(),
            fields: ExportFields {
                summary: meta.summary.clone(),
                description: meta.description.clone(),
                project: None,
            },
            steps: test.steps.clone(),
            xray_issue_type: meta.issuetype.clone(),
            xray_testtype: test.test_type(),
            xray_preconditions: Vec::new(),
            xray_test_sets: Vec::new(),
        }
    }

    /// Whether the test can be uploaded: it has a key, or a project to create
    /// a new issue in.
    #[must_use]
    pub fn is_uploadable(&self) -> bool {
        !self.key.is_empty() || self.fields.project.is_some()
    }
}

/// Whether `key` has the shape of a Jira issue key: a project part that
/// starts with a letter and holds only letters, digits or `_`, a hyphen,
/// then digits. Case is not checked.
#[must_use]
pub fn is_issue_key(key: &str) -> bool {
    let Some((project, number)) = key.split_once('-') else {
        return false;
    };
    project.starts_with(|c: char| c.is_ascii_alphabetic())
        && project.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit())
}

/// Part of a key before its first hyphen, if the key has one.
#[must_use]
pub fn project_prefix(key: &str) -> Option<String> {
    let (prefix, _) = key.split_once('-')?;
    let prefix = prefix.trim();
    (!prefix.is_empty()).then(|| prefix.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_normalize_from_numbers_and_strings() {
        assert_eq!(normalize_id(&json!(10042)), Some("10042".to_string()));
        assert_eq!(normalize_id(&json!(" 10042 ")), Some("10042".to_string()));
        assert_eq!(normalize_id(&json!(0)), None);
        assert_eq!(normalize_id(&json!("")), None);
        assert_eq!(normalize_id(&Value::Null), None);
    }

    #[test]
    fn test_case_parses_backup_shape() {
        let raw = json!({
            "id": 2001,
            "testVersionId": "v-7",
            "type": "manual",
            "preConditionTargetIssueIds": ["3001", 3002],
            "steps": [{"action": "Open app", "data": null, "result": "App opens"}]
        });
        let test: TestCase = serde_json::from_value(raw).expect("parse");
        assert_eq!(test.id, "2001");
        assert_eq!(test.test_version_id, "v-7");
        assert_eq!(test.pre_condition_target_issue_ids, vec!["3001", "3002"]);
        assert_eq!(test.steps[0].data, "");
        assert_eq!(test.test_type(), TestType::Manual);
        assert_eq!(test.first_action(), "Open app");
    }

    #[test]
    fn cucumber_flag_wins_over_generic() {
        let test = TestCase {
            cucumber: json!("Scenario: x"),
            generic: json!("run.sh"),
            ..Default::default()
        };
        assert_eq!(test.test_type(), TestType::Cucumber);

        let generic = TestCase {
            generic: json!("run.sh"),
            ..Default::default()
        };
        assert_eq!(generic.test_type(), TestType::Generic);
    }

    #[test]
    fn metadata_from_jira_issue() {
        let issue = json!({
            "id": "10001",
            "key": "PROJ-1",
            "fields": {
                "summary": "Login works",
                "description": null,
                "status": {"name": "Done"},
                "assignee": null,
                "reporter": {"displayName": "Dana"},
                "issuelinks": [],
                "issuetype": {"name": "Test"},
                "comment": {"comments": [{"body": "ok"}]}
            }
        });
        let (id, meta) = IssueMetadata::from_jira_issue(&issue).expect("metadata");
        assert_eq!(id, "10001");
        assert_eq!(meta.key, "PROJ-1");
        assert_eq!(meta.description, "");
        assert_eq!(meta.status, "Done");
        assert_eq!(meta.assignee, "");
        assert_eq!(meta.reporter, "Dana");
        assert_eq!(meta.issuetype, "Test");
        assert_eq!(meta.comments, json!([{"body": "ok"}]));
    }

    #[test]
    fn issue_key_shape() {
        assert!(is_issue_key("QA-1"));
        assert!(is_issue_key("qa-12"));
        assert!(is_issue_key("MY_PROJ2-3400"));
        assert!(!is_issue_key("QA-"));
        assert!(!is_issue_key("1QA-2"));
        assert!(!is_issue_key("QA-1/../../myself"));
        assert!(!is_issue_key("../myself"));
        assert!(!is_issue_key("QA 1"));
        assert!(!is_issue_key("QA-1?fields=x"));
    }

    #[test]
    fn project_prefix_needs_a_hyphen() {
        assert_eq!(project_prefix("PROJ-12"), Some("PROJ".to_string()));
        assert_eq!(project_prefix("PROJ"), None);
        assert_eq!(project_prefix(""), None);
        assert_eq!(project_prefix("-12"), None);
    }

    #[test]
    fn exported_test_serializes_import_shape() {
        let test = TestCase {
            id: "2001".to_string(),
            steps: vec![TestStep {
                action: "a".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let meta = IssueMetadata {
            summary: "S".to_string(),
            issuetype: "Test".to_string(),
            ..Default::default()
        };
        let exported = ExportedTest::from_test("PROJ-1", &test, &meta);
        let value = serde_json::to_value(&exported).expect("serialize");
        assert_eq!(value["type"], "");
        assert_eq!(value["xray_testtype"], "Manual");
        assert_eq!(value["fields"]["summary"], "S");
        assert!(value["fields"].get("project").is_none());
        assert!(value.get("xray_test_sets").is_none());
        assert_eq!(value["xray_preconditions"], json!([]));
    }

    #[test]
    fn parameter_column_title_marks_combinations() {
        let param = Parameter {
            id: "p1".to_string(),
            name: "browser".to_string(),
            combinations: true,
        };
        assert_eq!(param.column_title(), "browser*");
    }
}

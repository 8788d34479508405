//! Structured error output.
//!
//! Provides machine-parseable error information with:
//! - Error codes for categorization
//! - Hints for self-correction
//! - Retryability flags
//! - Context for debugging

#![allow(clippy::option_if_let_else)]

use crate::error::XportError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Machine-readable error codes.
///
/// These codes are stable and can be used for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // === Config Errors (exit code 2) ===
    /// Configuration error
    ConfigError,
    /// Required setting missing
    MissingSetting,

    // === Service Errors (exit code 3) ===
    /// Authentication rejected
    AuthFailed,
    /// Unexpected HTTP status
    HttpError,
    /// Network failure
    TransportError,
    /// Response could not be interpreted
    UnexpectedResponse,

    // === Backup Errors (exit code 4) ===
    /// Backup job ended in an unexpected status
    BackupFailed,
    /// Job submission returned no job id
    MissingJobId,
    /// Archive unreadable
    ArchiveError,
    /// Directory missing
    DirectoryNotFound,
    /// Malformed JSON in a backup file
    JsonParseError,

    // === Reconciliation Errors (exit code 5) ===
    /// Selected key unknown
    UnknownKey,
    /// Manually entered key not in tracker
    KeyNotFound,
    /// No project prefix for a new issue
    MissingProjectPrefix,
    /// Session used out of order
    InvalidTransition,
    /// Operator aborted
    Aborted,
    /// Field validation failed
    ValidationFailed,

    // === I/O Errors (exit code 8) ===
    /// File I/O error
    IoError,
    /// JSON serialization error
    JsonError,
    /// YAML parsing error
    YamlError,

    // === Internal Errors (exit code 1) ===
    /// Unexpected internal error
    InternalError,
}

impl ErrorCode {
    /// Get the string representation for JSON output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigError => "CONFIG_ERROR",
            Self::MissingSetting => "MISSING_SETTING",
            Self::AuthFailed => "AUTH_FAILED",
            Self::HttpError => "HTTP_ERROR",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::UnexpectedResponse => "UNEXPECTED_RESPONSE",
            Self::BackupFailed => "BACKUP_FAILED",
            Self::MissingJobId => "MISSING_JOB_ID",
            Self::ArchiveError => "ARCHIVE_ERROR",
            Self::DirectoryNotFound => "DIRECTORY_NOT_FOUND",
            Self::JsonParseError => "JSON_PARSE_ERROR",
            Self::UnknownKey => "UNKNOWN_KEY",
            Self::KeyNotFound => "KEY_NOT_FOUND",
            Self::MissingProjectPrefix => "MISSING_PROJECT_PREFIX",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::Aborted => "ABORTED",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::YamlError => "YAML_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether this error is potentially retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransportError
                | Self::HttpError
                | Self::BackupFailed
                | Self::ArchiveError
                | Self::UnknownKey
                | Self::KeyNotFound
                | Self::ValidationFailed
        )
    }

    /// Get the exit code for this error category.
    ///
    /// - 1: Internal/unknown errors
    /// - 2: Config errors
    /// - 3: Service errors
    /// - 4: Backup errors
    /// - 5: Reconciliation errors
    /// - 8: I/O errors
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigError | Self::MissingSetting => 2,
            Self::AuthFailed
            | Self::HttpError
            | Self::TransportError
            | Self::UnexpectedResponse => 3,
            Self::BackupFailed
            | Self::MissingJobId
            | Self::ArchiveError
            | Self::DirectoryNotFound
            | Self::JsonParseError => 4,
            Self::UnknownKey
            | Self::KeyNotFound
            | Self::MissingProjectPrefix
            | Self::InvalidTransition
            | Self::Aborted
            | Self::ValidationFailed => 5,
            Self::IoError | Self::JsonError | Self::YamlError => 8,
            Self::InternalError => 1,
        }
    }
}

/// Structured error for machine-parseable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional hint for fixing the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether the operation can be retried
    pub retryable: bool,
    /// Additional context data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl StructuredError {
    /// Create a new structured error from an `XportError`.
    #[must_use]
    pub fn from_error(err: &XportError) -> Self {
        let (code, context) = Self::extract_code_and_context(err);
        let hint = Self::generate_hint(err);

        Self {
            code,
            message: err.to_string(),
            hint,
            retryable: code.is_retryable(),
            context,
        }
    }

    /// Serialize to JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "hint": self.hint,
                "retryable": self.retryable,
                "context": self.context,
            }
        })
    }

    /// Format for human-readable output.
    #[must_use]
    pub fn to_human(&self, color: bool) -> String {
        let mut output = String::new();

        if color {
            output.push_str("\x1b[31mError:\x1b[0m ");
        } else {
            output.push_str("Error: ");
        }

        output.push_str(&self.message);

        if let Some(hint) = &self.hint {
            output.push('\n');
            if color {
                output.push_str("\x1b[33mHint:\x1b[0m ");
            } else {
                output.push_str("Hint: ");
            }
            output.push_str(hint);
        }

        output
    }

    fn extract_code_and_context(err: &XportError) -> (ErrorCode, Option<Value>) {
        match err {
            XportError::Auth {
                service, status, ..
            } => (
                ErrorCode::AuthFailed,
                Some(json!({"service": service, "status": status})),
            ),
            XportError::Http { status, url, .. } => (
                ErrorCode::HttpError,
                Some(json!({"status": status, "url": url})),
            ),
            XportError::Transport(_) => (ErrorCode::TransportError, None),
            XportError::UnexpectedResponse { url, .. } => {
                (ErrorCode::UnexpectedResponse, Some(json!({"url": url})))
            }
            XportError::BackupStatus { status } => {
                (ErrorCode::BackupFailed, Some(json!({"status": status})))
            }
            XportError::MissingJobId { operation } => {
                (ErrorCode::MissingJobId, Some(json!({"operation": operation})))
            }
            XportError::Archive(_) => (ErrorCode::ArchiveError, None),
            XportError::DirectoryNotFound { path } => (
                ErrorCode::DirectoryNotFound,
                Some(json!({"path": path.display().to_string()})),
            ),
            XportError::JsonFile { path, .. } => (
                ErrorCode::JsonParseError,
                Some(json!({"path": path.display().to_string()})),
            ),
            XportError::UnknownSelectionKey { key, suggestions } => (
                ErrorCode::UnknownKey,
                Some(json!({"key": key, "similar_keys": suggestions})),
            ),
            XportError::KeyNotFound { key } => (ErrorCode::KeyNotFound, Some(json!({"key": key}))),
            XportError::MissingProjectPrefix { key } => {
                (ErrorCode::MissingProjectPrefix, Some(json!({"key": key})))
            }
            XportError::InvalidTransition { from, to } => (
                ErrorCode::InvalidTransition,
                Some(json!({"from": from, "to": to})),
            ),
            XportError::Aborted => (ErrorCode::Aborted, None),
            XportError::Validation { field, reason } => (
                ErrorCode::ValidationFailed,
                Some(json!({"field": field, "reason": reason})),
            ),
            XportError::Config(_) => (ErrorCode::ConfigError, None),
            XportError::MissingSetting { key } => {
                (ErrorCode::MissingSetting, Some(json!({"key": key})))
            }
            XportError::Io(_) => (ErrorCode::IoError, None),
            XportError::Json(_) => (ErrorCode::JsonError, None),
            XportError::Yaml(_) => (ErrorCode::YamlError, None),
            XportError::WithContext { context, .. } => {
                (ErrorCode::InternalError, Some(json!({"context": context})))
            }
        }
    }

    fn generate_hint(err: &XportError) -> Option<String> {
        if let XportError::UnknownSelectionKey { suggestions, .. } = err {
            return match suggestions.len() {
                0 => Some("Run 'xport list' to see available keys.".to_string()),
                1 => Some(format!("Did you mean '{}'?", suggestions[0])),
                _ => Some(format!("Did you mean one of: {}?", suggestions.join(", "))),
            };
        }

        if let Some(suggestion) = err.suggestion() {
            return Some(suggestion.to_string());
        }

        match err {
            XportError::JsonFile { path, .. } => Some(format!(
                "Fix or remove {} and rerun.",
                path.display()
            )),
            XportError::Http { status: 429, .. } => {
                Some("Rate limited: wait and retry.".to_string())
            }
            _ => None,
        }
    }
}

/// Compute Levenshtein distance between two strings.
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut matrix = vec![vec![0; b_len + 1]; a_len + 1];

    for (i, row) in matrix.iter_mut().enumerate().take(a_len + 1) {
        row[0] = i;
    }
    for (j, item) in matrix[0].iter_mut().enumerate().take(b_len + 1) {
        *item = j;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    for (i, a_char) in a_chars.iter().enumerate() {
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            matrix[i + 1][j + 1] = std::cmp::min(
                std::cmp::min(matrix[i][j + 1] + 1, matrix[i + 1][j] + 1),
                matrix[i][j] + cost,
            );
        }
    }

    matrix[a_len][b_len]
}

/// Find known keys close to a mistyped one.
#[must_use]
pub fn find_similar_keys<'a, I>(searched: &str, existing: I, max_suggestions: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let searched = searched.to_uppercase();
    let mut candidates: Vec<(usize, &str)> = existing
        .into_iter()
        .map(|key| (levenshtein_distance(&searched, key), key))
        .filter(|(dist, _)| *dist <= 2)
        .collect();

    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    candidates
        .into_iter()
        .take(max_suggestions)
        .map(|(_, key)| key.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::MissingJobId.as_str(), "MISSING_JOB_ID");
        assert_eq!(ErrorCode::AuthFailed.as_str(), "AUTH_FAILED");
    }

    #[test]
    fn test_error_code_exit_codes() {
        assert_eq!(ErrorCode::MissingSetting.exit_code(), 2);
        assert_eq!(ErrorCode::TransportError.exit_code(), 3);
        assert_eq!(ErrorCode::BackupFailed.exit_code(), 4);
        assert_eq!(ErrorCode::Aborted.exit_code(), 5);
        assert_eq!(ErrorCode::IoError.exit_code(), 8);
        assert_eq!(ErrorCode::InternalError.exit_code(), 1);
    }

    #[test]
    fn test_structured_error_to_json() {
        let err = XportError::BackupStatus {
            status: "failed".to_string(),
        };
        let structured = StructuredError::from_error(&err);
        let json = structured.to_json();
        assert_eq!(json["error"]["code"], "BACKUP_FAILED");
        assert_eq!(json["error"]["context"]["status"], "failed");
        assert_eq!(json["error"]["retryable"], true);
    }

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("PROJ-1", "PROJ-1"), 0);
        assert_eq!(levenshtein_distance("PROJ-1", "PROJ-2"), 1);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_find_similar_keys() {
        let keys = ["PROJ-12", "PROJ-13", "OTHER-9"];
        let similar = find_similar_keys("proj-1", keys, 3);
        assert_eq!(similar, vec!["PROJ-12", "PROJ-13"]);
        assert!(find_similar_keys("ZZZZZZZ", keys, 3).is_empty());
    }

    #[test]
    fn test_unknown_key_hint() {
        let err = XportError::UnknownSelectionKey {
            key: "PROJ-1".to_string(),
            suggestions: vec!["PROJ-12".to_string()],
        };
        let structured = StructuredError::from_error(&err);
        assert_eq!(structured.hint.as_deref(), Some("Did you mean 'PROJ-12'?"));
        assert_eq!(structured.code, ErrorCode::UnknownKey);
    }

    #[test]
    fn test_to_human_output() {
        let err = XportError::missing_setting("jira.url");
        let human = StructuredError::from_error(&err).to_human(false);
        assert!(human.starts_with("Error: Missing setting: jira.url"));
        assert!(human.contains("Hint:"));
    }
}

//! Error types and handling for `xray_porter`.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - Provides recovery hints for operator-facing errors
//! - Provides structured JSON output for scripted runs

mod context;
mod structured;

pub use context::ResultExt;
pub use structured::{ErrorCode, StructuredError, find_similar_keys};

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for `xray_porter` operations.
#[derive(Error, Debug)]
pub enum XportError {
    // === Service Errors ===
    /// Authentication against a remote service was rejected.
    #[error("Authentication with {service} failed: HTTP {status}: {body}")]
    Auth {
        service: String,
        status: u16,
        body: String,
    },

    /// A remote call returned an unexpected HTTP status.
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    /// Network or protocol failure before a response was received.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A remote response could not be interpreted.
    #[error("Unexpected response from {url}: {reason}")]
    UnexpectedResponse { url: String, reason: String },

    // === Backup Errors ===
    /// Backup job reported a status other than working/successful.
    #[error("Unexpected backup status: {status}")]
    BackupStatus { status: String },

    /// A job submission did not return a job identifier.
    #[error("No job identifier returned by {operation}")]
    MissingJobId { operation: String },

    /// Archive could not be read or written (truncated download, bad entry).
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Expected directory is absent.
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// A backup file is not valid JSON.
    #[error("Malformed JSON in {path}: {source}")]
    JsonFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // === Reconciliation Errors ===
    /// A selected key is not present in the metadata cache.
    #[error("Unknown test key: {key}")]
    UnknownSelectionKey { key: String, suggestions: Vec<String> },

    /// A manually entered key does not exist in the issue tracker.
    #[error("Issue key not found in tracker: {key}")]
    KeyNotFound { key: String },

    /// A new issue was requested but no project prefix can be derived.
    #[error("Cannot detect project prefix from key '{key}'")]
    MissingProjectPrefix { key: String },

    /// Session operation attempted in the wrong state.
    #[error("Invalid export session transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Operator stopped an interactive flow.
    #[error("Aborted by operator")]
    Aborted,

    // === Validation Errors ===
    /// Field validation failed.
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    // === Configuration Errors ===
    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required setting has no value in any layer.
    #[error("Missing setting: {key}")]
    MissingSetting { key: String },

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Wrapped errors ===
    /// Error with additional context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl XportError {
    /// Whether the failure happened before any response was received.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Human-friendly suggestion for fixing this error.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Auth { .. } => Some("Check XRAY_ID/XRAY_SECRET or JIRA_EMAIL/JIRA_TOKEN"),
            Self::MissingSetting { .. } => {
                Some("Set it in xport.yaml, the environment, or on the command line")
            }
            Self::DirectoryNotFound { .. } => Some("Check the path or run: xport backup"),
            Self::KeyNotFound { .. } => Some("Re-enter the key or create a new issue instead"),
            Self::MissingProjectPrefix { .. } => {
                Some("Enter an existing key manually; a new issue needs a PROJECT-123 style key")
            }
            Self::BackupStatus { .. } => Some("Retry later; the backup job did not complete"),
            Self::Archive(_) => Some("The download may be truncated: delete it and rerun with --force"),
            Self::MissingJobId { .. } => Some("Check the import payload and try the upload again"),
            _ => None,
        }
    }

    /// Get the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        1
    }

    /// Create a validation error for a specific field.
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing-setting error.
    #[must_use]
    pub fn missing_setting(key: impl Into<String>) -> Self {
        Self::MissingSetting { key: key.into() }
    }
}

/// Result type using `XportError`.
pub type Result<T> = std::result::Result<T, XportError>;

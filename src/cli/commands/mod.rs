//! One module per subcommand, plus the connection helpers they share.

pub mod backup;
pub mod collect;
pub mod completions;
pub mod config;
pub mod export;
pub mod list;
pub mod metadata;

use crate::client::{JiraClient, XrayClient};
use crate::config::Settings;
use crate::error::Result;
use std::path::{Path, PathBuf};

/// The `--dir` argument, or the configured extract directory.
pub(crate) fn backup_dir(dir: Option<&Path>, settings: &Settings) -> PathBuf {
    dir.map_or_else(|| settings.backup.extract_dir(), Path::to_path_buf)
}

pub(crate) fn connect_jira(settings: &Settings) -> Result<JiraClient> {
    JiraClient::from_settings(&settings.jira, settings.http_timeout)
}

pub(crate) fn connect_xray(settings: &Settings) -> Result<XrayClient> {
    XrayClient::from_settings(&settings.xray, settings.http_timeout)
}

//! Runs the `xport` binary inside a throwaway directory.
//!
//! The child never sees the developer's Jira or Xray credentials, runs
//! without color, and uses the temp dir as `HOME` so no user config leaks in.

use super::fixtures::write_backup;
use assert_cmd::Command;
use serde_json::Value;
use std::ffi::OsStr;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::debug;

/// Directory of the unpacked backup inside a seeded workspace.
pub const BACKUP_DIR: &str = "backup";

const CREDENTIAL_ENV: &[&str] = &[
    "XRAY_URL",
    "XRAY_ID",
    "XRAY_SECRET",
    "JIRA_URL",
    "JIRA_EMAIL",
    "JIRA_TOKEN",
];

/// A temp dir used as both working directory and `HOME`.
pub struct XportWorkspace {
    _temp: TempDir,
    pub root: PathBuf,
}

impl XportWorkspace {
    pub fn empty() -> Self {
        let temp = TempDir::new().expect("temp dir");
        let root = temp.path().to_path_buf();
        Self { _temp: temp, root }
    }

    /// Workspace with the fixture backup unpacked under [`BACKUP_DIR`],
    /// metadata cache included.
    pub fn with_backup() -> Self {
        let workspace = Self::empty();
        write_backup(&workspace.backup_dir(), true);
        workspace
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join(BACKUP_DIR)
    }

    /// Replace one file of the unpacked backup.
    pub fn overwrite_backup_file(&self, name: &str, contents: &str) {
        fs::write(self.backup_dir().join(name), contents).expect("overwrite backup file");
    }

    /// Write `xport.yaml`, which the binary picks up from its working dir.
    pub fn write_project_config(&self, yaml: &str) -> PathBuf {
        let path = self.root.join("xport.yaml");
        fs::write(&path, yaml).expect("write project config");
        path
    }
}

/// Output of one `xport` invocation.
#[derive(Debug)]
pub struct XportRun {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
}

impl XportRun {
    pub fn assert_success(&self) -> &Self {
        assert_eq!(self.code, Some(0), "xport failed\nstderr: {}", self.stderr);
        self
    }

    /// Exit code plus the structured error code printed on stderr.
    pub fn assert_failure(&self, exit_code: i32, error_code: &str) -> &Self {
        assert_eq!(self.code, Some(exit_code), "stderr: {}", self.stderr);
        assert!(
            self.stderr.contains(&format!("\"{error_code}\"")),
            "expected {error_code} on stderr: {}",
            self.stderr
        );
        self
    }

    /// Stdout parsed as one JSON document.
    pub fn json(&self) -> Value {
        serde_json::from_str(self.stdout.trim())
            .unwrap_or_else(|err| panic!("stdout is not JSON ({err}): {}", self.stdout))
    }
}

pub fn run_xport<I, S>(workspace: &XportWorkspace, args: I) -> XportRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_xport_with_env(workspace, args, std::iter::empty::<(&str, &str)>())
}

pub fn run_xport_with_env<I, S, E, K, V>(workspace: &XportWorkspace, args: I, env_vars: E) -> XportRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
    E: IntoIterator<Item = (K, V)>,
    K: AsRef<OsStr>,
    V: AsRef<OsStr>,
{
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("xport"));
    cmd.current_dir(&workspace.root);
    for name in CREDENTIAL_ENV {
        cmd.env_remove(name);
    }
    cmd.args(args)
        .envs(env_vars)
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "xray_porter=debug")
        .env("HOME", &workspace.root);

    let output = cmd.output().expect("run xport");
    let run = XportRun {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        code: output.status.code(),
    };
    debug!(
        args = ?cmd.get_args().collect::<Vec<_>>(),
        code = ?run.code,
        cwd = %workspace.root.display(),
        "xport finished"
    );
    run
}

//! CLI definitions and entry point.

use crate::catalog::{CatalogFilter, SortKey};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;

/// Back up Xray test data, enrich it with Jira metadata, re-export tests
#[derive(Parser, Debug)]
#[command(name = "xport", author, version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project config file (default: ./xport.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Also write JSON-lines logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download today's backup, fetch Jira metadata and store it in the archive
    Backup(BackupArgs),

    /// Print every issue id referenced by an extracted backup
    Collect(CollectArgs),

    /// Fetch Jira metadata for an extracted backup and write the cache
    Metadata(MetadataArgs),

    /// List the tests of an extracted backup
    List(ListArgs),

    /// Reconcile keys and attachments, then upload selected tests to Xray
    Export(ExportArgs),

    /// Show the resolved configuration (secrets masked)
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the backup command.
#[derive(Args, Debug, Default, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct BackupArgs {
    /// Directory for the dated archives
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Where to unpack the base archive (default: <output-dir>/xray-backup)
    #[arg(long, value_name = "DIR")]
    pub extract_dir: Option<PathBuf>,

    /// Limit the backup to a project id (repeatable)
    #[arg(long = "project", value_name = "ID")]
    pub projects: Vec<String>,

    /// Only include changes since (RFC3339, YYYY-MM-DD, or 7d/12h/2w)
    #[arg(long, value_name = "WHEN")]
    pub modified_since: Option<String>,

    /// Skip the attachment archive
    #[arg(long)]
    pub no_attachments: bool,

    /// Download again even if today's archive exists
    #[arg(long)]
    pub force: bool,

    /// Keep the unpacked backup and cache after the run
    #[arg(long)]
    pub keep_extracted: bool,

    /// Unpack the attachment archive as well
    #[arg(long)]
    pub extract_attachments: bool,
}

/// Arguments for the collect command.
#[derive(Args, Debug, Default, Clone)]
pub struct CollectArgs {
    /// Extracted backup directory (default: configured extract dir)
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

/// Arguments for the metadata command.
#[derive(Args, Debug, Default, Clone)]
pub struct MetadataArgs {
    /// Extracted backup directory (default: configured extract dir)
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Cache file to write (default: <dir>/<cache file name>)
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

/// Row filters shared by list and export.
#[derive(Args, Debug, Default, Clone)]
pub struct FilterArgs {
    /// First row index to include (1-based, inclusive)
    #[arg(long, value_name = "N")]
    pub from: Option<usize>,

    /// Last row index to include (inclusive)
    #[arg(long, value_name = "N")]
    pub to: Option<usize>,

    /// Case-insensitive substring of the summary
    #[arg(long)]
    pub keyword: Option<String>,

    /// Case-insensitive substring of the issue key
    #[arg(long)]
    pub key: Option<String>,

    /// Sort column: index, key, summary, status, steps
    #[arg(long, default_value = "index", value_parser = parse_sort_key)]
    pub sort: SortKey,

    /// Reverse the sort order
    #[arg(long, short = 'r')]
    pub reverse: bool,

    /// Maximum number of rows
    #[arg(long)]
    pub limit: Option<usize>,
}

impl FilterArgs {
    #[must_use]
    pub fn to_filter(&self) -> CatalogFilter {
        CatalogFilter {
            from: self.from,
            to: self.to,
            keyword: self.keyword.clone(),
            key: self.key.clone(),
            sort: self.sort,
            reverse: self.reverse,
            limit: self.limit,
        }
    }
}

fn parse_sort_key(value: &str) -> Result<SortKey, String> {
    value.parse().map_err(|err: crate::error::XportError| err.to_string())
}

/// Output format for list command.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// JSON output
    Json,
    /// CSV output with configurable fields
    Csv,
}

/// Arguments for the list command.
#[derive(Args, Debug, Default, Clone)]
pub struct ListArgs {
    /// Extracted backup directory (default: configured extract dir)
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// CSV fields to include (comma-separated)
    ///
    /// Available: index, id, key, summary, assignee, reporter, status, type,
    /// steps, preconditions, dataset
    ///
    /// Default: index, key, summary, status, steps
    #[arg(long, value_name = "FIELDS")]
    pub fields: Option<String>,

    /// Show every column in the table
    #[arg(long)]
    pub wide: bool,
}

/// Arguments for the export command.
#[derive(Args, Debug, Default, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct ExportArgs {
    /// Extracted backup directory (default: configured extract dir)
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Directory holding the extracted attachments and their metadata files
    #[arg(long, value_name = "DIR")]
    pub attachments_dir: Option<PathBuf>,

    /// Comma-separated keys (or internal ids) of the tests to export
    #[arg(long, value_name = "KEYS", conflicts_with = "all_filtered")]
    pub keys: Option<String>,

    /// Export every row that passes the filters
    #[arg(long)]
    pub all_filtered: bool,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Confirm keys automatically instead of step by step
    #[arg(long)]
    pub auto: bool,

    /// Seconds between automatic steps
    #[arg(long, value_name = "SECS", requires = "auto")]
    pub delay: Option<u64>,

    /// Where to write the dataset bundle
    #[arg(long, value_name = "FILE", default_value = "xray_datasets.zip")]
    pub datasets_out: PathBuf,

    /// Also write the payload as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub json_out: Option<PathBuf>,

    /// Stop before anything is written to Xray
    #[arg(long)]
    pub dry_run: bool,

    /// Upload without asking for confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Arguments for the config command.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// Show config file locations instead of values
    #[arg(long)]
    pub paths: bool,
}

/// Arguments for the completions command.
#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: ShellType,

    /// Output file (default: stdout)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Supported shells for completion generation.
#[derive(ValueEnum, Debug, Clone, Copy, Eq, PartialEq)]
pub enum ShellType {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    #[value(name = "powershell")]
    #[value(alias = "pwsh")]
    /// `PowerShell`
    PowerShell,
    /// Elvish
    Elvish,
}

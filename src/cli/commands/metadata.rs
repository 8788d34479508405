//! Metadata command: fetch Jira metadata for an extracted backup and write
//! the cache.

use super::{backup_dir, connect_jira};
use crate::cli::MetadataArgs;
use crate::config::{self, CliOverrides};
use crate::error::Result;
use crate::metadata::{fetch_metadata, save_cache};
use crate::output::{OutputContext, SummaryPanel};
use crate::scan::collect_issue_ids;
use crate::util::progress::ProgressTracker;
use serde_json::json;

/// Execute the metadata command.
///
/// Failed batches are reported but do not fail the command.
///
/// # Errors
///
/// Returns an error if Jira settings are missing, the backup cannot be
/// scanned, or the cache cannot be written.
pub fn execute(args: &MetadataArgs, ctx: &OutputContext, cli: &CliOverrides) -> Result<()> {
    let settings = config::load_settings(cli)?;
    let dir = backup_dir(args.dir.as_deref(), &settings);
    let out = args
        .out
        .clone()
        .unwrap_or_else(|| dir.join(&settings.backup.cache_file));

    let ids = collect_issue_ids(&dir)?;
    let jira = connect_jira(&settings)?;
    let progress = if ctx.is_quiet() {
        ProgressTracker::hidden()
    } else {
        ProgressTracker::new(0, "Fetching Jira metadata")
    };
    let report = fetch_metadata(&jira, &ids, &settings.metadata, &progress);
    save_cache(&out, &report.metadata)?;

    if ctx.is_json() {
        ctx.json(&json!({
            "cache": out,
            "issue_ids": ids.len(),
            "entries": report.metadata.len(),
            "batches": report.batches,
            "failed_batches": report.failed_batches,
        }));
        return Ok(());
    }

    let mut panel = SummaryPanel::new("Jira metadata", ctx.theme());
    panel
        .entry("Issue ids", ids.len())
        .entry("Cache entries", report.metadata.len())
        .entry("Batches", report.batches)
        .entry("Cache file", out.display());
    if !report.failed_batches.is_empty() {
        let failed: Vec<String> = report.failed_batches.iter().map(ToString::to_string).collect();
        panel.add("Failed batches", failed.join(", "), ctx.theme().error.clone());
    }
    panel.show(ctx);
    if !report.failed_batches.is_empty() {
        ctx.warning("Some metadata batches failed; their issues have no cache entry");
    }
    Ok(())
}

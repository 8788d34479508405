//! Backup command.
//!
//! Downloads today's Xray backup (unless it already exists), collects every
//! issue id, fetches Jira metadata for them and stores the metadata cache
//! inside the dated archive.

use super::{connect_jira, connect_xray};
use crate::backup::{BackupPaths, BackupPlan, BackupReport, run_backup};
use crate::cli::BackupArgs;
use crate::client::BackupRequest;
use crate::config::{self, CliOverrides};
use crate::error::Result;
use crate::output::{OutputContext, SummaryPanel};
use crate::util::progress::should_show_progress;
use crate::util::time::{format_modified_since, parse_modified_since, today_stamp};
use chrono::Utc;
use tracing::info;

/// Execute the backup command.
///
/// # Errors
///
/// Returns an error if credentials are missing, the backup job fails, the
/// archive cannot be unpacked or updated, or a backup file is malformed.
pub fn execute(args: &BackupArgs, ctx: &OutputContext, cli: &CliOverrides) -> Result<()> {
    let settings = config::load_settings(cli)?;
    let jira = connect_jira(&settings)?;

    let modified_since = args
        .modified_since
        .as_deref()
        .map(|value| parse_modified_since(value, Utc::now()))
        .transpose()?
        .map(format_modified_since);

    let plan = BackupPlan {
        request: BackupRequest {
            with_attachment: !args.no_attachments,
            project_ids: args.projects.clone(),
            modified_since,
        },
        force: args.force,
        keep_extracted: args.keep_extracted,
        extract_attachments: args.extract_attachments,
        show_progress: !ctx.is_quiet() && should_show_progress(),
    };
    let paths = BackupPaths::for_date(
        &settings.backup.output_dir,
        settings.backup.extract_dir(),
        &today_stamp(),
    );
    info!(archive = %paths.base_zip.display(), "Starting backup");

    let report = run_backup(|| connect_xray(&settings), &jira, &settings, &paths, &plan)?;

    if ctx.is_json() {
        ctx.json(&report);
        return Ok(());
    }
    print_report(&report, ctx);
    Ok(())
}

fn print_report(report: &BackupReport, ctx: &OutputContext) {
    if report.skipped_download {
        ctx.info("Already backed up today; reusing the existing archive");
    }

    let mut panel = SummaryPanel::new("Backup", ctx.theme());
    panel.entry("Archive", report.base_zip.display());
    if let Some(attachments) = &report.attachment_zip {
        panel.entry("Attachments", attachments.display());
    }
    if let Some(job) = &report.job_id {
        panel.entry("Job id", job);
    }
    panel
        .entry("Issue ids", report.issue_ids)
        .entry("Metadata entries", report.metadata_entries)
        .entry("Batches", report.batches);
    if !report.failed_batches.is_empty() {
        let failed: Vec<String> = report.failed_batches.iter().map(ToString::to_string).collect();
        panel.add("Failed batches", failed.join(", "), ctx.theme().error.clone());
    }
    panel.show(ctx);

    if report.cache_appended {
        ctx.success("Metadata cache stored in the archive");
    }
    if !report.failed_batches.is_empty() {
        ctx.warning("Some metadata batches failed; rerun with --force to retry them");
    }
}

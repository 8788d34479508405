//! Export command.
//!
//! Selects tests from an extracted backup, reconciles their keys and
//! attachments with Jira and Xray, and submits them as one bulk import.

use super::{backup_dir, connect_jira, connect_xray};
use crate::backup::BackupPaths;
use crate::catalog::{CatalogRow, apply_filter, build_rows, resolve_selection, split_selection};
use crate::cli::ExportArgs;
use crate::config::{self, CliOverrides, Settings};
use crate::error::Result;
use crate::export::{
    ConfirmMode, ExportOptions, ExportReport, Prompter, TerminalPrompter, run_export,
};
use crate::output::{CatalogTable, OutputContext, SummaryPanel};
use crate::scan::BackupSnapshot;
use crate::util::PollPolicy;
use crate::util::time::today_stamp;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Execute the export command.
///
/// # Errors
///
/// Returns an error if the backup cannot be loaded, a selected key is
/// unknown, credentials are missing, the operator aborts, or the upload
/// cannot be submitted.
pub fn execute(args: &ExportArgs, ctx: &OutputContext, cli: &CliOverrides) -> Result<()> {
    let settings = config::load_settings(cli)?;
    let dir = backup_dir(args.dir.as_deref(), &settings);
    let attachments_dir = attachments_dir(args, &settings);
    let snapshot = BackupSnapshot::load(
        &dir,
        attachments_dir.is_dir().then_some(attachments_dir.as_path()),
        &settings.backup.cache_file,
    )?;
    if !snapshot.warnings.is_empty() {
        ctx.warning(&format!(
            "{} backup file(s) or item(s) could not be read; run with -v for details",
            snapshot.warnings.len()
        ));
    }

    let rows = build_rows(&snapshot);
    let mut prompter = TerminalPrompter::stdin(ctx.use_color());
    let selected = select_tests(args, &rows, ctx, &mut prompter)?;
    if selected.is_empty() {
        ctx.info("No tests selected.");
        return Ok(());
    }
    info!(count = selected.len(), "Tests selected for export");

    let jira = connect_jira(&settings)?;
    let xray = connect_xray(&settings)?;
    let options = ExportOptions {
        mode: if args.auto {
            ConfirmMode::Automatic {
                delay: settings.export.auto_delay,
            }
        } else {
            ConfirmMode::Manual
        },
        attachments_dir,
        datasets_out: args.datasets_out.clone(),
        json_out: args.json_out.clone(),
        dry_run: args.dry_run,
        assume_yes: args.yes,
        poll: PollPolicy::bounded(settings.export.poll_interval, settings.export.poll_attempts),
    };
    debug!(?options, "Export options");

    let report = run_export(&snapshot, &selected, &jira, &xray, &mut prompter, &options)?;

    if ctx.is_json() {
        ctx.json(&report);
    } else {
        print_report(&report, ctx);
    }
    Ok(())
}

/// `--attachments-dir`, or today's attachment extract directory.
fn attachments_dir(args: &ExportArgs, settings: &Settings) -> PathBuf {
    args.attachments_dir.clone().unwrap_or_else(|| {
        BackupPaths::for_date(
            &settings.backup.output_dir,
            settings.backup.extract_dir(),
            &today_stamp(),
        )
        .attachment_dir
    })
}

/// Resolve the test ids to export: `--keys`, `--all-filtered`, or an
/// interactive prompt over the filtered table.
fn select_tests(
    args: &ExportArgs,
    rows: &[CatalogRow],
    ctx: &OutputContext,
    prompter: &mut dyn Prompter,
) -> Result<Vec<String>> {
    if let Some(keys) = &args.keys {
        return resolve_selection(rows, &split_selection(keys));
    }

    let filtered = apply_filter(rows, &args.filter.to_filter())?;
    if args.all_filtered {
        return Ok(filtered.into_iter().map(|row| row.id).collect());
    }

    if ctx.is_rich() {
        let table = CatalogTable::new(&filtered, ctx.theme()).title(format!("{} test(s)", filtered.len()));
        ctx.render(&table.build());
    } else {
        for row in &filtered {
            eprintln!("{:>4}. {} {}", row.index, row.key, row.summary);
        }
    }
    let input = prompter.read_selection()?;
    resolve_selection(rows, &split_selection(&input))
}

fn print_report(report: &ExportReport, ctx: &OutputContext) {
    let theme = ctx.theme();
    let mut panel = SummaryPanel::new("Export", theme);
    panel
        .entry("Selected", report.selected)
        .entry("State", report.state)
        .entry("Attachments checked", report.attachments.checked)
        .entry("Attachments missing", report.attachments.missing.len());
    if !report.attachments.unauthorized.is_empty() {
        panel.add(
            "Attachment checks refused",
            report.attachments.unauthorized.len(),
            theme.error.clone(),
        );
    }
    if let Some(repair) = &report.repair {
        panel
            .entry("Attachments re-uploaded", repair.uploaded.len())
            .entry("Markers remapped", report.remapped_fields);
    }
    if !report.blocked.is_empty() {
        panel.add("Blocked", report.blocked.len(), theme.warning.clone());
    }
    if let Some(bundle) = &report.datasets_bundle {
        panel.entry("Datasets", bundle.display());
    }
    if let Some(dump) = &report.json_dump {
        panel.entry("Payload", dump.display());
    }
    if let Some(upload) = &report.upload {
        panel.entry("Import job", &upload.job_id).entry("Submitted", upload.submitted);
        if let Some(status) = &upload.last_status {
            let style = if status.is_success() {
                theme.success.clone()
            } else {
                theme.error.clone()
            };
            panel.add("Result", status.message(), style);
        }
    }
    panel.show(ctx);

    for id in &report.blocked {
        ctx.warning(&format!(
            "Test {id} has no usable key or project prefix and was not uploaded"
        ));
    }
    if report.dry_run {
        ctx.info("Dry run: nothing was sent to Xray.");
    } else if report.declined {
        ctx.info("Upload cancelled.");
    } else if report.upload.as_ref().is_some_and(|upload| upload.timed_out) {
        ctx.warning("The import was still running when polling stopped; check Xray for the result");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config_layer;
    use crate::export::ScriptedPrompter;
    use crate::model::TestType;

    fn row(index: usize, id: &str, key: &str) -> CatalogRow {
        CatalogRow {
            index,
            id: id.to_string(),
            key: key.to_string(),
            summary: format!("summary {index}"),
            assignee: String::new(),
            reporter: String::new(),
            status: "Open".to_string(),
            test_type: TestType::Manual,
            step_count: 0,
            preconditions: Vec::new(),
            has_dataset: false,
        }
    }

    fn rows() -> Vec<CatalogRow> {
        vec![row(1, "100", "P-1"), row(2, "101", "P-2"), row(3, "102", "Q-7")]
    }

    fn quiet() -> OutputContext {
        OutputContext::from_flags(false, true, true)
    }

    #[test]
    fn explicit_keys_win() {
        let args = ExportArgs {
            keys: Some("p-2, Q-7".to_string()),
            ..Default::default()
        };
        let mut prompter = ScriptedPrompter::default();
        let ids = select_tests(&args, &rows(), &quiet(), &mut prompter).expect("select");
        assert_eq!(ids, vec!["101", "102"]);
    }

    #[test]
    fn all_filtered_takes_the_filtered_rows() {
        let mut args = ExportArgs {
            all_filtered: true,
            ..Default::default()
        };
        args.filter.key = Some("p-".to_string());
        let mut prompter = ScriptedPrompter::default();
        let ids = select_tests(&args, &rows(), &quiet(), &mut prompter).expect("select");
        assert_eq!(ids, vec!["100", "101"]);
    }

    #[test]
    fn prompt_selection_is_resolved() {
        let args = ExportArgs::default();
        let mut prompter = ScriptedPrompter::default().with_selection("P-1");
        let ids = select_tests(&args, &rows(), &quiet(), &mut prompter).expect("select");
        assert_eq!(ids, vec!["100"]);
    }

    #[test]
    fn default_attachments_dir_is_todays() {
        let settings = Settings::from_layer(&default_config_layer()).expect("settings");
        let dir = attachments_dir(&ExportArgs::default(), &settings);
        assert!(
            dir.to_string_lossy()
                .ends_with(&format!("XRAY-{}-attachment", today_stamp()))
        );
    }
}

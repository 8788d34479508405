//! List command implementation.
//!
//! The test catalog of an extracted backup, filtered and sorted. Supports
//! text, JSON, and CSV formats.

use super::backup_dir;
use crate::catalog::{CatalogRow, apply_filter, build_rows};
use crate::cli::{ListArgs, OutputFormat};
use crate::config::{self, CliOverrides};
use crate::error::Result;
use crate::format::{TextFormatOptions, csv, format_catalog_line, terminal_width};
use crate::output::{CatalogColumns, CatalogTable, OutputContext};
use crate::scan::BackupSnapshot;
use std::io::IsTerminal;

/// Execute the list command.
///
/// # Errors
///
/// Returns an error if the backup directory is missing, the metadata cache
/// is malformed, or the filters are invalid.
pub fn execute(args: &ListArgs, ctx: &OutputContext, cli: &CliOverrides) -> Result<()> {
    let settings = config::load_settings(cli)?;
    let dir = backup_dir(args.dir.as_deref(), &settings);
    let snapshot = BackupSnapshot::load(&dir, None, &settings.backup.cache_file)?;
    let rows = apply_filter(&build_rows(&snapshot), &args.filter.to_filter())?;

    if !snapshot.warnings.is_empty() {
        ctx.warning(&format!(
            "{} backup file(s) or item(s) could not be read; run with -v for details",
            snapshot.warnings.len()
        ));
    }

    if ctx.is_json() || args.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if args.format == OutputFormat::Csv {
        let fields = csv::parse_fields(args.fields.as_deref());
        print!("{}", csv::format_csv(&rows, &fields));
        return Ok(());
    }
    if ctx.is_quiet() {
        return Ok(());
    }

    print_text(&rows, args, ctx);
    Ok(())
}

fn print_text(rows: &[CatalogRow], args: &ListArgs, ctx: &OutputContext) {
    if rows.is_empty() {
        ctx.info("No tests match the filters.");
        return;
    }

    if ctx.is_rich() {
        let columns = if args.wide {
            CatalogColumns::full()
        } else {
            CatalogColumns::standard()
        };
        let table = CatalogTable::new(rows, ctx.theme())
            .columns(columns)
            .title(format!("{} test(s)", rows.len()));
        ctx.render(&table.build());
        return;
    }

    let options = TextFormatOptions {
        use_color: ctx.use_color(),
        max_width: std::io::stdout().is_terminal().then(terminal_width),
    };
    for row in rows {
        println!("{}", format_catalog_line(row, options));
    }
    println!("\n{} test(s)", rows.len());
}

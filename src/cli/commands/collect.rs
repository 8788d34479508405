//! Collect command: the sorted id set of an extracted backup.

use super::backup_dir;
use crate::cli::CollectArgs;
use crate::config::{self, CliOverrides};
use crate::error::Result;
use crate::output::OutputContext;
use crate::scan::collect_issue_ids;

/// Execute the collect command.
///
/// # Errors
///
/// Returns an error if the directory is missing or a backup file is malformed.
pub fn execute(args: &CollectArgs, ctx: &OutputContext, cli: &CliOverrides) -> Result<()> {
    let settings = config::load_settings(cli)?;
    let dir = backup_dir(args.dir.as_deref(), &settings);
    let ids = collect_issue_ids(&dir)?;

    if ctx.is_json() {
        ctx.json(&ids);
        return Ok(());
    }
    if ctx.is_quiet() {
        return Ok(());
    }

    ctx.info(&format!("{} issue id(s) in {}", ids.len(), dir.display()));
    for id in &ids {
        println!("{id}");
    }
    Ok(())
}

use clap::Parser;
use std::io::{self, IsTerminal};
use xray_porter::cli::commands;
use xray_porter::cli::{Cli, Commands};
use xray_porter::config;
use xray_porter::logging::init_logging;
use xray_porter::output::OutputContext;
use xray_porter::{StructuredError, XportError};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let overrides = build_cli_overrides(&cli);
    let ctx = OutputContext::from_args(&cli);

    let result = match &cli.command {
        Commands::Backup(args) => commands::backup::execute(args, &ctx, &overrides),
        Commands::Collect(args) => commands::collect::execute(args, &ctx, &overrides),
        Commands::Metadata(args) => commands::metadata::execute(args, &ctx, &overrides),
        Commands::List(args) => commands::list::execute(args, &ctx, &overrides),
        Commands::Export(args) => commands::export::execute(args, &ctx, &overrides),
        Commands::Config(args) => commands::config::execute(args, &ctx, &overrides),
        Commands::Completions(args) => commands::completions::execute(args),
    };

    if let Err(e) = result {
        handle_error(&e, cli.json);
    }
}

/// Handle errors with structured output support.
///
/// When --json is set or stdout is not a TTY, outputs structured JSON to stderr.
/// Otherwise, outputs human-readable error with optional color.
fn handle_error(err: &XportError, json_mode: bool) -> ! {
    let structured = StructuredError::from_error(err);
    let exit_code = structured.code.exit_code();

    let use_json = json_mode || !io::stdout().is_terminal();

    if use_json {
        let json = structured.to_json();
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
        );
    } else {
        let use_color = io::stderr().is_terminal();
        eprintln!("{}", structured.to_human(use_color));
    }

    std::process::exit(exit_code);
}

fn build_cli_overrides(cli: &Cli) -> config::CliOverrides {
    let mut overrides = config::CliOverrides {
        config: cli.config.clone(),
        http_timeout: cli.timeout,
        ..Default::default()
    };
    match &cli.command {
        Commands::Backup(args) => {
            overrides.output_dir.clone_from(&args.output_dir);
            overrides.extract_dir.clone_from(&args.extract_dir);
        }
        Commands::Export(args) => overrides.auto_delay = args.delay,
        _ => {}
    }
    overrides
}

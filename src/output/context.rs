use super::Theme;
use crate::cli::Cli;
use rich_rust::prelude::*;
use rich_rust::renderables::Renderable;
use serde::Serialize;
use std::io::IsTerminal;
use tracing::error;

/// Central output coordinator that respects json/quiet/plain modes.
pub struct OutputContext {
    console: Console,
    theme: Theme,
    mode: OutputMode,
    width: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Full rich formatting (tables, colors, panels)
    Rich,
    /// Plain text, no ANSI codes (for piping)
    Plain,
    /// JSON output only
    Json,
    /// Minimal output (quiet mode)
    Quiet,
}

impl OutputContext {
    /// Create from CLI global args
    #[must_use]
    pub fn from_args(args: &Cli) -> Self {
        Self::from_flags(args.json, args.quiet, args.no_color)
    }

    /// Create from CLI-style flags.
    #[must_use]
    pub fn from_flags(json: bool, quiet: bool, no_color: bool) -> Self {
        let mode = if json {
            OutputMode::Json
        } else if quiet {
            OutputMode::Quiet
        } else if no_color || std::env::var("NO_COLOR").is_ok() || !std::io::stdout().is_terminal()
        {
            OutputMode::Plain
        } else {
            OutputMode::Rich
        };
        Self::with_mode(mode)
    }

    #[must_use]
    pub fn with_mode(mode: OutputMode) -> Self {
        let console = match mode {
            OutputMode::Rich => Console::new(),
            OutputMode::Plain | OutputMode::Quiet | OutputMode::Json => {
                Console::builder().no_color().force_terminal(false).build()
            }
        };
        let width = console.width();
        Self {
            console,
            theme: Theme::default(),
            mode,
            width,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Mode Checks
    // ─────────────────────────────────────────────────────────────

    #[must_use]
    pub const fn mode(&self) -> OutputMode {
        self.mode
    }
    #[must_use]
    pub fn is_rich(&self) -> bool {
        self.mode == OutputMode::Rich
    }
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.mode == OutputMode::Quiet
    }
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.mode == OutputMode::Plain
    }
    /// Whether terminal colors may be used outside the rich console.
    #[must_use]
    pub fn use_color(&self) -> bool {
        self.is_rich()
    }
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }
    #[must_use]
    pub const fn theme(&self) -> &Theme {
        &self.theme
    }

    // ─────────────────────────────────────────────────────────────
    // Output Methods
    // ─────────────────────────────────────────────────────────────

    pub fn print(&self, content: &str) {
        match self.mode {
            OutputMode::Rich => self.console.print(content),
            OutputMode::Plain => println!("{content}"),
            OutputMode::Quiet | OutputMode::Json => {}
        }
    }

    pub fn render<R: Renderable>(&self, renderable: &R) {
        if self.is_rich() {
            self.console.print_renderable(renderable);
        }
    }

    /// Print `value` as one JSON line in json mode.
    pub fn json<T: Serialize>(&self, value: &T) {
        if self.is_json() {
            match serde_json::to_string(value) {
                Ok(json) => println!("{json}"),
                Err(err) => error!(error = %err, "Could not serialize output"),
            }
        }
    }

    pub fn json_pretty<T: Serialize>(&self, value: &T) {
        if self.is_json() {
            match serde_json::to_string_pretty(value) {
                Ok(json) => println!("{json}"),
                Err(err) => error!(error = %err, "Could not serialize output"),
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Semantic Output Methods
    // ─────────────────────────────────────────────────────────────

    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Rich => self.console.print(&format!("[bold green]✓[/] {message}")),
            OutputMode::Plain => println!("✓ {message}"),
            OutputMode::Quiet | OutputMode::Json => {}
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Rich => {
                let panel = Panel::from_text(message).title(Text::new("Error"));
                self.console.print_renderable(&panel);
            }
            OutputMode::Plain | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => {}
        }
    }

    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Rich => self
                .console
                .print(&format!("[bold yellow]⚠[/] [yellow]{message}[/]")),
            OutputMode::Plain => eprintln!("Warning: {message}"),
            OutputMode::Quiet | OutputMode::Json => {}
        }
    }

    pub fn info(&self, message: &str) {
        match self.mode {
            OutputMode::Rich => self.console.print(&format!("[blue]ℹ[/] {message}")),
            OutputMode::Plain => println!("{message}"),
            OutputMode::Quiet | OutputMode::Json => {}
        }
    }

    pub fn section(&self, title: &str) {
        if self.is_rich() {
            self.console
                .print_renderable(&Rule::with_title(Text::new(title)));
        } else if self.is_plain() {
            println!("\n─── {title} ───\n");
        }
    }

    pub fn newline(&self) {
        if !self.is_quiet() && !self.is_json() {
            println!();
        }
    }
}

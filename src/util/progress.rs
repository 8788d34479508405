//! Progress indicator utilities for long-running operations.
//!
//! Provides:
//! - Determinate progress bars for metadata batches and uploads
//! - Byte counters for archive downloads
//! - Spinners for job polling
//! - Conditional display based on terminal detection

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{IsTerminal, stderr};
use std::time::Duration;

/// Check if we should show progress indicators.
///
/// Progress is shown only if stderr is an interactive terminal.
#[must_use]
pub fn should_show_progress() -> bool {
    stderr().is_terminal()
}

/// Create a determinate progress bar for operations with known total count.
#[must_use]
pub fn create_progress_bar(total: u64, message: &str, show: bool) -> ProgressBar {
    let pb = ProgressBar::new(total);

    if show {
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
    } else {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    pb
}

/// Create a byte counter for streamed downloads of unknown length.
#[must_use]
pub fn create_download_bar(message: &str, show: bool) -> ProgressBar {
    let pb = ProgressBar::new_spinner();

    if show {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} {bytes} ({bytes_per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
    } else {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    pb
}

/// Create a spinner for indeterminate operations.
#[must_use]
pub fn create_spinner(message: &str, show: bool) -> ProgressBar {
    let pb = ProgressBar::new_spinner();

    if show {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
    } else {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    pb
}

/// Progress bar wrapper that tracks whether we're showing output.
pub struct ProgressTracker {
    bar: ProgressBar,
    showing: bool,
}

impl ProgressTracker {
    /// Create a new progress tracker with a determinate total.
    #[must_use]
    pub fn new(total: u64, message: &str) -> Self {
        let showing = should_show_progress();
        Self {
            bar: create_progress_bar(total, message, showing),
            showing,
        }
    }

    /// Create a new spinner tracker for indeterminate operations.
    #[must_use]
    pub fn new_spinner(message: &str) -> Self {
        let showing = should_show_progress();
        Self {
            bar: create_spinner(message, showing),
            showing,
        }
    }

    /// A tracker that never draws, for library callers and tests.
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            bar: create_progress_bar(0, "", false),
            showing: false,
        }
    }

    pub fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.bar.set_message(message.into());
    }

    pub fn finish_with_message(&self, message: impl Into<String>) {
        self.bar.finish_with_message(message.into());
    }

    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }

    #[must_use]
    pub const fn is_showing(&self) -> bool {
        self.showing
    }

    #[must_use]
    pub const fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

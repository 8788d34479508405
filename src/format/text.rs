//! Text formatting functions for `xray_porter`.
//!
//! Plain-text catalog lines for plain mode and piped output:
//! - Test type badges ([manual], [generic], [cucumber])
//! - Width-aware truncation
//! - Catalog line formatting

use crate::catalog::CatalogRow;
use crate::model::TestType;
use crossterm::style::Stylize;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Formatting options for text output.
#[derive(Debug, Clone, Copy)]
pub struct TextFormatOptions {
    pub use_color: bool,
    pub max_width: Option<usize>,
}

impl TextFormatOptions {
    #[must_use]
    pub const fn plain() -> Self {
        Self {
            use_color: false,
            max_width: None,
        }
    }
}

/// Format a test type as a lowercase badge.
#[must_use]
pub fn format_type_badge(test_type: TestType) -> String {
    format!("[{}]", test_type.as_str().to_lowercase())
}

fn colored_type_badge(test_type: TestType) -> String {
    let label = test_type.as_str().to_lowercase();
    let styled = match test_type {
        TestType::Manual => label.cyan().to_string(),
        TestType::Generic => label.yellow().to_string(),
        TestType::Cucumber => label.green().to_string(),
    };
    format!("[{styled}]")
}

/// Determine terminal width from environment (falls back to 80).
#[must_use]
pub fn terminal_width() -> usize {
    if let Ok(columns) = std::env::var("COLUMNS") {
        if let Ok(value) = columns.trim().parse::<usize>() {
            if value > 0 {
                return value;
            }
        }
    }
    crossterm::terminal::size().map_or(80, |(width, _)| usize::from(width).max(20))
}

fn take_width(text: &str, max: usize) -> String {
    let mut width = 0;
    let mut out = String::new();
    for c in text.chars() {
        let cw = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + cw > max {
            break;
        }
        width += cw;
        out.push(c);
    }
    out
}

/// Truncate text to fit within `max_len` visible columns.
///
/// Handles wide characters (emojis, CJK) correctly using `unicode-width`.
#[must_use]
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if max_len == 0 {
        return String::new();
    }
    if UnicodeWidthStr::width(text) <= max_len {
        return text.to_string();
    }
    if max_len <= 3 {
        return take_width(text, max_len);
    }
    let mut out = take_width(text, max_len - 3);
    out.push_str("...");
    out
}

/// Format one catalog row on a single line.
///
/// Format: `{index}. {key} [{type}] {summary}`; a missing key shows as
/// `(no key)`.
#[must_use]
pub fn format_catalog_line(row: &CatalogRow, options: TextFormatOptions) -> String {
    let key = if row.key.is_empty() {
        "(no key)"
    } else {
        row.key.as_str()
    };
    let badge_plain = format_type_badge(row.test_type);
    let prefix = format!("{:>4}. {key} ", row.index);
    let prefix_len = UnicodeWidthStr::width(prefix.as_str()) + badge_plain.len() + 1;

    let summary = options.max_width.map_or_else(
        || row.summary.clone(),
        |width| truncate_text(&row.summary, width.saturating_sub(prefix_len)),
    );

    if options.use_color {
        let key = if row.key.is_empty() {
            key.dark_grey().to_string()
        } else {
            key.bold().to_string()
        };
        format!(
            "{:>4}. {key} {} {summary}",
            row.index,
            colored_type_badge(row.test_type)
        )
    } else {
        format!("{prefix}{badge_plain} {summary}")
    }
}

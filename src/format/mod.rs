//! Output formatting for `xray_porter`.
//!
//! Supports human-readable text output, machine-parseable JSON, and CSV.
//!
//! # CSV Output
//!
//! The [`csv`] module provides CSV formatting with:
//! - Configurable field selection via `--fields`
//! - Proper escaping of commas, quotes, and newlines
//! - Dataset sheets for data-driven tests

pub mod csv;
mod text;

pub use text::{
    TextFormatOptions, format_catalog_line, format_type_badge, terminal_width, truncate_text,
};

//! Shared utilities for `xray_porter`.
//!
//! - ZIP archive helpers
//! - Fixed-interval polling (backup and import jobs)
//! - Progress indicators (batch fetches, downloads, polling)
//! - Backup date stamps and `modified since` parsing

pub mod archive;
pub mod poll;
pub mod progress;
pub mod time;

pub use poll::{PollPolicy, PollStep, pause, poll};

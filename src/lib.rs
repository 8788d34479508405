//! `xray_porter` - back up Xray test data, enrich it with Jira metadata and
//! re-export selected tests into Xray.
//!
//! The library is organised around the backup and export workflows:
//!
//! - [`backup`] triggers, polls, downloads and unpacks Xray backups
//! - [`scan`] reads the unpacked backup files
//! - [`metadata`] fetches Jira metadata for every collected issue id
//! - [`catalog`] builds the filterable test table
//! - [`export`] reconciles keys and attachments, then uploads the tests
//!
//! Remote services sit behind the traits in [`client`] so every workflow can
//! run against in-memory fakes.

#![forbid(unsafe_code)]
#![allow(clippy::must_use_candidate)]

pub mod backup;
pub mod catalog;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod output;
pub mod scan;
pub mod util;

pub use error::{ErrorCode, Result, StructuredError, XportError};

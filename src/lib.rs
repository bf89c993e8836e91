//! sheetsync - spreadsheet round-trips against a typed schema.
//!
//! An operator defines templates of named, typed columns, exports them as
//! `.xlsx` workbooks, edits the sheets elsewhere, and imports them back. The
//! imported sheet is authoritative: it updates, creates and deletes stored
//! records in a single transaction, or changes nothing at all.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Template, ColumnDefinition, Record, CellValue)
//! - [`coerce`] - Per-cell type coercion
//! - [`storage`] - SQLite schema store
//! - [`sync`] - Header validation, planning and atomic execution
//! - [`jobs`] - Background import jobs and their status records
//! - [`config`] - Configuration management
//! - [`validate`] - Operator input validation
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod coerce;
pub mod config;
pub mod error;
pub mod jobs;
pub mod model;
pub mod storage;
pub mod sync;
pub mod validate;

pub use error::{Error, Result};

/// Global quiet flag for `--quiet`.
///
/// When set, commands skip success chatter. Errors and requested data
/// (listings, JSON) are still printed.
pub static QUIET: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

/// Check if quiet mode is active.
#[inline]
pub fn is_quiet() -> bool {
    QUIET.load(std::sync::atomic::Ordering::Relaxed)
}

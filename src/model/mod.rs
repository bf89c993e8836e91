//! Data models for sheetsync.
//!
//! This module contains all domain models:
//! - Template (named schema)
//! - ColumnDefinition / DataType
//! - Record (stored row with field values)
//! - CellValue (raw spreadsheet cell)

pub mod cell;
pub mod column;
pub mod record;
pub mod template;

pub use cell::CellValue;
pub use column::{normalize_header, ColumnDefinition, DataType};
pub use record::Record;
pub use template::Template;

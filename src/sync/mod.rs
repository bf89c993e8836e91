//! Spreadsheet synchronization.
//!
//! An exported sheet is edited outside the tool and imported back; the sheet
//! then becomes the source of truth for the template's records.
//!
//! # Pipeline
//!
//! 1. [`header`] - match the header row to the template's columns
//! 2. [`planner`] - classify rows as updates or creates, derive deletes
//! 3. [`validation`] - check every planned row before anything is written
//! 4. [`executor`] - apply the plan in one transaction under a fresh batch id
//!
//! Any error in steps 1-3 fails the whole import with the store untouched.
//!
//! # File Format
//!
//! The first row holds headers. An optional first column named
//! `__record_id` carries record identities; it is hidden in exports. With
//! that column present, stored records missing from the sheet are deleted.
//! Without it, the import only adds records.
//!
//! # Example
//!
//! ```ignore
//! use sheetsync::sync::{ExportMode, Exporter, Importer};
//!
//! let bytes = Exporter::new(&storage).generate_export(&template, ExportMode::WithData)?;
//! // ... edit the sheet ...
//! let outcome = Importer::new(&mut storage, "alice").process_import(&path, &template)?;
//! println!("{}", outcome.summary());
//! ```

pub mod executor;
mod export;
mod file;
pub mod header;
mod import;
pub mod planner;
mod types;
pub mod validation;

pub use executor::execute_plan;
pub use export::{sample_value, ExportMode, Exporter, DEFAULT_SAMPLE_ROWS, MAX_SAMPLE_ROWS};
pub use file::{atomic_write, check_input, read_sheet, SheetData, SUPPORTED_EXTENSIONS};
pub use header::{
    detect_identity_column, suggest_mappings, validate_headers, HeaderValidation,
    MappingSuggestion, SIMILARITY_THRESHOLD,
};
pub use import::Importer;
pub use planner::{build_plan, parse_identity};
pub use types::{
    FieldChanges, ImportOutcome, PlannedCreate, PlannedUpdate, RowError, SyncCounts, SyncPlan,
    IDENTITY_COLUMN, MAX_FILE_SIZE,
};
pub use validation::validate_plan;

//! Spreadsheet import.
//!
//! The [`Importer`] runs the pipeline: header validation, planning, the
//! validation pass, then the transactional executor. Everything wrong with
//! the file itself is reported inside the returned [`ImportOutcome`];
//! only storage faults surface as [`Error`].

use std::path::Path;

use crate::error::{Error, Result};
use crate::model::Template;
use crate::storage::sqlite::SqliteStorage;
use crate::sync::executor::execute_plan;
use crate::sync::file::{read_sheet, SheetData};
use crate::sync::header::{detect_identity_column, suggest_mappings, validate_headers};
use crate::sync::planner::build_plan;
use crate::sync::types::ImportOutcome;
use crate::sync::validation::validate_plan;

/// Importer for spreadsheet files.
///
/// The sheet is authoritative: rows with a known identity update, rows
/// without one create, and stored records missing from a sheet that has
/// an identity column are deleted.
pub struct Importer<'a> {
    storage: &'a mut SqliteStorage,
    actor: String,
}

impl<'a> Importer<'a> {
    /// Create a new importer recording events as `actor`.
    #[must_use]
    pub fn new(storage: &'a mut SqliteStorage, actor: &str) -> Self {
        Self {
            storage,
            actor: actor.to_string(),
        }
    }

    /// Import a spreadsheet file into `template`.
    ///
    /// # Errors
    ///
    /// Returns an error only for storage failures while reading state.
    pub fn process_import(&mut self, path: &Path, template: &Template) -> Result<ImportOutcome> {
        match read_sheet(path) {
            Ok(sheet) => self.run(template, &sheet, true),
            Err(e) => input_failure(e),
        }
    }

    /// Validate and plan an import without applying it.
    ///
    /// The outcome carries the counts the import would produce.
    ///
    /// # Errors
    ///
    /// Returns an error only for storage failures while reading state.
    pub fn dry_run(&mut self, path: &Path, template: &Template) -> Result<ImportOutcome> {
        match read_sheet(path) {
            Ok(sheet) => self.run(template, &sheet, false),
            Err(e) => input_failure(e),
        }
    }

    /// Import an already parsed sheet.
    ///
    /// # Errors
    ///
    /// Returns an error only for storage failures while reading state.
    pub fn import_rows(&mut self, template: &Template, sheet: &SheetData) -> Result<ImportOutcome> {
        self.run(template, sheet, true)
    }

    fn run(&mut self, template: &Template, sheet: &SheetData, execute: bool) -> Result<ImportOutcome> {
        let has_identity = detect_identity_column(&sheet.headers);
        let headers = validate_headers(&sheet.headers, &template.columns, has_identity);

        if !headers.valid {
            tracing::info!(template = %template.name, missing = ?headers.missing, "header validation failed");
            let mut warnings = headers.warnings;
            warnings.extend(
                suggest_mappings(&headers.extra, &headers.missing)
                    .into_iter()
                    .map(|s| {
                        format!(
                            "Header '{}' looks like '{}'; rename it to match the template",
                            s.file_header, s.schema_header
                        )
                    }),
            );
            return Ok(ImportOutcome::failure(headers.errors).with_warnings(warnings));
        }

        let existing = self.storage.record_ids(template.id)?;
        let plan = build_plan(&sheet.rows, &headers.column_map, has_identity, &existing);

        if let Err(errors) = validate_plan(&plan, &template.columns, &existing) {
            return Ok(ImportOutcome::from_row_errors(errors).with_warnings(headers.warnings));
        }

        if !execute {
            return Ok(ImportOutcome {
                success: true,
                created: plan.to_create.len(),
                updated: plan.distinct_updates(),
                deleted: plan.to_delete.len(),
                dry_run: true,
                ..ImportOutcome::default()
            }
            .with_warnings(headers.warnings));
        }

        Ok(execute_plan(self.storage, template.id, &plan, &self.actor).with_warnings(headers.warnings))
    }
}

/// Turn a file problem into a failed outcome; pass storage faults through.
fn input_failure(err: Error) -> Result<ImportOutcome> {
    match err {
        Error::UnsupportedFormat { .. }
        | Error::FileTooLarge { .. }
        | Error::Spreadsheet(_)
        | Error::Io(_) => {
            tracing::info!(error = %err, "import input rejected");
            Ok(ImportOutcome::failure(vec![err.to_string()]))
        }
        other => Err(other),
    }
}

//! Spreadsheet export.
//!
//! Every export starts with the hidden identity column, followed by one
//! column per template column in position order. Re-importing an unedited
//! data export is a no-op apart from batch stamps.

use chrono::{Days, NaiveDate};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::coerce::to_cell;
use crate::error::{Error, Result};
use crate::model::{CellValue, DataType, Template};
use crate::storage::sqlite::SqliteStorage;
use crate::sync::types::IDENTITY_COLUMN;

/// Sample rows generated when no count is given.
pub const DEFAULT_SAMPLE_ROWS: usize = 5;

/// Largest sample row count accepted.
pub const MAX_SAMPLE_ROWS: usize = 1000;

/// What goes below the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    /// Header row only.
    HeadersOnly,
    /// Every stored record, by id.
    WithData,
    /// The given number of placeholder rows.
    WithSamples(usize),
}

/// Builds `.xlsx` workbooks from a template.
pub struct Exporter<'a> {
    storage: &'a SqliteStorage,
}

impl<'a> Exporter<'a> {
    #[must_use]
    pub fn new(storage: &'a SqliteStorage) -> Self {
        Self { storage }
    }

    /// Generate the workbook bytes for `template`.
    ///
    /// # Errors
    ///
    /// Returns an error if records cannot be read, the sample count is out
    /// of range, or the workbook cannot be written.
    pub fn generate_export(&self, template: &Template, mode: ExportMode) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(sheet_name(&template.name))?;

        write_headers(sheet, template)?;

        let rows = match mode {
            ExportMode::HeadersOnly => 0,
            ExportMode::WithData => self.write_records(sheet, template)?,
            ExportMode::WithSamples(count) => {
                if count == 0 || count > MAX_SAMPLE_ROWS {
                    return Err(Error::InvalidArgument(format!(
                        "Sample rows must be between 1 and {MAX_SAMPLE_ROWS}"
                    )));
                }
                write_samples(sheet, template, count)?
            }
        };

        tracing::debug!(template = %template.name, ?mode, rows, "export generated");
        Ok(workbook.save_to_buffer()?)
    }

    fn write_records(&self, sheet: &mut Worksheet, template: &Template) -> Result<usize> {
        let records = self.storage.list_records(template.id)?;
        for (index, record) in records.iter().enumerate() {
            let row = sheet_row(index)?;
            #[allow(clippy::cast_precision_loss)]
            let identity = record.id as f64;
            sheet.write_number(row, 0, identity)?;
            for (offset, column) in template.columns.iter().enumerate() {
                if let Some(value) = record.value(column.id) {
                    write_cell(sheet, row, sheet_col(offset)?, &to_cell(value, column.data_type))?;
                }
            }
        }
        Ok(records.len())
    }
}

fn write_headers(sheet: &mut Worksheet, template: &Template) -> Result<()> {
    let bold = Format::new().set_bold();
    sheet.write_string(0, 0, IDENTITY_COLUMN)?;
    sheet.set_column_hidden(0)?;
    for (offset, column) in template.columns.iter().enumerate() {
        let col = sheet_col(offset)?;
        sheet.write_string_with_format(0, col, &column.name, &bold)?;
        let width = column.name.chars().count().clamp(10, 40) + 2;
        sheet.set_column_width(col, u32::try_from(width).unwrap_or(42))?;
    }
    Ok(())
}

fn write_samples(sheet: &mut Worksheet, template: &Template, count: usize) -> Result<usize> {
    for index in 0..count {
        let row = sheet_row(index)?;
        for (offset, column) in template.columns.iter().enumerate() {
            let cell = sample_value(&column.name, column.data_type, index + 1);
            write_cell(sheet, row, sheet_col(offset)?, &cell)?;
        }
    }
    Ok(count)
}

/// Placeholder for sample row `n` (1-based).
#[must_use]
pub fn sample_value(column_name: &str, data_type: DataType, n: usize) -> CellValue {
    match data_type {
        DataType::String => CellValue::String(format!("Sample {column_name} {n}")),
        #[allow(clippy::cast_precision_loss)]
        DataType::Number => CellValue::Number((n * 10) as f64),
        DataType::Date => NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.checked_add_days(Days::new(n as u64 - 1)))
            .map_or(CellValue::Empty, CellValue::from),
        DataType::Boolean => CellValue::Boolean(n % 2 == 1),
    }
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, cell: &CellValue) -> Result<()> {
    match cell {
        CellValue::Empty => {}
        CellValue::String(s) => {
            sheet.write_string(row, col, s)?;
        }
        CellValue::Number(n) => {
            sheet.write_number(row, col, *n)?;
        }
        CellValue::Boolean(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        // ISO text keeps the stored form without depending on a cell format.
        CellValue::Date(_) => {
            sheet.write_string(row, col, cell.as_text())?;
        }
    }
    Ok(())
}

fn sheet_row(index: usize) -> Result<u32> {
    u32::try_from(index + 1).map_err(|_| Error::Spreadsheet("too many rows to export".into()))
}

fn sheet_col(offset: usize) -> Result<u16> {
    u16::try_from(offset + 1).map_err(|_| Error::Spreadsheet("too many columns to export".into()))
}

/// Worksheet names are limited to 31 characters and exclude `[]:*?/\`.
fn sheet_name(template_name: &str) -> String {
    let cleaned: String = template_name
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(31)
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim().to_string();
    if cleaned.is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::file::{read_sheet, SheetData};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn setup() -> (SqliteStorage, Template) {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let template = storage.create_template("People", "tester").unwrap();
        for (name, dt) in [
            ("Name", DataType::String),
            ("Age", DataType::Number),
            ("Born", DataType::Date),
            ("Active", DataType::Boolean),
        ] {
            storage.add_column(template.id, name, dt, false, "tester").unwrap();
        }
        let template = storage.get_template(template.id).unwrap().unwrap();
        (storage, template)
    }

    fn read_back(bytes: &[u8]) -> SheetData {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.xlsx");
        std::fs::write(&path, bytes).unwrap();
        read_sheet(&path).unwrap()
    }

    #[test]
    fn test_headers_only() {
        let (storage, template) = setup();
        let bytes = Exporter::new(&storage)
            .generate_export(&template, ExportMode::HeadersOnly)
            .unwrap();
        let sheet = read_back(&bytes);
        assert_eq!(sheet.headers, vec![IDENTITY_COLUMN, "Name", "Age", "Born", "Active"]);
        assert!(sheet.rows.is_empty());
    }

    #[test]
    fn test_with_data_writes_identity_and_typed_values() {
        let (mut storage, template) = setup();
        let ids: Vec<i64> = template.columns.iter().map(|c| c.id).collect();
        let values = BTreeMap::from([
            (ids[0], "Ada".to_string()),
            (ids[1], "36.5".to_string()),
            (ids[2], "1815-12-10".to_string()),
            (ids[3], "true".to_string()),
        ]);
        let id = storage.create_record(template.id, &values, "tester").unwrap();

        let bytes = Exporter::new(&storage)
            .generate_export(&template, ExportMode::WithData)
            .unwrap();
        let sheet = read_back(&bytes);
        assert_eq!(sheet.rows.len(), 1);
        #[allow(clippy::cast_precision_loss)]
        let expected_id = CellValue::Number(id as f64);
        assert_eq!(sheet.rows[0][0], expected_id);
        assert_eq!(sheet.rows[0][1], CellValue::from("Ada"));
        assert_eq!(sheet.rows[0][2], CellValue::Number(36.5));
        assert_eq!(sheet.rows[0][3], CellValue::from("1815-12-10"));
        assert_eq!(sheet.rows[0][4], CellValue::Boolean(true));
    }

    #[test]
    fn test_samples() {
        let (storage, template) = setup();
        let bytes = Exporter::new(&storage)
            .generate_export(&template, ExportMode::WithSamples(3))
            .unwrap();
        let sheet = read_back(&bytes);
        assert_eq!(sheet.rows.len(), 3);
        assert!(sheet.rows[0][0].is_empty());
        assert_eq!(sheet.rows[2][1], CellValue::from("Sample Name 3"));
        assert_eq!(sheet.rows[1][3], CellValue::from("2024-01-02"));
    }

    #[test]
    fn test_sample_count_bounds() {
        let (storage, template) = setup();
        let exporter = Exporter::new(&storage);
        assert!(exporter.generate_export(&template, ExportMode::WithSamples(0)).is_err());
        assert!(exporter
            .generate_export(&template, ExportMode::WithSamples(MAX_SAMPLE_ROWS + 1))
            .is_err());
    }

    #[test]
    fn test_sheet_name_is_sanitized() {
        assert_eq!(sheet_name("a/b:c"), "a_b_c");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), 31);
        assert_eq!(sheet_name("''"), "Sheet1");
    }
}

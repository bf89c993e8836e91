//! Spreadsheet file operations.
//!
//! Reading goes through calamine and accepts `.xlsx` and legacy `.xls`.
//! Files are checked for format and size before they are opened.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Error, Result};
use crate::model::CellValue;
use crate::sync::types::MAX_FILE_SIZE;

/// Extensions accepted for import.
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

/// The first worksheet of a file: header row plus data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetData {
    /// Header cells as text, in sheet order.
    pub headers: Vec<String>,
    /// Data rows, header excluded. Row `i` is sheet row `i + 2`.
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetData {
    /// Split raw rows into header and data.
    #[must_use]
    pub fn from_rows(mut rows: Vec<Vec<CellValue>>) -> Self {
        if rows.is_empty() {
            return Self::default();
        }
        let data = rows.split_off(1);
        let headers = rows
            .into_iter()
            .next()
            .unwrap_or_default()
            .iter()
            .map(CellValue::as_text)
            .collect();
        Self { headers, rows: data }
    }
}

/// Reject files with an unsupported extension or above [`MAX_FILE_SIZE`].
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`], [`Error::FileTooLarge`], or an
/// I/O error if the file cannot be inspected.
pub fn check_input(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(Error::UnsupportedFormat { extension });
    }

    let size = fs::metadata(path)?.len();
    if size > MAX_FILE_SIZE {
        return Err(Error::FileTooLarge {
            size,
            limit: MAX_FILE_SIZE,
        });
    }
    Ok(())
}

/// Read the first worksheet of a spreadsheet.
///
/// Cells keep their sheet type. A sheet whose used range does not start at
/// A1 is padded so that positions line up with sheet columns and rows.
///
/// # Errors
///
/// Returns an error if the file fails [`check_input`] or cannot be parsed.
pub fn read_sheet(path: &Path) -> Result<SheetData> {
    check_input(path)?;

    let mut workbook = open_workbook_auto(path)?;
    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        return Err(Error::Spreadsheet("the workbook has no worksheets".into()));
    };
    let range = workbook.worksheet_range(&sheet_name)?;

    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let col_pad = start_col as usize;

    let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; col_pad];
        cells.extend(row.iter().map(to_cell_value));
        rows.push(cells);
    }

    tracing::debug!(
        path = %path.display(),
        sheet = %sheet_name,
        rows = rows.len(),
        "sheet read"
    );

    Ok(SheetData::from_rows(rows))
}

fn to_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::String(s.clone()),
        #[allow(clippy::cast_precision_loss)]
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map_or(CellValue::Number(dt.as_f64()), CellValue::Date),
        Data::DateTimeIso(s) => parse_iso(s).map_or_else(|| CellValue::String(s.clone()), CellValue::Date),
        Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::String(e.to_string()),
    }
}

fn parse_iso(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}

/// Write bytes to a file atomically.
///
/// Content goes to a temporary sibling first, is synced to disk, then
/// renamed over the target. On failure the original file is untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use tempfile::TempDir;

    fn write_fixture(path: &Path) {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Name").unwrap();
        sheet.write_string(0, 1, "Age").unwrap();
        sheet.write_string(0, 2, "Active").unwrap();
        sheet.write_string(1, 0, "Ada").unwrap();
        sheet.write_number(1, 1, 36).unwrap();
        sheet.write_boolean(1, 2, true).unwrap();
        sheet.write_string(2, 0, "Bob").unwrap();
        workbook.save(path).unwrap();
    }

    #[test]
    fn test_read_sheet() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("people.xlsx");
        write_fixture(&path);

        let sheet = read_sheet(&path).unwrap();
        assert_eq!(sheet.headers, vec!["Name", "Age", "Active"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0][0], CellValue::from("Ada"));
        assert_eq!(sheet.rows[0][1], CellValue::Number(36.0));
        assert_eq!(sheet.rows[0][2], CellValue::Boolean(true));
        assert!(sheet.rows[1][1].is_empty());
    }

    #[test]
    fn test_offset_range_is_padded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("offset.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 1, "Name").unwrap();
        sheet.write_string(1, 1, "Ada").unwrap();
        workbook.save(&path).unwrap();

        let sheet = read_sheet(&path).unwrap();
        assert_eq!(sheet.headers, vec!["", "Name"]);
        assert_eq!(sheet.rows[0][1], CellValue::from("Ada"));
    }

    #[test]
    fn test_rejects_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("people.csv");
        fs::write(&path, "Name\nAda\n").unwrap();
        let err = read_sheet(&path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { ref extension } if extension == "csv"));
    }

    #[test]
    fn test_rejects_oversized_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("huge.xlsx");
        let file = File::create(&path).unwrap();
        file.set_len(MAX_FILE_SIZE + 1).unwrap();
        let err = check_input(&path).unwrap_err();
        assert!(matches!(err, Error::FileTooLarge { .. }));
    }

    #[test]
    fn test_garbage_xlsx_is_a_spreadsheet_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.xlsx");
        fs::write(&path, b"not a zip").unwrap();
        let err = read_sheet(&path).unwrap_err();
        assert!(matches!(err, Error::Spreadsheet(_)));
    }

    #[test]
    fn test_legacy_xls_goes_through_the_xls_reader() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.xls");
        fs::write(&path, b"not an ole2 compound file").unwrap();

        check_input(&path).unwrap();
        let err = read_sheet(&path).unwrap_err();
        assert!(matches!(err, Error::Spreadsheet(_)), "{err:?}");
    }

    #[test]
    fn test_from_rows() {
        let sheet = SheetData::from_rows(vec![
            vec!["Name".into(), 2.into()],
            vec!["Ada".into(), CellValue::Empty],
        ]);
        assert_eq!(sheet.headers, vec!["Name", "2"]);
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(SheetData::from_rows(Vec::new()), SheetData::default());
    }

    #[test]
    fn test_atomic_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.xlsx");
        atomic_write(&path, b"abc").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"abc");
        assert!(!dir.path().join("nested").join("out.xlsx.tmp").exists());
    }
}

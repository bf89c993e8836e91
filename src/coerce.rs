//! Cell type coercion.
//!
//! Converts raw spreadsheet cells into the canonical string stored for a
//! column, and back into typed cells for export. Canonical forms:
//!
//! | type      | canonical form                     |
//! |-----------|------------------------------------|
//! | `string`  | trimmed text                       |
//! | `number`  | shortest `f64` display (`30`, `2.5`) |
//! | `date`    | ISO date `YYYY-MM-DD`              |
//! | `boolean` | `true` / `false`                   |
//!
//! A blank cell resolves to "no value" (`None`) for every type.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

use crate::model::{CellValue, ColumnDefinition, DataType};
use crate::sync::RowError;

/// Words accepted as boolean `true`.
const TRUE_WORDS: [&str; 4] = ["true", "yes", "y", "1"];

/// Words accepted as boolean `false`.
const FALSE_WORDS: [&str; 4] = ["false", "no", "n", "0"];

/// Serial dates count days from this epoch.
///
/// Serial `n` maps to `epoch + n - 2` days. Existing sheets depend on the
/// two-day shift; keep it.
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);
const SERIAL_OFFSET_DAYS: i64 = 2;

/// Largest serial accepted (9999-12-31 in spreadsheet terms).
const MAX_SERIAL: f64 = 2_958_465.0;

/// Coerce one cell for `column`.
///
/// `row` is the 1-based sheet row (header is row 1) used in error messages.
///
/// Returns `Ok(None)` for a blank optional cell.
///
/// # Errors
///
/// Returns a [`RowError`] when a required cell is blank or the value cannot
/// be converted to the column's type.
pub fn coerce_cell(
    cell: &CellValue,
    column: &ColumnDefinition,
    row: usize,
) -> Result<Option<String>, RowError> {
    if cell.is_blank() {
        if column.required {
            return Err(RowError::new(
                row,
                format!("required field '{}' cannot be empty", column.name),
            ));
        }
        return Ok(None);
    }

    let value = match column.data_type {
        DataType::String => Some(coerce_string(cell)),
        DataType::Number => Some(coerce_number(cell).ok_or_else(|| {
            RowError::new(
                row,
                format!(
                    "could not convert '{}' to number for column '{}'",
                    cell.as_text(),
                    column.name
                ),
            )
        })?),
        DataType::Date => Some(coerce_date(cell).ok_or_else(|| {
            RowError::new(
                row,
                format!(
                    "could not convert '{}' to date for column '{}' (use YYYY-MM-DD or a date cell)",
                    cell.as_text(),
                    column.name
                ),
            )
        })?),
        DataType::Boolean => Some(coerce_boolean(cell).ok_or_else(|| {
            RowError::new(
                row,
                format!(
                    "invalid boolean '{}' for column '{}' (accepted: true/false, yes/no, y/n, 1/0)",
                    cell.as_text(),
                    column.name
                ),
            )
        })?),
    };

    Ok(value)
}

fn coerce_string(cell: &CellValue) -> String {
    cell.as_text().trim().to_string()
}

fn coerce_number(cell: &CellValue) -> Option<String> {
    let n = match cell {
        CellValue::Number(n) => *n,
        CellValue::String(s) => parse_number(s)?,
        CellValue::Empty | CellValue::Date(_) | CellValue::Boolean(_) => return None,
    };
    n.is_finite().then(|| format_number(n))
}

/// Parse a number, ignoring thousands separators and whitespace.
fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn coerce_date(cell: &CellValue) -> Option<String> {
    let date = match cell {
        CellValue::Date(dt) => dt.date(),
        CellValue::Number(n) => serial_to_date(*n)?,
        CellValue::String(s) => parse_date(s.trim())?,
        CellValue::Empty | CellValue::Boolean(_) => return None,
    };
    Some(date.format("%Y-%m-%d").to_string())
}

/// Parse an ISO-style date or datetime string, falling back to a serial number.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    parse_number(raw).and_then(serial_to_date)
}

/// Convert a spreadsheet serial day count into a date.
#[allow(clippy::cast_possible_truncation)]
fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 || serial > MAX_SERIAL {
        return None;
    }
    let (y, m, d) = SERIAL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d)?;
    let days = serial.trunc() as i64 - SERIAL_OFFSET_DAYS;
    epoch.checked_add_signed(Duration::days(days))
}

fn coerce_boolean(cell: &CellValue) -> Option<String> {
    let b = match cell {
        CellValue::Boolean(b) => *b,
        CellValue::Number(n) if (*n - 1.0).abs() < f64::EPSILON => true,
        CellValue::Number(n) if n.abs() < f64::EPSILON => false,
        CellValue::String(s) => {
            let word = s.trim().to_lowercase();
            if TRUE_WORDS.contains(&word.as_str()) {
                true
            } else if FALSE_WORDS.contains(&word.as_str()) {
                false
            } else {
                return None;
            }
        }
        _ => return None,
    };
    Some(b.to_string())
}

/// Canonical text for a number: no trailing `.0`, no negative zero.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    format!("{n}")
}

/// Turn a stored canonical value back into a typed cell for export.
///
/// Values that no longer parse under the column's type (e.g. after the
/// column's type was changed) are written as plain text.
#[must_use]
pub fn to_cell(value: &str, data_type: DataType) -> CellValue {
    match data_type {
        DataType::String => CellValue::String(value.to_string()),
        DataType::Number => value
            .parse::<f64>()
            .map_or_else(|_| CellValue::String(value.to_string()), CellValue::Number),
        DataType::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_or_else(|_| CellValue::String(value.to_string()), CellValue::from),
        DataType::Boolean => match value {
            "true" => CellValue::Boolean(true),
            "false" => CellValue::Boolean(false),
            other => CellValue::String(other.to_string()),
        },
    }
}

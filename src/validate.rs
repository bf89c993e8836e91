//! Input validation for operator-supplied names and types.
//!
//! Data types resolve in three tiers: exact match, synonym lookup, then an
//! error carrying the closest known spelling.

use std::collections::HashMap;
use std::sync::LazyLock;

use strsim::levenshtein;

use crate::error::{Error, Result};
use crate::model::DataType;
use crate::sync::IDENTITY_COLUMN;

/// Longest accepted template or column name.
pub const MAX_NAME_LEN: usize = 255;

// ── Synonym map ──────────────────────────────────────────────

pub static DATA_TYPE_SYNONYMS: LazyLock<HashMap<&str, DataType>> = LazyLock::new(|| {
    [
        ("text", DataType::String),
        ("str", DataType::String),
        ("int", DataType::Number),
        ("integer", DataType::Number),
        ("float", DataType::Number),
        ("decimal", DataType::Number),
        ("numeric", DataType::Number),
        ("datetime", DataType::Date),
        ("bool", DataType::Boolean),
    ]
    .into_iter()
    .collect()
});

/// Resolve a data type from operator input.
///
/// # Errors
///
/// Returns [`Error::InvalidDataType`] with the closest known name when the
/// input is neither a data type nor a synonym.
pub fn normalize_data_type(input: &str) -> Result<DataType> {
    let lower = input.trim().to_lowercase();

    if let Some(dt) = DataType::from_stored(&lower) {
        return Ok(dt);
    }

    if let Some(&dt) = DATA_TYPE_SYNONYMS.get(lower.as_str()) {
        return Ok(dt);
    }

    Err(Error::InvalidDataType {
        input: input.to_string(),
        suggestion: find_closest_match(&lower),
    })
}

/// Closest data type within three edits; synonyms report their target.
fn find_closest_match(input: &str) -> Option<String> {
    let canonical = DataType::ALL.iter().map(|dt| (dt.as_str(), *dt));
    let synonyms = DATA_TYPE_SYNONYMS.iter().map(|(k, v)| (*k, *v));

    canonical
        .chain(synonyms)
        .map(|(spelling, dt)| (levenshtein(input, spelling), dt))
        .filter(|(dist, _)| *dist <= 3)
        .min_by_key(|(dist, _)| *dist)
        .map(|(_, dt)| dt.as_str().to_string())
}

/// Check a template name.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for blank or oversized names.
pub fn validate_template_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument("Template name cannot be empty".into()));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(Error::InvalidArgument(format!(
            "Template name is longer than {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Check a column name.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for blank or oversized names and for
/// the reserved identity header.
pub fn validate_column_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument("Column name cannot be empty".into()));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(Error::InvalidArgument(format!(
            "Column name is longer than {MAX_NAME_LEN} characters"
        )));
    }
    if trimmed.eq_ignore_ascii_case(IDENTITY_COLUMN) {
        return Err(Error::InvalidArgument(format!(
            "'{IDENTITY_COLUMN}' is reserved for record identities"
        )));
    }
    Ok(trimmed.to_string())
}

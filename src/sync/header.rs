//! Header row validation and column mapping.
//!
//! Compares a sheet's header row with a template's columns. Matching is by
//! name only (trimmed, case-folded); the order of columns in the sheet does
//! not matter, although an out-of-order sheet produces a warning.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use strsim::normalized_levenshtein;

use crate::model::{normalize_header, ColumnDefinition};
use crate::sync::types::IDENTITY_COLUMN;

/// Minimum similarity for a header suggestion to be offered.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

/// Result of checking a header row against a template.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HeaderValidation {
    /// False when the sheet cannot be imported.
    pub valid: bool,
    /// Whether column 0 is the hidden identity column.
    pub has_identity_column: bool,
    /// Template headers absent from the sheet, in position order.
    pub missing: Vec<String>,
    /// Sheet headers unknown to the template, in sheet order.
    pub extra: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Sheet column index -> template column.
    #[serde(skip)]
    pub column_map: BTreeMap<usize, ColumnDefinition>,
}

/// A proposed pairing of an unmatched sheet header with a template header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingSuggestion {
    pub file_header: String,
    pub schema_header: String,
    /// `1 - edit_distance / max_length`, in `[0, 1]`.
    pub similarity: f64,
}

/// Whether the first header cell is the reserved identity column.
#[must_use]
pub fn detect_identity_column(headers: &[String]) -> bool {
    headers
        .first()
        .is_some_and(|h| normalize_header(h) == IDENTITY_COLUMN)
}

/// Validate `headers` against `columns` and build the column map.
///
/// Fails when the template has no columns, when the sheet has no headers,
/// or when any template header is missing from the sheet. Extra headers
/// and column order only produce warnings.
#[must_use]
pub fn validate_headers(
    headers: &[String],
    columns: &[ColumnDefinition],
    has_identity_column: bool,
) -> HeaderValidation {
    let mut result = HeaderValidation {
        has_identity_column,
        ..HeaderValidation::default()
    };

    if columns.is_empty() {
        result.errors.push(
            "No columns configured for this template; add columns before importing data"
                .to_string(),
        );
        return result;
    }

    let skip = usize::from(has_identity_column);
    let file_headers: Vec<(usize, &str, String)> = headers
        .iter()
        .enumerate()
        .skip(skip)
        .filter(|(_, h)| !h.trim().is_empty())
        .map(|(pos, h)| (pos, h.trim(), normalize_header(h)))
        .collect();

    if file_headers.is_empty() {
        result.missing = columns.iter().map(|c| c.name.clone()).collect();
        result.errors.push("The file has no header row".to_string());
        result
            .errors
            .push(format!("Missing headers: {}", result.missing.join(", ")));
        return result;
    }

    let file_keys: HashSet<&str> = file_headers.iter().map(|(_, _, k)| k.as_str()).collect();
    let schema_keys: HashSet<String> = columns.iter().map(ColumnDefinition::header_key).collect();

    result.missing = columns
        .iter()
        .filter(|c| !file_keys.contains(c.header_key().as_str()))
        .map(|c| c.name.clone())
        .collect();

    let mut seen_extra = HashSet::new();
    let mut seen_matched = HashSet::new();
    let mut matched_positions = Vec::new();

    for (pos, raw, key) in &file_headers {
        if !schema_keys.contains(key) {
            if seen_extra.insert(key.clone()) {
                result.extra.push((*raw).to_string());
            }
            continue;
        }
        let Some(column) = columns.iter().find(|c| c.header_key() == *key) else {
            continue;
        };
        if seen_matched.insert(key.clone()) {
            matched_positions.push(column.position);
        } else {
            result.warnings.push(format!(
                "Header '{raw}' appears more than once; the last occurrence is used"
            ));
        }
        result.column_map.insert(*pos, column.clone());
    }

    if !result.extra.is_empty() {
        result.warnings.push(format!(
            "Ignoring unknown headers: {}",
            result.extra.join(", ")
        ));
    }

    if matched_positions.windows(2).any(|w| w[0] >= w[1]) {
        result.warnings.push(
            "Columns are not in template order; values are matched by header name".to_string(),
        );
    }

    if result.missing.is_empty() {
        result.valid = true;
    } else {
        result
            .errors
            .push(format!("Missing headers: {}", result.missing.join(", ")));
    }

    result
}

/// Propose mappings between unmatched sheet headers and template headers.
///
/// For each sheet header, the most similar template header above
/// [`SIMILARITY_THRESHOLD`] is proposed. On equal similarity the first
/// template header wins.
#[must_use]
pub fn suggest_mappings(file_headers: &[String], schema_headers: &[String]) -> Vec<MappingSuggestion> {
    let mut suggestions = Vec::new();

    for file_header in file_headers {
        let file_key = normalize_header(file_header);
        let mut best: Option<MappingSuggestion> = None;

        for schema_header in schema_headers {
            let similarity = normalized_levenshtein(&file_key, &normalize_header(schema_header));
            if similarity <= SIMILARITY_THRESHOLD {
                continue;
            }
            if best.as_ref().is_none_or(|b| similarity > b.similarity) {
                best = Some(MappingSuggestion {
                    file_header: file_header.clone(),
                    schema_header: schema_header.clone(),
                    similarity,
                });
            }
        }

        if let Some(s) = best {
            suggestions.push(s);
        }
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataType;

    fn columns(names: &[&str]) -> Vec<ColumnDefinition> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ColumnDefinition {
                id: i as i64 + 100,
                template_id: 1,
                position: i as i64 + 1,
                name: (*name).to_string(),
                data_type: DataType::String,
                required: false,
            })
            .collect()
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_exact_match_is_valid() {
        let cols = columns(&["Name", "Age"]);
        let result = validate_headers(&headers(&["Name", "Age"]), &cols, false);
        assert!(result.valid);
        assert!(result.missing.is_empty());
        assert!(result.extra.is_empty());
        assert_eq!(result.column_map[&0].name, "Name");
        assert_eq!(result.column_map[&1].name, "Age");
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let cols = columns(&["First Name"]);
        let result = validate_headers(&headers(&["  FIRST name "]), &cols, false);
        assert!(result.valid);
        assert_eq!(result.column_map.len(), 1);
    }

    #[test]
    fn test_missing_header_fails() {
        let cols = columns(&["Name", "Age"]);
        let result = validate_headers(&headers(&["Name"]), &cols, false);
        assert!(!result.valid);
        assert_eq!(result.missing, vec!["Age"]);
        assert!(result.errors.iter().any(|e| e.contains("Age")));
    }

    #[test]
    fn test_extra_header_is_only_a_warning() {
        let cols = columns(&["Name"]);
        let result = validate_headers(&headers(&["Name", "Notes"]), &cols, false);
        assert!(result.valid);
        assert_eq!(result.extra, vec!["Notes"]);
        assert!(result.warnings.iter().any(|w| w.contains("Notes")));
        assert!(!result.column_map.contains_key(&1));
    }

    #[test]
    fn test_no_columns_configured() {
        let result = validate_headers(&headers(&["Name"]), &[], false);
        assert!(!result.valid);
        assert!(result.errors[0].contains("No columns configured"));
    }

    #[test]
    fn test_empty_header_row_misses_everything() {
        let cols = columns(&["Name", "Age"]);
        let result = validate_headers(&[], &cols, false);
        assert!(!result.valid);
        assert_eq!(result.missing, vec!["Name", "Age"]);
    }

    #[test]
    fn test_identity_column_is_skipped() {
        let cols = columns(&["Name"]);
        let hdrs = headers(&["__record_id", "Name"]);
        assert!(detect_identity_column(&hdrs));
        let result = validate_headers(&hdrs, &cols, true);
        assert!(result.valid);
        assert!(result.extra.is_empty());
        assert_eq!(result.column_map.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_identity_only_sheet_has_no_headers() {
        let cols = columns(&["Name"]);
        let result = validate_headers(&headers(&["__record_id"]), &cols, true);
        assert!(!result.valid);
        assert_eq!(result.missing, vec!["Name"]);
    }

    #[test]
    fn test_out_of_order_warns() {
        let cols = columns(&["Name", "Age"]);
        let result = validate_headers(&headers(&["Age", "Name"]), &cols, false);
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.contains("template order")));
    }

    #[test]
    fn test_suggestions_above_threshold() {
        let suggestions = suggest_mappings(
            &headers(&["E-mail", "Zzz"]),
            &headers(&["Email", "Phone"]),
        );
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].file_header, "E-mail");
        assert_eq!(suggestions[0].schema_header, "Email");
        assert!(suggestions[0].similarity > SIMILARITY_THRESHOLD);
    }

    #[test]
    fn test_suggestion_tie_goes_to_first() {
        // "abcd" is one edit from both candidates.
        let suggestions = suggest_mappings(&headers(&["abcd"]), &headers(&["abce", "abcf"]));
        assert_eq!(suggestions[0].schema_header, "abce");
    }
}

//! Column definitions.
//!
//! A column definition is one named, typed slot of a template's schema.
//! Every stored field value references exactly one column definition.

use serde::{Deserialize, Serialize};

/// Declared type of a column.
///
/// Values are always stored as strings; the data type decides how a raw
/// spreadsheet cell is coerced into that canonical string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Number,
    Date,
    Boolean,
}

impl DataType {
    /// All supported types, in display order.
    pub const ALL: [Self; 4] = [Self::String, Self::Number, Self::Date, Self::Boolean];

    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
        }
    }

    /// Parse the stored representation.
    ///
    /// Returns `None` for anything that is not exactly one of the canonical
    /// names. Operator input goes through [`crate::validate::normalize_data_type`]
    /// instead, which also accepts synonyms.
    #[must_use]
    pub fn from_stored(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "date" => Some(Self::Date),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }
}

impl Default for DataType {
    fn default() -> Self {
        Self::String
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One column of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Database identifier
    pub id: i64,

    /// Owning template
    pub template_id: i64,

    /// 1-based position, unique and contiguous within the template
    pub position: i64,

    /// Header text shown in exported sheets
    pub name: String,

    /// Declared type
    pub data_type: DataType,

    /// Whether a blank cell is rejected
    pub required: bool,
}

impl ColumnDefinition {
    /// Normalized header key used for case-insensitive matching.
    #[must_use]
    pub fn header_key(&self) -> String {
        normalize_header(&self.name)
    }
}

/// Normalize a header for comparison: trim surrounding whitespace and fold case.
#[must_use]
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_round_trip_through_storage() {
        for dt in DataType::ALL {
            assert_eq!(DataType::from_stored(dt.as_str()), Some(dt));
        }
        assert_eq!(DataType::from_stored("Number"), None);
    }

    #[test]
    fn test_header_key_is_case_and_space_insensitive() {
        let col = ColumnDefinition {
            id: 1,
            template_id: 1,
            position: 1,
            name: "  First Name ".to_string(),
            data_type: DataType::String,
            required: false,
        };
        assert_eq!(col.header_key(), "first name");
        assert_eq!(normalize_header("FIRST NAME"), col.header_key());
    }
}

//! Template model.
//!
//! A template owns an ordered list of column definitions and the records
//! stored against them. Deleting a template deletes both.

use serde::{Deserialize, Serialize};

use super::column::ColumnDefinition;

/// A named schema of columns.
///
/// A template with zero columns is valid; it simply cannot accept data
/// until at least one column is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Database identifier
    pub id: i64,

    /// Unique name
    pub name: String,

    /// Columns ordered by position
    pub columns: Vec<ColumnDefinition>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Template {
    /// Whether any column has been configured.
    #[must_use]
    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Header names in position order.
    #[must_use]
    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column by name, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn column_named(&self, name: &str) -> Option<&ColumnDefinition> {
        let key = super::column::normalize_header(name);
        self.columns.iter().find(|c| c.header_key() == key)
    }
}

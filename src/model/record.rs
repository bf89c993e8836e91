//! Stored records and their field values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A record belonging to one template.
///
/// Field values are keyed by column definition id and always held as the
/// canonical string produced by [`crate::coerce`]. A column without an entry
/// has no value for this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Database identifier, also the identity written to exported sheets
    pub id: i64,

    /// Owning template
    pub template_id: i64,

    /// Batch that last touched this record
    pub batch_id: Option<String>,

    /// column id -> canonical value
    pub values: BTreeMap<i64, String>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Record {
    /// Stored value for a column, if any.
    #[must_use]
    pub fn value(&self, column_id: i64) -> Option<&str> {
        self.values.get(&column_id).map(String::as_str)
    }
}

//! Sync types for spreadsheet import.
//!
//! The plan and outcome types here are transient: built once per import
//! attempt and dropped after execution or validation failure.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

/// Reserved header of the hidden identity column.
pub const IDENTITY_COLUMN: &str = "__record_id";

/// Largest file accepted for import (10 MiB).
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Field values planned for one record: column id -> canonical value.
///
/// `None` clears the field.
pub type FieldChanges = BTreeMap<i64, Option<String>>;

/// An error tied to one sheet row.
///
/// Rows are numbered the way spreadsheet applications show them: the
/// header is row 1, the first data row is row 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("Row {row}: {message}")]
pub struct RowError {
    /// 1-based sheet row.
    pub row: usize,
    /// Human-readable description.
    pub message: String,
}

impl RowError {
    #[must_use]
    pub fn new(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            message: message.into(),
        }
    }
}

/// A row routed to an existing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpdate {
    /// Sheet row the update came from.
    pub row: usize,
    /// Target record identity.
    pub record_id: i64,
    /// Values to write.
    pub changes: FieldChanges,
}

/// A row that becomes a new record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCreate {
    /// Sheet row the insert came from.
    pub row: usize,
    /// Values to write.
    pub changes: FieldChanges,
}

/// The create/update/delete operations derived from one sheet.
///
/// Updates keep file order. When one identity appears on several rows,
/// every occurrence is kept and applied in order, so the last row wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub to_update: Vec<PlannedUpdate>,
    pub to_create: Vec<PlannedCreate>,
    pub to_delete: Vec<i64>,
    /// Coercion failures captured while scanning rows.
    pub row_errors: Vec<RowError>,
}

impl SyncPlan {
    /// Number of distinct records the plan updates.
    #[must_use]
    pub fn distinct_updates(&self) -> usize {
        self.to_update
            .iter()
            .map(|u| u.record_id)
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Counts produced by executing a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Result of one import attempt.
///
/// Never persisted. Returned to the caller or folded into a job status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    /// Whether the sheet was applied.
    pub success: bool,
    /// Human-readable errors, row-numbered where they concern a row.
    pub errors: Vec<String>,
    /// Non-fatal findings (extra headers, column order, suggestions).
    pub warnings: Vec<String>,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Batch shared by every record touched in this run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// True when the plan was validated but intentionally not executed.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

impl ImportOutcome {
    /// A failed attempt with the given errors.
    #[must_use]
    pub fn failure(errors: Vec<String>) -> Self {
        Self {
            success: false,
            errors,
            ..Self::default()
        }
    }

    /// A failed attempt from row errors, sorted by row.
    #[must_use]
    pub fn from_row_errors(mut errors: Vec<RowError>) -> Self {
        errors.sort_by_key(|e| e.row);
        Self::failure(errors.iter().map(ToString::to_string).collect())
    }

    /// A successful run.
    #[must_use]
    pub fn applied(counts: &SyncCounts, batch_id: String) -> Self {
        Self {
            success: true,
            created: counts.created,
            updated: counts.updated,
            deleted: counts.deleted,
            batch_id: Some(batch_id),
            ..Self::default()
        }
    }

    /// Attach warnings collected before execution.
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    /// One-sentence summary for humans.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.success {
            let verb = if self.dry_run { "Import would apply" } else { "Import complete" };
            format!(
                "{verb}: {} created, {} updated, {} deleted.",
                self.created, self.updated, self.deleted
            )
        } else {
            let n = self.errors.len();
            format!(
                "Import failed with {n} error{}; no changes were made.",
                if n == 1 { "" } else { "s" }
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_error_display() {
        let e = RowError::new(3, "bad value");
        assert_eq!(e.to_string(), "Row 3: bad value");
    }

    #[test]
    fn test_distinct_updates_counts_identities_once() {
        let plan = SyncPlan {
            to_update: vec![
                PlannedUpdate { row: 2, record_id: 7, changes: FieldChanges::new() },
                PlannedUpdate { row: 3, record_id: 7, changes: FieldChanges::new() },
                PlannedUpdate { row: 4, record_id: 8, changes: FieldChanges::new() },
            ],
            ..SyncPlan::default()
        };
        assert_eq!(plan.distinct_updates(), 2);
    }

    #[test]
    fn test_outcome_from_row_errors_is_sorted() {
        let outcome = ImportOutcome::from_row_errors(vec![
            RowError::new(5, "later"),
            RowError::new(2, "earlier"),
        ]);
        assert!(!outcome.success);
        assert_eq!(outcome.errors, vec!["Row 2: earlier", "Row 5: later"]);
        assert_eq!(
            outcome.summary(),
            "Import failed with 2 errors; no changes were made."
        );
    }

    #[test]
    fn test_outcome_summary_on_success() {
        let counts = SyncCounts { created: 2, updated: 1, deleted: 0 };
        let outcome = ImportOutcome::applied(&counts, "b1".into());
        assert_eq!(outcome.summary(), "Import complete: 2 created, 1 updated, 0 deleted.");
        assert_eq!(outcome.batch_id.as_deref(), Some("b1"));
    }
}

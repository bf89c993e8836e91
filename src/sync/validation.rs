//! Validation pass over a sync plan.
//!
//! Runs before any mutation and collects every problem, not just the first.

use std::collections::HashSet;

use crate::model::ColumnDefinition;
use crate::sync::types::{FieldChanges, RowError, SyncPlan};

/// Check `plan` against the stored identities and column constraints.
///
/// Returns every error sorted by row, including the coercion errors the
/// planner captured. An `Err` means the plan must be discarded.
///
/// # Errors
///
/// Returns the collected row errors when any row fails.
pub fn validate_plan(
    plan: &SyncPlan,
    columns: &[ColumnDefinition],
    existing_ids: &HashSet<i64>,
) -> Result<(), Vec<RowError>> {
    let mut errors = plan.row_errors.clone();

    for update in &plan.to_update {
        if !existing_ids.contains(&update.record_id) {
            errors.push(RowError::new(
                update.row,
                format!("record with ID {} not found", update.record_id),
            ));
            continue;
        }
        errors.extend(check_constraints(update.row, &update.changes, columns, false));
    }

    for create in &plan.to_create {
        errors.extend(check_constraints(create.row, &create.changes, columns, true));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        errors.sort_by_key(|e| e.row);
        tracing::debug!(errors = errors.len(), "sync plan rejected");
        Err(errors)
    }
}

/// Required columns must end up with a value.
///
/// A new record starts empty, so a required column absent from `changes`
/// fails. An update leaves absent columns as stored.
fn check_constraints(
    row: usize,
    changes: &FieldChanges,
    columns: &[ColumnDefinition],
    is_new: bool,
) -> Vec<RowError> {
    columns
        .iter()
        .filter(|c| c.required)
        .filter(|c| match changes.get(&c.id) {
            Some(value) => value.is_none(),
            None => is_new,
        })
        .map(|c| RowError::new(row, format!("required field '{}' cannot be empty", c.name)))
        .collect()
}

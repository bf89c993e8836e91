//! Synchronization planner.
//!
//! Turns parsed sheet rows into a [`SyncPlan`] without touching storage.
//! Rows carrying a known identity become updates, the rest become creates,
//! and stored identities missing from the sheet become deletes.

use std::collections::{BTreeMap, HashSet};

use crate::coerce::coerce_cell;
use crate::model::{CellValue, ColumnDefinition};
use crate::sync::types::{FieldChanges, PlannedCreate, PlannedUpdate, SyncPlan};

/// Sheet row number of the first data row.
pub const FIRST_DATA_ROW: usize = 2;

/// Build the plan for `rows` (header excluded).
///
/// `column_map` comes from header validation. When `has_identity_column`
/// is false the import is additive only and `to_delete` stays empty.
/// Coercion errors are collected on the plan; a row with any error gets
/// no planned operation.
#[must_use]
pub fn build_plan(
    rows: &[Vec<CellValue>],
    column_map: &BTreeMap<usize, ColumnDefinition>,
    has_identity_column: bool,
    existing_ids: &HashSet<i64>,
) -> SyncPlan {
    let mut plan = SyncPlan::default();
    let mut seen = HashSet::new();

    for (index, row) in rows.iter().enumerate() {
        if row.iter().all(CellValue::is_empty) {
            continue;
        }
        let row_number = index + FIRST_DATA_ROW;

        let identity = if has_identity_column {
            row.first().and_then(parse_identity)
        } else {
            None
        };
        if let Some(id) = identity {
            seen.insert(id);
        }

        let mut changes = FieldChanges::new();
        let mut failed = false;
        for (position, column) in column_map {
            let cell = row.get(*position).unwrap_or(&CellValue::Empty);
            match coerce_cell(cell, column, row_number) {
                Ok(value) => {
                    changes.insert(column.id, value);
                }
                Err(e) => {
                    plan.row_errors.push(e);
                    failed = true;
                }
            }
        }
        if failed {
            continue;
        }

        match identity {
            Some(record_id) => plan.to_update.push(PlannedUpdate {
                row: row_number,
                record_id,
                changes,
            }),
            None => plan.to_create.push(PlannedCreate {
                row: row_number,
                changes,
            }),
        }
    }

    if has_identity_column {
        let mut to_delete: Vec<i64> = existing_ids.difference(&seen).copied().collect();
        to_delete.sort_unstable();
        plan.to_delete = to_delete;
    }

    tracing::debug!(
        updates = plan.to_update.len(),
        creates = plan.to_create.len(),
        deletes = plan.to_delete.len(),
        row_errors = plan.row_errors.len(),
        "sync plan built"
    );

    plan
}

/// Read a record identity from the identity cell.
///
/// Only positive integers count. Anything else (blank, text, fractions,
/// zero or negative numbers) means "no identity" and the row is created.
#[must_use]
pub fn parse_identity(cell: &CellValue) -> Option<i64> {
    let id = match cell {
        CellValue::Number(n) => integral(*n),
        CellValue::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        CellValue::Empty | CellValue::Date(_) | CellValue::Boolean(_) => None,
    }?;
    (id > 0).then_some(id)
}

#[allow(clippy::cast_possible_truncation)]
fn integral(n: f64) -> Option<i64> {
    // 2^63 as f64; anything at or beyond it cannot be an i64.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (n.is_finite() && n.fract() == 0.0 && n.abs() < LIMIT).then(|| n as i64)
}

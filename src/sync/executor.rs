//! Transactional executor.
//!
//! Applies a validated [`SyncPlan`] in one IMMEDIATE transaction: deletes,
//! then updates, then creates. Any failure rolls the whole run back.

use crate::error::{Error, Result};
use crate::storage::sqlite::{delete_record, insert_record, touch_record, write_field};
use crate::storage::{EventType, SqliteStorage};
use crate::sync::types::{FieldChanges, ImportOutcome, SyncCounts, SyncPlan};

/// Apply `plan` to `template_id` and report the outcome.
///
/// Failures come back as a failed [`ImportOutcome`] naming the cause;
/// nothing is written in that case.
pub fn execute_plan(
    storage: &mut SqliteStorage,
    template_id: i64,
    plan: &SyncPlan,
    actor: &str,
) -> ImportOutcome {
    let batch_id = uuid::Uuid::new_v4().to_string();

    match apply(storage, template_id, plan, actor, &batch_id) {
        Ok(counts) => {
            tracing::info!(
                template_id,
                batch_id = %batch_id,
                created = counts.created,
                updated = counts.updated,
                deleted = counts.deleted,
                "import committed"
            );
            ImportOutcome::applied(&counts, batch_id)
        }
        Err(e) => {
            tracing::warn!(template_id, error = %e, "import rolled back");
            ImportOutcome::failure(vec![format!("Import failed: {e}")])
        }
    }
}

fn apply(
    storage: &mut SqliteStorage,
    template_id: i64,
    plan: &SyncPlan,
    actor: &str,
    batch_id: &str,
) -> Result<SyncCounts> {
    let now = chrono::Utc::now().timestamp_millis();

    storage.mutate("import", actor, |tx, ctx| {
        ctx.set_batch(batch_id);
        let mut counts = SyncCounts::default();

        for &record_id in &plan.to_delete {
            let removed = delete_record(tx, template_id, record_id)?;
            if removed > 0 {
                counts.deleted += removed;
                ctx.record_event("record", &record_id.to_string(), EventType::RecordDeleted);
            }
        }

        for update in &plan.to_update {
            if !touch_record(tx, template_id, update.record_id, batch_id, now)? {
                return Err(Error::Other(format!(
                    "record with ID {} disappeared during import",
                    update.record_id
                )));
            }
            write_fields(tx, update.record_id, &update.changes)?;
            ctx.record_event(
                "record",
                &update.record_id.to_string(),
                EventType::RecordUpdated,
            );
        }
        counts.updated = plan.distinct_updates();

        for create in &plan.to_create {
            let record_id = insert_record(tx, template_id, Some(batch_id), now)?;
            write_fields(tx, record_id, &create.changes)?;
            ctx.record_event("record", &record_id.to_string(), EventType::RecordCreated);
            counts.created += 1;
        }

        Ok(counts)
    })
}

fn write_fields(tx: &rusqlite::Transaction, record_id: i64, changes: &FieldChanges) -> Result<()> {
    for (column_id, value) in changes {
        write_field(tx, record_id, *column_id, value.as_ref())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataType;
    use crate::storage::EventFilter;
    use crate::sync::types::{PlannedCreate, PlannedUpdate};
    use std::collections::BTreeMap;

    struct Fixture {
        storage: SqliteStorage,
        template_id: i64,
        name_col: i64,
    }

    fn fixture() -> Fixture {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let template = storage.create_template("People", "tester").unwrap();
        let name = storage
            .add_column(template.id, "Name", DataType::String, false, "tester")
            .unwrap();
        Fixture {
            storage,
            template_id: template.id,
            name_col: name.id,
        }
    }

    fn seed(f: &mut Fixture, name: &str) -> i64 {
        let values = BTreeMap::from([(f.name_col, name.to_string())]);
        f.storage.create_record(f.template_id, &values, "tester").unwrap()
    }

    fn changes(col: i64, value: &str) -> FieldChanges {
        FieldChanges::from([(col, Some(value.to_string()))])
    }

    #[test]
    fn test_applies_deletes_updates_creates() {
        let mut f = fixture();
        let keep = seed(&mut f, "John");
        let drop = seed(&mut f, "Gone");

        let plan = SyncPlan {
            to_update: vec![PlannedUpdate { row: 2, record_id: keep, changes: changes(f.name_col, "Jane") }],
            to_create: vec![PlannedCreate { row: 3, changes: changes(f.name_col, "New") }],
            to_delete: vec![drop],
            ..SyncPlan::default()
        };

        let outcome = execute_plan(&mut f.storage, f.template_id, &plan, "tester");
        assert!(outcome.success, "{:?}", outcome.errors);
        assert_eq!((outcome.created, outcome.updated, outcome.deleted), (1, 1, 1));

        let batch = outcome.batch_id.unwrap();
        let record = f.storage.get_record(keep).unwrap().unwrap();
        assert_eq!(record.value(f.name_col), Some("Jane"));
        assert_eq!(record.batch_id.as_deref(), Some(batch.as_str()));
        assert!(f.storage.get_record(drop).unwrap().is_none());

        let events = f
            .storage
            .list_events(&EventFilter { batch_id: Some(&batch), ..EventFilter::default() })
            .unwrap();
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_last_duplicate_update_wins() {
        let mut f = fixture();
        let id = seed(&mut f, "John");
        let plan = SyncPlan {
            to_update: vec![
                PlannedUpdate { row: 2, record_id: id, changes: changes(f.name_col, "First") },
                PlannedUpdate { row: 3, record_id: id, changes: changes(f.name_col, "Second") },
            ],
            ..SyncPlan::default()
        };
        let outcome = execute_plan(&mut f.storage, f.template_id, &plan, "tester");
        assert_eq!(outcome.updated, 1);
        let record = f.storage.get_record(id).unwrap().unwrap();
        assert_eq!(record.value(f.name_col), Some("Second"));
    }

    #[test]
    fn test_failure_leaves_store_untouched() {
        let mut f = fixture();
        let id = seed(&mut f, "John");
        let plan = SyncPlan {
            to_delete: vec![id],
            to_create: vec![PlannedCreate { row: 2, changes: changes(f.name_col, "New") }],
            to_update: vec![PlannedUpdate { row: 3, record_id: 4242, changes: changes(f.name_col, "X") }],
            ..SyncPlan::default()
        };

        let outcome = execute_plan(&mut f.storage, f.template_id, &plan, "tester");
        assert!(!outcome.success);
        assert!(outcome.errors[0].starts_with("Import failed:"));
        assert!(outcome.errors[0].contains("4242"));
        assert!(f.storage.get_record(id).unwrap().is_some());
        assert_eq!(f.storage.count_records(f.template_id).unwrap(), 1);
    }

    #[test]
    fn test_clearing_a_value() {
        let mut f = fixture();
        let id = seed(&mut f, "John");
        let plan = SyncPlan {
            to_update: vec![PlannedUpdate {
                row: 2,
                record_id: id,
                changes: FieldChanges::from([(f.name_col, None)]),
            }],
            ..SyncPlan::default()
        };
        assert!(execute_plan(&mut f.storage, f.template_id, &plan, "tester").success);
        let record = f.storage.get_record(id).unwrap().unwrap();
        assert_eq!(record.value(f.name_col), None);
    }
}

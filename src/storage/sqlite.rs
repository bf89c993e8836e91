//! SQLite storage implementation.
//!
//! This module provides the main storage backend for sheetsync using SQLite.
//! It follows the MutationContext pattern for transaction discipline and audit logging.

use crate::error::{Error, Result};
use crate::model::{normalize_header, ColumnDefinition, DataType, Record, Template};
use crate::storage::events::{insert_event, list_events, Event, EventFilter, EventType};
use crate::storage::schema::apply_schema;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation, tracking side effects.
///
/// Passed to mutation closures to collect audit events, which are written
/// in the same transaction just before commit.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation.
    pub actor: String,
    /// Batch stamped on every event recorded after [`Self::set_batch`].
    pub batch_id: Option<String>,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            batch_id: None,
            events: Vec::new(),
        }
    }

    /// Tag subsequent events with an import batch.
    pub fn set_batch(&mut self, batch_id: &str) {
        self.batch_id = Some(batch_id.to_string());
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        let event = Event::new(entity_type, entity_id, event_type, &self.actor);
        self.events.push(self.tag(event));
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        let event = Event::new(entity_type, entity_id, event_type, &self.actor)
            .with_values(old_value, new_value);
        self.events.push(self.tag(event));
    }

    fn tag(&self, event: Event) -> Event {
        match &self.batch_id {
            Some(batch) => event.with_batch(batch),
            None => event,
        }
    }
}

/// Template with row counts, for listings.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateSummary {
    pub id: i64,
    pub name: String,
    pub column_count: usize,
    pub record_count: usize,
    pub updated_at: i64,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);

        // Dropping `tx` on an early return rolls back.
        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;
        tracing::debug!(op, events = ctx.events.len(), "mutation committed");

        Ok(result)
    }

    // ===================
    // Template Operations
    // ===================

    /// Create an empty template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateExists`] if the name is taken (ignoring case).
    pub fn create_template(&mut self, name: &str, actor: &str) -> Result<Template> {
        let now = chrono::Utc::now().timestamp_millis();

        let id = self.mutate("create_template", actor, |tx, ctx| {
            let taken: bool = tx
                .query_row("SELECT 1 FROM templates WHERE name = ?1", [name], |_| Ok(true))
                .optional()?
                .unwrap_or(false);
            if taken {
                return Err(Error::TemplateExists {
                    name: name.to_string(),
                });
            }

            tx.execute(
                "INSERT INTO templates (name, created_at, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![name, now, now],
            )?;
            let id = tx.last_insert_rowid();
            ctx.record_change(
                "template",
                &id.to_string(),
                EventType::TemplateCreated,
                None,
                Some(name.to_string()),
            );
            Ok(id)
        })?;

        Ok(Template {
            id,
            name: name.to_string(),
            columns: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a template with its columns.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_template(&self, id: i64) -> Result<Option<Template>> {
        let template = self
            .conn
            .query_row(
                "SELECT id, name, created_at, updated_at FROM templates WHERE id = ?1",
                [id],
                map_template_row,
            )
            .optional()?;
        self.with_columns(template)
    }

    /// Get a template by name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_template_by_name(&self, name: &str) -> Result<Option<Template>> {
        let template = self
            .conn
            .query_row(
                "SELECT id, name, created_at, updated_at FROM templates WHERE name = ?1",
                [name.trim()],
                map_template_row,
            )
            .optional()?;
        self.with_columns(template)
    }

    /// Like [`Self::get_template_by_name`], but a missing template is an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateNotFound`] if no template has this name.
    pub fn require_template(&self, name: &str) -> Result<Template> {
        self.get_template_by_name(name)?
            .ok_or_else(|| Error::TemplateNotFound {
                name: name.to_string(),
            })
    }

    fn with_columns(&self, template: Option<Template>) -> Result<Option<Template>> {
        match template {
            Some(mut t) => {
                t.columns = self.list_columns(t.id)?;
                Ok(Some(t))
            }
            None => Ok(None),
        }
    }

    /// List all templates with column and record counts, by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_templates(&self) -> Result<Vec<TemplateSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.name, t.updated_at,
                    (SELECT COUNT(*) FROM column_definitions c WHERE c.template_id = t.id),
                    (SELECT COUNT(*) FROM records r WHERE r.template_id = t.id)
             FROM templates t
             ORDER BY t.name COLLATE NOCASE",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(TemplateSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                updated_at: row.get(2)?,
                column_count: row.get::<_, i64>(3)?.try_into().unwrap_or(0),
                record_count: row.get::<_, i64>(4)?.try_into().unwrap_or(0),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Delete a template with its columns, records and field values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateNotFound`] if the template doesn't exist.
    pub fn delete_template(&mut self, id: i64, actor: &str) -> Result<()> {
        self.mutate("delete_template", actor, |tx, ctx| {
            let name: Option<String> = tx
                .query_row("SELECT name FROM templates WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            let Some(name) = name else {
                return Err(Error::TemplateNotFound {
                    name: id.to_string(),
                });
            };

            tx.execute("DELETE FROM templates WHERE id = ?1", [id])?;
            ctx.record_change(
                "template",
                &id.to_string(),
                EventType::TemplateDeleted,
                Some(name),
                None,
            );
            Ok(())
        })
    }

    // =================
    // Column Operations
    // =================

    /// Columns of a template in position order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_columns(&self, template_id: i64) -> Result<Vec<ColumnDefinition>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, template_id, position, name, data_type, required
             FROM column_definitions
             WHERE template_id = ?1
             ORDER BY position",
        )?;
        let rows = stmt.query_map([template_id], map_column_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Append a column after the current last position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateNotFound`] for an unknown template and
    /// [`Error::DuplicateColumn`] if the name is already used (ignoring case).
    pub fn add_column(
        &mut self,
        template_id: i64,
        name: &str,
        data_type: DataType,
        required: bool,
        actor: &str,
    ) -> Result<ColumnDefinition> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("add_column", actor, |tx, ctx| {
            ensure_template(tx, template_id)?;

            let key = normalize_header(name);
            let mut stmt =
                tx.prepare("SELECT name FROM column_definitions WHERE template_id = ?1")?;
            let existing = stmt
                .query_map([template_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            if existing.iter().any(|n| normalize_header(n) == key) {
                return Err(Error::DuplicateColumn {
                    name: name.to_string(),
                });
            }

            let position: i64 = tx.query_row(
                "SELECT COALESCE(MAX(position), 0) + 1 FROM column_definitions WHERE template_id = ?1",
                [template_id],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT INTO column_definitions (template_id, position, name, data_type, required)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![template_id, position, name, data_type.as_str(), required],
            )?;
            let id = tx.last_insert_rowid();
            touch_template(tx, template_id, now)?;

            ctx.record_change(
                "column",
                &id.to_string(),
                EventType::ColumnAdded,
                None,
                Some(format!("{name} ({data_type})")),
            );

            Ok(ColumnDefinition {
                id,
                template_id,
                position,
                name: name.to_string(),
                data_type,
                required,
            })
        })
    }

    /// Remove a column and close the gap in positions.
    ///
    /// Field values for the column go with it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] if the template has no such column.
    pub fn remove_column(&mut self, template_id: i64, name: &str, actor: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("remove_column", actor, |tx, ctx| {
            ensure_template(tx, template_id)?;

            let key = normalize_header(name);
            let mut stmt = tx.prepare(
                "SELECT id, position, name FROM column_definitions WHERE template_id = ?1",
            )?;
            let found = stmt
                .query_map([template_id], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?
                .into_iter()
                .find(|(_, _, n)| normalize_header(n) == key);
            let Some((column_id, position, stored_name)) = found else {
                return Err(Error::ColumnNotFound {
                    name: name.to_string(),
                });
            };

            tx.execute("DELETE FROM column_definitions WHERE id = ?1", [column_id])?;

            // Two passes keep UNIQUE(template_id, position) satisfied row by row.
            tx.execute(
                "UPDATE column_definitions SET position = -position
                 WHERE template_id = ?1 AND position > ?2",
                rusqlite::params![template_id, position],
            )?;
            tx.execute(
                "UPDATE column_definitions SET position = -position - 1
                 WHERE template_id = ?1 AND position < 0",
                [template_id],
            )?;
            touch_template(tx, template_id, now)?;

            ctx.record_change(
                "column",
                &column_id.to_string(),
                EventType::ColumnRemoved,
                Some(stored_name),
                None,
            );
            Ok(())
        })
    }

    // =================
    // Record Operations
    // =================

    /// All records of a template with their field values, by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_records(&self, template_id: i64) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, template_id, batch_id, created_at, updated_at
             FROM records WHERE template_id = ?1 ORDER BY id",
        )?;
        let mut records = stmt
            .query_map([template_id], map_record_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT fv.record_id, fv.column_id, fv.value
             FROM field_values fv
             JOIN records r ON r.id = fv.record_id
             WHERE r.template_id = ?1",
        )?;
        let values = stmt
            .query_map([template_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut by_record: BTreeMap<i64, BTreeMap<i64, String>> = BTreeMap::new();
        for (record_id, column_id, value) in values {
            by_record.entry(record_id).or_default().insert(column_id, value);
        }
        for record in &mut records {
            if let Some(values) = by_record.remove(&record.id) {
                record.values = values;
            }
        }

        Ok(records)
    }

    /// Get one record with its field values.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_record(&self, id: i64) -> Result<Option<Record>> {
        let record = self
            .conn
            .query_row(
                "SELECT id, template_id, batch_id, created_at, updated_at FROM records WHERE id = ?1",
                [id],
                map_record_row,
            )
            .optional()?;

        let Some(mut record) = record else {
            return Ok(None);
        };

        let mut stmt = self
            .conn
            .prepare("SELECT column_id, value FROM field_values WHERE record_id = ?1")?;
        record.values = stmt
            .query_map([id], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;

        Ok(Some(record))
    }

    /// Identities of every stored record of a template.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn record_ids(&self, template_id: i64) -> Result<HashSet<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM records WHERE template_id = ?1")?;
        let ids = stmt
            .query_map([template_id], |row| row.get(0))?
            .collect::<std::result::Result<HashSet<i64>, _>>()?;
        Ok(ids)
    }

    /// Number of stored records of a template.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_records(&self, template_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE template_id = ?1",
            [template_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Insert one record outside of an import.
    ///
    /// Values are written as given; callers are expected to pass canonical
    /// strings (see [`crate::coerce`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateNotFound`] for an unknown template.
    pub fn create_record(
        &mut self,
        template_id: i64,
        values: &BTreeMap<i64, String>,
        actor: &str,
    ) -> Result<i64> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("create_record", actor, |tx, ctx| {
            ensure_template(tx, template_id)?;
            let id = insert_record(tx, template_id, None, now)?;
            for (column_id, value) in values {
                write_field(tx, id, *column_id, Some(value))?;
            }
            ctx.record_event("record", &id.to_string(), EventType::RecordCreated);
            Ok(id)
        })
    }

    /// Audit events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_events(&self, filter: &EventFilter<'_>) -> Result<Vec<Event>> {
        Ok(list_events(&self.conn, filter)?)
    }
}

// ==========================
// Transaction-level helpers
// ==========================

fn ensure_template(tx: &Transaction, template_id: i64) -> Result<()> {
    let exists = tx
        .query_row("SELECT 1 FROM templates WHERE id = ?1", [template_id], |_| Ok(true))
        .optional()?
        .unwrap_or(false);
    if exists {
        Ok(())
    } else {
        Err(Error::TemplateNotFound {
            name: template_id.to_string(),
        })
    }
}

fn touch_template(tx: &Transaction, template_id: i64, now: i64) -> Result<()> {
    tx.execute(
        "UPDATE templates SET updated_at = ?1 WHERE id = ?2",
        rusqlite::params![now, template_id],
    )?;
    Ok(())
}

/// Insert an empty record and return its id.
pub(crate) fn insert_record(
    tx: &Transaction,
    template_id: i64,
    batch_id: Option<&str>,
    now: i64,
) -> Result<i64> {
    tx.execute(
        "INSERT INTO records (template_id, batch_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        rusqlite::params![template_id, batch_id, now],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Stamp a record with a batch and update time.
///
/// Returns false if the record does not belong to the template.
pub(crate) fn touch_record(
    tx: &Transaction,
    template_id: i64,
    record_id: i64,
    batch_id: &str,
    now: i64,
) -> Result<bool> {
    let changed = tx.execute(
        "UPDATE records SET batch_id = ?1, updated_at = ?2 WHERE id = ?3 AND template_id = ?4",
        rusqlite::params![batch_id, now, record_id, template_id],
    )?;
    Ok(changed == 1)
}

/// Set or clear one field value. `None` removes the value.
pub(crate) fn write_field(
    tx: &Transaction,
    record_id: i64,
    column_id: i64,
    value: Option<&String>,
) -> Result<()> {
    match value {
        Some(v) => {
            tx.execute(
                "INSERT INTO field_values (record_id, column_id, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(record_id, column_id) DO UPDATE SET value = excluded.value",
                rusqlite::params![record_id, column_id, v],
            )?;
        }
        None => {
            tx.execute(
                "DELETE FROM field_values WHERE record_id = ?1 AND column_id = ?2",
                rusqlite::params![record_id, column_id],
            )?;
        }
    }
    Ok(())
}

/// Delete a record of the template. Returns the number of rows removed.
pub(crate) fn delete_record(tx: &Transaction, template_id: i64, record_id: i64) -> Result<usize> {
    Ok(tx.execute(
        "DELETE FROM records WHERE id = ?1 AND template_id = ?2",
        rusqlite::params![record_id, template_id],
    )?)
}

// Helper to map template rows (columns loaded separately)
fn map_template_row(row: &rusqlite::Row) -> rusqlite::Result<Template> {
    Ok(Template {
        id: row.get(0)?,
        name: row.get(1)?,
        columns: Vec::new(),
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

// Helper to map column rows
fn map_column_row(row: &rusqlite::Row) -> rusqlite::Result<ColumnDefinition> {
    let data_type: String = row.get(4)?;
    Ok(ColumnDefinition {
        id: row.get(0)?,
        template_id: row.get(1)?,
        position: row.get(2)?,
        name: row.get(3)?,
        data_type: DataType::from_stored(&data_type).unwrap_or_default(),
        required: row.get(5)?,
    })
}

// Helper to map record rows (values loaded separately)
fn map_record_row(row: &rusqlite::Row) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        template_id: row.get(1)?,
        batch_id: row.get(2)?,
        values: BTreeMap::new(),
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

//! Audit event storage and retrieval.
//!
//! Every mutation writes events inside its own transaction, so the log
//! never mentions work that was rolled back.

use rusqlite::{Connection, Result};
use serde::Serialize;

/// Event types for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Schema events
    TemplateCreated,
    TemplateDeleted,
    ColumnAdded,
    ColumnRemoved,

    // Record events
    RecordCreated,
    RecordUpdated,
    RecordDeleted,
}

impl EventType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TemplateCreated => "template_created",
            Self::TemplateDeleted => "template_deleted",
            Self::ColumnAdded => "column_added",
            Self::ColumnRemoved => "column_removed",
            Self::RecordCreated => "record_created",
            Self::RecordUpdated => "record_updated",
            Self::RecordDeleted => "record_deleted",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "template_created" => Some(Self::TemplateCreated),
            "template_deleted" => Some(Self::TemplateDeleted),
            "column_added" => Some(Self::ColumnAdded),
            "column_removed" => Some(Self::ColumnRemoved),
            "record_created" => Some(Self::RecordCreated),
            "record_updated" => Some(Self::RecordUpdated),
            "record_deleted" => Some(Self::RecordDeleted),
            _ => None,
        }
    }
}

/// An audit event record.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub event_type: EventType,
    pub actor: String,
    /// Import batch that produced the event, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: i64,
}

impl Event {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(entity_type: &str, entity_id: &str, event_type: EventType, actor: &str) -> Self {
        Self {
            id: 0,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            event_type,
            actor: actor.to_string(),
            batch_id: None,
            old_value: None,
            new_value: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Add old/new values for field change tracking.
    #[must_use]
    pub fn with_values(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }

    /// Tag the event with an import batch.
    #[must_use]
    pub fn with_batch(mut self, batch_id: &str) -> Self {
        self.batch_id = Some(batch_id.to_string());
        self
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO events (entity_type, entity_id, event_type, actor, batch_id, old_value, new_value, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            event.entity_type,
            event.entity_id,
            event.event_type.as_str(),
            event.actor,
            event.batch_id,
            event.old_value,
            event.new_value,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Filter for [`list_events`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFilter<'a> {
    pub entity_type: Option<&'a str>,
    pub entity_id: Option<&'a str>,
    pub batch_id: Option<&'a str>,
    pub limit: Option<u32>,
}

/// List events, newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_events(conn: &Connection, filter: &EventFilter<'_>) -> Result<Vec<Event>> {
    let limit = filter.limit.unwrap_or(100);
    let mut stmt = conn.prepare(
        "SELECT id, entity_type, entity_id, event_type, actor, batch_id, old_value, new_value, created_at
         FROM events
         WHERE (?1 IS NULL OR entity_type = ?1)
           AND (?2 IS NULL OR entity_id = ?2)
           AND (?3 IS NULL OR batch_id = ?3)
         ORDER BY created_at DESC, id DESC
         LIMIT ?4",
    )?;

    let rows = stmt.query_map(
        rusqlite::params![filter.entity_type, filter.entity_id, filter.batch_id, limit],
        |row| {
            let kind: String = row.get(3)?;
            let event_type = EventType::parse(&kind).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    format!("unknown event type '{kind}'").into(),
                )
            })?;
            Ok(Event {
                id: row.get(0)?,
                entity_type: row.get(1)?,
                entity_id: row.get(2)?,
                event_type,
                actor: row.get(4)?,
                batch_id: row.get(5)?,
                old_value: row.get(6)?,
                new_value: row.get(7)?,
                created_at: row.get(8)?,
            })
        },
    )?;

    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::apply_schema;

    #[test]
    fn test_event_insert_and_list() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let event = Event::new("record", "42", EventType::RecordCreated, "test-actor")
            .with_batch("batch-1")
            .with_values(None, Some("Ada".to_string()));

        let id = insert_event(&conn, &event).unwrap();
        assert!(id > 0);

        let events = list_events(
            &conn,
            &EventFilter {
                entity_type: Some("record"),
                entity_id: Some("42"),
                ..EventFilter::default()
            },
        )
        .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, "test-actor");
        assert_eq!(events[0].event_type, EventType::RecordCreated);
        assert_eq!(events[0].batch_id.as_deref(), Some("batch-1"));
        assert_eq!(events[0].new_value.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_filter_by_batch() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        insert_event(&conn, &Event::new("record", "1", EventType::RecordCreated, "a").with_batch("b1")).unwrap();
        insert_event(&conn, &Event::new("record", "2", EventType::RecordUpdated, "a").with_batch("b2")).unwrap();
        insert_event(&conn, &Event::new("template", "1", EventType::TemplateCreated, "a")).unwrap();

        let b1 = list_events(
            &conn,
            &EventFilter {
                batch_id: Some("b1"),
                ..EventFilter::default()
            },
        )
        .unwrap();
        assert_eq!(b1.len(), 1);
        assert_eq!(b1[0].entity_id, "1");

        let all = list_events(&conn, &EventFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
    }
}

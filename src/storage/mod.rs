//! SQLite storage layer for sheetsync.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for atomic writes
//! - Audit events for history
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Templates, columns and records

pub mod events;
pub mod schema;
pub mod sqlite;

pub use events::{Event, EventFilter, EventType};
pub use sqlite::{MutationContext, SqliteStorage, TemplateSummary};

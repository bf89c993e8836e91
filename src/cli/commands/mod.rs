//! Command implementations.

pub mod column;
pub mod completions;
pub mod export;
pub mod import;
pub mod init;
pub mod job;
pub mod template;
pub mod version;

use crate::config::resolve_db_path;
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use std::path::{Path, PathBuf};

/// Resolve the database path and require that it was initialized.
pub(crate) fn existing_db_path(db_path: Option<&Path>) -> Result<PathBuf> {
    let db_path = resolve_db_path(db_path).ok_or(Error::NotInitialized)?;
    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }
    Ok(db_path)
}

/// Open the initialized database.
pub(crate) fn open_storage(db_path: Option<&Path>) -> Result<SqliteStorage> {
    SqliteStorage::open(&existing_db_path(db_path)?)
}

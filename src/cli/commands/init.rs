//! Initialize the sheetsync database.
//!
//! Creates the database file and applies the schema. The status cache and
//! staging directories are created lazily next to it.

use crate::config::{resolve_db_path, resolve_status_dir};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    status_dir: PathBuf,
    reinitialized: bool,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if the database already exists (without `force`) or
/// cannot be created.
pub fn execute(db_path: Option<&Path>, force: bool, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path).ok_or_else(|| {
        Error::Config("Could not determine the sheetsync data directory".to_string())
    })?;

    let existed = db_path.exists();
    if existed && !force {
        return Err(Error::AlreadyInitialized { path: db_path });
    }

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    if existed {
        remove_database(&db_path)?;
        tracing::info!(path = %db_path.display(), "removed existing database");
    }

    SqliteStorage::open(&db_path)?;
    let status_dir = resolve_status_dir(&db_path);

    if json {
        let output = InitOutput {
            database: db_path,
            status_dir,
            reinitialized: existed,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if !crate::is_quiet() {
        println!("Initialized sheetsync database");
        println!("  Database: {}", db_path.display());
        println!();
        println!("Next: sheetsync template create <name>");
    }

    Ok(())
}

/// Remove a database file along with its WAL sidecars.
fn remove_database(db_path: &Path) -> Result<()> {
    fs::remove_file(db_path)?;
    for suffix in ["-wal", "-shm"] {
        let mut sidecar = db_path.as_os_str().to_os_string();
        sidecar.push(suffix);
        match fs::remove_file(PathBuf::from(sidecar)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_database() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("nested").join("sheetsync.db");

        execute(Some(&db), false, true).unwrap();

        assert!(db.exists());
        let storage = SqliteStorage::open(&db).unwrap();
        assert!(storage.list_templates().unwrap().is_empty());
    }

    #[test]
    fn test_init_fails_if_already_initialized() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("sheetsync.db");

        execute(Some(&db), false, true).unwrap();
        let result = execute(Some(&db), false, true);
        assert!(matches!(result, Err(Error::AlreadyInitialized { .. })));
    }

    #[test]
    fn test_init_force_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("sheetsync.db");

        execute(Some(&db), false, true).unwrap();
        {
            let mut storage = SqliteStorage::open(&db).unwrap();
            storage.create_template("People", "tester").unwrap();
        }

        execute(Some(&db), true, true).unwrap();
        let storage = SqliteStorage::open(&db).unwrap();
        assert!(storage.list_templates().unwrap().is_empty());
    }
}

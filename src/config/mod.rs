//! Configuration management.
//!
//! This module resolves where sheetsync keeps its data and who is acting.
//!
//! # Layout
//!
//! - **Database**: `~/.sheetsync/data/sheetsync.db` unless overridden
//! - **Job status cache**: `status-cache/` next to the database
//! - **Staged uploads**: `staging/` next to the database, removed per job

mod status_cache;

pub use status_cache::FileStatusCache;

use std::path::{Path, PathBuf};

/// Get the global sheetsync directory location (`~/.sheetsync/`).
#[must_use]
pub fn global_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".sheetsync"))
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `SHEETSYNC_TEST_DB=1` (or any non-empty
/// value other than `0`/`false`). It redirects the database to an isolated
/// test location.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("SHEETSYNC_TEST_DB")
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Get the test database path (`~/.sheetsync/test/sheetsync.db`).
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_dir().map(|dir| dir.join("test").join("sheetsync.db"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `SHEETSYNC_TEST_DB` environment variable → uses test database
/// 3. `SHEETSYNC_DB` environment variable
/// 4. Global location: `~/.sheetsync/data/sheetsync.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if is_test_mode() {
        return test_db_path();
    }

    if let Ok(db_path) = std::env::var("SHEETSYNC_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_dir().map(|dir| dir.join("data").join("sheetsync.db"))
}

/// Resolve the job status cache directory.
///
/// `SHEETSYNC_STATUS_DIR` wins; otherwise `status-cache/` beside the database.
#[must_use]
pub fn resolve_status_dir(db_path: &Path) -> PathBuf {
    if let Ok(dir) = std::env::var("SHEETSYNC_STATUS_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    sibling_dir(db_path, "status-cache")
}

/// Directory where uploads are staged for background jobs.
#[must_use]
pub fn staging_dir(db_path: &Path) -> PathBuf {
    sibling_dir(db_path, "staging")
}

fn sibling_dir(db_path: &Path, name: &str) -> PathBuf {
    db_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from(name), |p| p.join(name))
}

/// Get the default actor name.
///
/// Priority:
/// 1. `SHEETSYNC_ACTOR` environment variable
/// 2. Git user name
/// 3. System username
/// 4. "unknown"
#[must_use]
pub fn default_actor() -> String {
    if let Ok(actor) = std::env::var("SHEETSYNC_ACTOR") {
        if !actor.is_empty() {
            return actor;
        }
    }

    if let Ok(output) = std::process::Command::new("git")
        .args(["config", "user.name"])
        .output()
    {
        if output.status.success() {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
    }

    if let Ok(user) = std::env::var("USER") {
        return user;
    }

    "unknown".to_string()
}

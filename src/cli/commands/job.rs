//! Job command implementations.

use super::existing_db_path;
use crate::cli::JobCommands;
use crate::config::{resolve_status_dir, FileStatusCache};
use crate::error::Result;
use crate::jobs::{JobState, JobStatus, JobStatusTracker, NoopBroadcaster};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;

/// Execute job commands.
///
/// # Errors
///
/// Returns an error if the database path cannot be resolved or JSON
/// serialization fails.
pub fn execute(command: &JobCommands, db_path: Option<&Path>, json: bool) -> Result<()> {
    match command {
        JobCommands::Status { job_id } => status(job_id, db_path, json),
    }
}

fn status(job_id: &str, db_path: Option<&Path>, json: bool) -> Result<()> {
    let db_path = existing_db_path(db_path)?;
    let cache = FileStatusCache::new(resolve_status_dir(&db_path));
    let tracker = JobStatusTracker::new(Arc::new(cache), Arc::new(NoopBroadcaster));

    let status = tracker.get_status(job_id);

    if json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

/// Print a job status record for humans.
pub(crate) fn print_status(status: &JobStatus) {
    if status.status == JobState::NotFound {
        println!("Job {}: not found (unknown or expired)", status.job_id);
        return;
    }

    println!("Job {}: {}", status.job_id, status.status);
    if let Some(progress) = &status.progress {
        println!("  Progress: {progress}");
    }
    if let Some(at) = status.started_at {
        println!("  Started:  {}", format_time(at));
    }
    if let Some(at) = status.completed_at {
        println!("  Finished: {}", format_time(at));
    }
    if let Some(summary) = &status.result_summary {
        println!("  {summary}");
    }
    if let Some(message) = &status.error_message {
        for line in message.lines() {
            println!("  {line}");
        }
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

//! Import command implementation.
//!
//! Foreground imports run the pipeline in-process. With `--background` the
//! file is staged, handed to an [`ImportWorker`], and the job is tracked in
//! the file status cache so `sheetsync job status <id>` can read it later.

use super::{existing_db_path, open_storage};
use crate::cli::ImportArgs;
use crate::config::{default_actor, resolve_status_dir, staging_dir, FileStatusCache};
use crate::error::{Error, Result};
use crate::jobs::{ImportJob, ImportWorker, JobState, JobStatusTracker, NoopBroadcaster};
use crate::storage::SqliteStorage;
use crate::sync::{ImportOutcome, Importer};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Execute the import command.
///
/// # Errors
///
/// Returns [`Error::ImportRejected`] when the sheet was not applied, and
/// other errors for a missing database or template.
pub fn execute(
    args: &ImportArgs,
    db_path: Option<&Path>,
    actor: Option<&str>,
    json: bool,
) -> Result<()> {
    let actor = actor.map(ToString::to_string).unwrap_or_else(default_actor);

    if args.background {
        return run_background(args, db_path, &actor, json);
    }

    let mut storage = open_storage(db_path)?;
    let template = storage.require_template(&args.template)?;

    let mut importer = Importer::new(&mut storage, &actor);
    let outcome = if args.dry_run {
        importer.dry_run(&args.file, &template)?
    } else {
        importer.process_import(&args.file, &template)?
    };

    if json {
        println!("{}", serde_json::to_string(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    if outcome.success {
        Ok(())
    } else {
        Err(Error::ImportRejected {
            errors: outcome.errors.len(),
        })
    }
}

fn run_background(args: &ImportArgs, db_path: Option<&Path>, actor: &str, json: bool) -> Result<()> {
    let db_path = existing_db_path(db_path)?;
    let template = SqliteStorage::open(&db_path)?.require_template(&args.template)?;

    let job_id = uuid::Uuid::new_v4().to_string();
    let staged = stage_file(&args.file, &staging_dir(&db_path), &job_id)?;

    let cache = FileStatusCache::new(resolve_status_dir(&db_path));
    let tracker = Arc::new(JobStatusTracker::new(Arc::new(cache), Arc::new(NoopBroadcaster)));
    let worker = ImportWorker::new(db_path, actor, tracker);

    if !json && !crate::is_quiet() {
        println!("Started import job {job_id}");
    }

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;
    let status = rt
        .block_on(async {
            worker
                .enqueue(ImportJob {
                    template_id: template.id,
                    job_id,
                    file_path: staged,
                })
                .await
        })
        .map_err(|e| Error::Other(format!("Import job did not finish: {e}")))?;

    if json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        super::job::print_status(&status);
    }

    if status.status != JobState::Completed {
        let errors = status
            .error_message
            .as_deref()
            .map_or(1, |m| m.lines().count().max(1));
        return Err(Error::ImportRejected { errors });
    }
    Ok(())
}

/// Copy the upload into the staging directory under the job id.
///
/// The worker owns and deletes the copy; the caller's file is untouched.
fn stage_file(source: &Path, dir: &Path, job_id: &str) -> Result<PathBuf> {
    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    fs::create_dir_all(dir)?;
    let staged = if extension.is_empty() {
        dir.join(job_id)
    } else {
        dir.join(format!("{job_id}.{extension}"))
    };
    fs::copy(source, &staged)?;
    tracing::debug!(from = %source.display(), to = %staged.display(), "staged upload");
    Ok(staged)
}

fn print_outcome(outcome: &ImportOutcome) {
    for warning in &outcome.warnings {
        eprintln!("{} {warning}", "warning:".yellow().bold());
    }
    for error in &outcome.errors {
        eprintln!("{} {error}", "error:".red().bold());
    }
    if outcome.success {
        if !crate::is_quiet() {
            println!("{}", outcome.summary().green());
        }
    } else {
        println!("{}", outcome.summary());
    }
}

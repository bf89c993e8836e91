//! Background import worker.
//!
//! Runs the import pipeline off the caller's task and reports through the
//! [`JobStatusTracker`]. Whatever happens, including a panic inside the
//! pipeline, the job ends in a terminal state and its staged input file is
//! removed.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::jobs::status::{JobFields, JobState, JobStatus, JobStatusTracker};
use crate::storage::SqliteStorage;
use crate::sync::{ImportOutcome, Importer};

/// One queued import.
#[derive(Debug, Clone)]
pub struct ImportJob {
    pub template_id: i64,
    pub job_id: String,
    /// Staged copy of the upload. Deleted when the job ends.
    pub file_path: PathBuf,
}

/// Executes [`ImportJob`]s against a database file.
///
/// Each job opens its own connection, so jobs for different templates do
/// not share state.
#[derive(Clone)]
pub struct ImportWorker {
    db_path: PathBuf,
    actor: String,
    tracker: Arc<JobStatusTracker>,
}

impl ImportWorker {
    #[must_use]
    pub fn new(db_path: PathBuf, actor: &str, tracker: Arc<JobStatusTracker>) -> Self {
        Self {
            db_path,
            actor: actor.to_string(),
            tracker,
        }
    }

    /// Record the job as pending and run it on the blocking pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue(&self, job: ImportJob) -> tokio::task::JoinHandle<JobStatus> {
        self.tracker.update_status(
            &job.job_id,
            JobState::Pending,
            JobFields::new().template_id(job.template_id),
        );
        tracing::info!(job_id = %job.job_id, template_id = job.template_id, "import job queued");

        let worker = self.clone();
        tokio::task::spawn_blocking(move || worker.run(&job))
    }

    /// Run a job to completion on the current thread.
    ///
    /// Returns the terminal status record.
    pub fn run(&self, job: &ImportJob) -> JobStatus {
        let _staged = StagedFile(&job.file_path);

        self.tracker.update_status(
            &job.job_id,
            JobState::Processing,
            JobFields::new()
                .started_at(self.tracker.now())
                .progress("Reading spreadsheet"),
        );

        let result = catch_unwind(AssertUnwindSafe(|| self.execute(job)));
        let completed_at = self.tracker.now();

        match result {
            Ok(Ok(outcome)) if outcome.success => {
                tracing::info!(job_id = %job.job_id, "import job completed");
                self.tracker.update_status(
                    &job.job_id,
                    JobState::Completed,
                    JobFields::new()
                        .completed_at(completed_at)
                        .progress("Done")
                        .result_summary(outcome.summary()),
                )
            }
            Ok(Ok(outcome)) => {
                tracing::info!(job_id = %job.job_id, errors = outcome.errors.len(), "import job rejected");
                self.tracker.update_status(
                    &job.job_id,
                    JobState::Failed,
                    JobFields::new()
                        .completed_at(completed_at)
                        .result_summary(outcome.summary())
                        .error_message(outcome.errors.join("\n")),
                )
            }
            Ok(Err(e)) => {
                tracing::warn!(job_id = %job.job_id, error = %e, "import job failed");
                self.fail(job, completed_at, &e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::warn!(job_id = %job.job_id, %message, "import job panicked");
                self.fail(job, completed_at, &format!("Import aborted: {message}"))
            }
        }
    }

    fn execute(&self, job: &ImportJob) -> Result<ImportOutcome> {
        let mut storage = SqliteStorage::open(&self.db_path)?;
        let template = storage
            .get_template(job.template_id)?
            .ok_or_else(|| Error::TemplateNotFound {
                name: job.template_id.to_string(),
            })?;

        self.tracker
            .update_progress(&job.job_id, &format!("Importing into '{}'", template.name));
        Importer::new(&mut storage, &self.actor).process_import(&job.file_path, &template)
    }

    fn fail(&self, job: &ImportJob, at: chrono::DateTime<chrono::Utc>, message: &str) -> JobStatus {
        self.tracker.update_status(
            &job.job_id,
            JobState::Failed,
            JobFields::new().completed_at(at).error_message(message),
        )
    }
}

/// Removes the staged input file when dropped.
struct StagedFile<'a>(&'a Path);

impl Drop for StagedFile<'_> {
    fn drop(&mut self) {
        match std::fs::remove_file(self.0) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.0.display(), error = %e, "could not remove staged file");
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

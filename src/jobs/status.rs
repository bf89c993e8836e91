//! Job status tracking.
//!
//! A job moves `pending -> processing -> completed | failed`. Each
//! transition is merged into the cached record, stored for
//! [`JOB_STATUS_TTL`], and broadcast to the job's topic. Transitions are
//! not checked; the single owner of a job id drives it.
//!
//! Tracking is best-effort. Cache and broadcast failures are logged and
//! never reach the job being tracked.
//!
//! Updates through one tracker are serialized, so racing merges keep every
//! field. Trackers in different processes sharing a cache replace records
//! whole; the later write wins.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jobs::broadcast::Broadcaster;
use crate::jobs::cache::{Clock, StatusCache, SystemClock};

/// How long a status record lives after its last update.
pub const JOB_STATUS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cache key of a job's status record.
#[must_use]
pub fn cache_key(job_id: &str) -> String {
    format!("job_status:{job_id}")
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    /// Never stored; reported for unknown or expired jobs.
    NotFound,
}

impl JobState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::NotFound => "not_found",
        }
    }

    /// Whether the job has finished, successfully or not.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached status record of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub status: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JobStatus {
    /// A fresh record created at `now`.
    #[must_use]
    pub fn new(job_id: &str, status: JobState, now: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.to_string(),
            status,
            template_id: None,
            created_at: Some(now),
            updated_at: Some(now),
            started_at: None,
            completed_at: None,
            progress: None,
            result_summary: None,
            error_message: None,
        }
    }

    /// The synthetic record for an unknown or expired job.
    #[must_use]
    pub fn not_found(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: JobState::NotFound,
            template_id: None,
            created_at: None,
            updated_at: None,
            started_at: None,
            completed_at: None,
            progress: None,
            result_summary: None,
            error_message: None,
        }
    }
}

/// Optional fields merged into a status record. Unset fields keep their
/// previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFields {
    pub template_id: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: Option<String>,
    pub result_summary: Option<String>,
    pub error_message: Option<String>,
}

impl JobFields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn template_id(mut self, id: i64) -> Self {
        self.template_id = Some(id);
        self
    }

    #[must_use]
    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    #[must_use]
    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    #[must_use]
    pub fn progress(mut self, message: impl Into<String>) -> Self {
        self.progress = Some(message.into());
        self
    }

    #[must_use]
    pub fn result_summary(mut self, summary: impl Into<String>) -> Self {
        self.result_summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    fn merge_into(self, record: &mut JobStatus) {
        fn set<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        set(&mut record.template_id, self.template_id);
        set(&mut record.started_at, self.started_at);
        set(&mut record.completed_at, self.completed_at);
        set(&mut record.progress, self.progress);
        set(&mut record.result_summary, self.result_summary);
        set(&mut record.error_message, self.error_message);
    }
}

/// Cache-backed job state machine with broadcast on every transition.
pub struct JobStatusTracker {
    cache: Arc<dyn StatusCache>,
    broadcaster: Arc<dyn Broadcaster>,
    clock: Arc<dyn Clock>,
    /// Held across read-merge-write.
    update_lock: Mutex<()>,
}

impl JobStatusTracker {
    #[must_use]
    pub fn new(cache: Arc<dyn StatusCache>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self::with_clock(cache, broadcaster, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(
        cache: Arc<dyn StatusCache>,
        broadcaster: Arc<dyn Broadcaster>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            broadcaster,
            clock,
            update_lock: Mutex::new(()),
        }
    }

    /// Current time according to the tracker's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Merge `fields` into the job's record, set `status`, store and
    /// broadcast it.
    ///
    /// Returns the merged record even when storing or broadcasting fails.
    pub fn update_status(&self, job_id: &str, status: JobState, fields: JobFields) -> JobStatus {
        let record = {
            let _guard = self.update_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let now = self.clock.now();
            let mut record = self
                .read(job_id)
                .unwrap_or_else(|| JobStatus::new(job_id, status, now));

            record.status = status;
            fields.merge_into(&mut record);
            record.updated_at = Some(now);

            self.write(&record);
            if let Err(e) = self.broadcaster.publish(job_id, &record) {
                tracing::warn!(job_id, error = %e, "job status broadcast failed");
            }
            record
        };

        tracing::debug!(job_id, status = %record.status, "job status updated");
        record
    }

    /// The job's record, or a `not_found` record if absent or expired.
    #[must_use]
    pub fn get_status(&self, job_id: &str) -> JobStatus {
        self.read(job_id)
            .unwrap_or_else(|| JobStatus::not_found(job_id))
    }

    /// Mark the job as processing with a progress message.
    pub fn update_progress(&self, job_id: &str, message: &str) -> JobStatus {
        self.update_status(job_id, JobState::Processing, JobFields::new().progress(message))
    }

    fn read(&self, job_id: &str) -> Option<JobStatus> {
        let raw = match self.cache.get(&cache_key(job_id)) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(job_id, error = %e, "job status read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(job_id, error = %e, "discarding unreadable job status");
                None
            }
        }
    }

    fn write(&self, record: &JobStatus) {
        let result = serde_json::to_string(record)
            .map_err(crate::error::Error::from)
            .and_then(|json| self.cache.set(&cache_key(&record.job_id), &json, JOB_STATUS_TTL));
        if let Err(e) = result {
            tracing::warn!(job_id = %record.job_id, error = %e, "job status write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::jobs::broadcast::{ChannelBroadcaster, NoopBroadcaster};
    use crate::jobs::cache::{ManualClock, MemoryCache};

    struct BrokenCache;

    impl StatusCache for BrokenCache {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Other("cache down".into()))
        }
        fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
            Err(Error::Other("cache down".into()))
        }
    }

    struct BrokenBroadcaster;

    impl Broadcaster for BrokenBroadcaster {
        fn publish(&self, _topic: &str, _status: &JobStatus) -> Result<()> {
            Err(Error::Other("socket closed".into()))
        }
    }

    fn tracker_with_clock() -> (JobStatusTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = Arc::new(MemoryCache::with_clock(clock.clone()));
        let tracker = JobStatusTracker::with_clock(cache, Arc::new(NoopBroadcaster), clock.clone());
        (tracker, clock)
    }

    #[test]
    fn test_processing_then_expiry() {
        let (tracker, clock) = tracker_with_clock();
        let started = tracker.now();

        tracker.update_status("j1", JobState::Processing, JobFields::new().started_at(started));
        let status = tracker.get_status("j1");
        assert_eq!(status.status, JobState::Processing);
        assert_eq!(status.started_at, Some(started));

        clock.advance(JOB_STATUS_TTL + Duration::from_secs(1));
        assert_eq!(tracker.get_status("j1").status, JobState::NotFound);
    }

    #[test]
    fn test_fields_merge_across_updates() {
        let (tracker, clock) = tracker_with_clock();
        let created = tracker.now();

        tracker.update_status("j1", JobState::Pending, JobFields::new().template_id(3));
        clock.advance(Duration::from_secs(5));
        tracker.update_progress("j1", "reading sheet");
        clock.advance(Duration::from_secs(5));
        let done = tracker.update_status(
            "j1",
            JobState::Completed,
            JobFields::new().result_summary("Import complete: 1 created, 0 updated, 0 deleted."),
        );

        assert_eq!(done.status, JobState::Completed);
        assert_eq!(done.template_id, Some(3));
        assert_eq!(done.progress.as_deref(), Some("reading sheet"));
        assert_eq!(done.created_at, Some(created));
        assert_eq!(done.updated_at, Some(created + chrono::TimeDelta::seconds(10)));
        assert_eq!(tracker.get_status("j1"), done);
    }

    #[test]
    fn test_racing_updates_keep_every_field() {
        let tracker = Arc::new(JobStatusTracker::new(
            Arc::new(MemoryCache::new()),
            Arc::new(NoopBroadcaster),
        ));

        for n in 0..200 {
            let job_id = format!("race-{n}");
            let handles: Vec<_> = [JobFields::new().progress("p"), JobFields::new().template_id(9)]
                .into_iter()
                .map(|fields| {
                    let tracker = Arc::clone(&tracker);
                    let job_id = job_id.clone();
                    std::thread::spawn(move || {
                        tracker.update_status(&job_id, JobState::Processing, fields);
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            let status = tracker.get_status(&job_id);
            assert_eq!(status.progress.as_deref(), Some("p"), "{job_id}");
            assert_eq!(status.template_id, Some(9), "{job_id}");
        }
    }

    #[test]
    fn test_unknown_job_is_not_found() {
        let (tracker, _) = tracker_with_clock();
        let status = tracker.get_status("missing");
        assert_eq!(status.status, JobState::NotFound);
        assert_eq!(status.job_id, "missing");
        assert!(status.created_at.is_none());
    }

    #[test]
    fn test_cache_failure_still_returns_record() {
        let tracker = JobStatusTracker::new(Arc::new(BrokenCache), Arc::new(NoopBroadcaster));
        let record = tracker.update_status(
            "j1",
            JobState::Failed,
            JobFields::new().error_message("boom"),
        );
        assert_eq!(record.status, JobState::Failed);
        assert_eq!(record.error_message.as_deref(), Some("boom"));
        assert_eq!(tracker.get_status("j1").status, JobState::NotFound);
    }

    #[test]
    fn test_broadcast_failure_is_swallowed() {
        let tracker = JobStatusTracker::new(Arc::new(MemoryCache::new()), Arc::new(BrokenBroadcaster));
        let record = tracker.update_status("j1", JobState::Pending, JobFields::new());
        assert_eq!(record.status, JobState::Pending);
        assert_eq!(tracker.get_status("j1").status, JobState::Pending);
    }

    #[tokio::test]
    async fn test_transitions_are_broadcast() {
        let bus = Arc::new(ChannelBroadcaster::default());
        let tracker = JobStatusTracker::new(Arc::new(MemoryCache::new()), bus.clone());
        let mut sub = bus.subscribe("j1");

        tracker.update_status("j1", JobState::Pending, JobFields::new());
        tracker.update_progress("j1", "halfway");

        assert_eq!(sub.recv().await.unwrap().status, JobState::Pending);
        let second = sub.recv().await.unwrap();
        assert_eq!(second.status, JobState::Processing);
        assert_eq!(second.progress.as_deref(), Some("halfway"));
    }

    #[test]
    fn test_serialized_shape() {
        let status = JobStatus::not_found("j9");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "not_found");
        assert_eq!(json["job_id"], "j9");
        assert!(json.get("error_message").is_none());
    }
}

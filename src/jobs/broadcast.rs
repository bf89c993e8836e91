//! One-way publication of job status transitions.
//!
//! Publishing is fire-and-forget from the tracker's point of view: a
//! failure is logged and dropped there, never returned to the job.

use tokio::sync::broadcast;

use crate::error::Result;
use crate::jobs::status::JobStatus;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Publishes status records to a topic keyed by job id.
pub trait Broadcaster: Send + Sync {
    /// Send `status` to subscribers of `topic`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects the message.
    fn publish(&self, topic: &str, status: &JobStatus) -> Result<()>;
}

/// Drops every message. Used where nobody can subscribe.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn publish(&self, _topic: &str, _status: &JobStatus) -> Result<()> {
        Ok(())
    }
}

/// A status record tagged with its topic.
#[derive(Debug, Clone)]
pub struct JobUpdate {
    pub topic: String,
    pub status: JobStatus,
}

/// In-process fan-out over a [`broadcast`] channel.
///
/// Slow receivers that fall behind the buffer skip the oldest updates.
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<JobUpdate>,
}

impl ChannelBroadcaster {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive every update published for `job_id` from now on.
    #[must_use]
    pub fn subscribe(&self, job_id: &str) -> JobSubscription {
        JobSubscription {
            topic: job_id.to_string(),
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish(&self, topic: &str, status: &JobStatus) -> Result<()> {
        let update = JobUpdate {
            topic: topic.to_string(),
            status: status.clone(),
        };
        // A send error only means there are no receivers.
        let _ = self.sender.send(update);
        Ok(())
    }
}

/// Updates for a single job.
pub struct JobSubscription {
    topic: String,
    receiver: broadcast::Receiver<JobUpdate>,
}

impl JobSubscription {
    /// Next update for this job, or `None` once the channel closes.
    pub async fn recv(&mut self) -> Option<JobStatus> {
        loop {
            match self.receiver.recv().await {
                Ok(update) if update.topic == self.topic => return Some(update.status),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic, skipped, "job subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

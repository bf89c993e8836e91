//! Background import jobs and their status records.
//!
//! # Submodules
//!
//! - [`status`] - job state machine over a [`cache::StatusCache`]
//! - [`cache`] - cache interface, in-memory cache, clocks
//! - [`broadcast`] - per-job publish/subscribe
//! - [`worker`] - runs imports and drives the state machine

pub mod broadcast;
pub mod cache;
pub mod status;
pub mod worker;

pub use broadcast::{Broadcaster, ChannelBroadcaster, JobSubscription, NoopBroadcaster};
pub use cache::{Clock, ManualClock, MemoryCache, StatusCache, SystemClock};
pub use status::{cache_key, JobFields, JobState, JobStatus, JobStatusTracker, JOB_STATUS_TTL};
pub use worker::{ImportJob, ImportWorker};

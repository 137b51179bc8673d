//! Asynchronous job lifecycle management for mediagrab downloads.
//!
//! This crate provides the reusable core of the download service:
//!
//! - [`JobRecord`] / [`JobStatus`] - The state of one download job
//! - [`JobRegistry`] - Process-wide table of all submitted jobs
//! - [`JobEvent`] / [`Subscription`] - Per-job event fan-out
//! - [`JobManager`] - The orchestrator driving fetcher subprocesses
//! - [`HistorySink`] / [`JsonHistoryStore`] - Completed-download records

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/mediagrab/mediagrab/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod broadcast;
mod events;
mod history;
mod logbuf;
mod manager;
mod record;
mod registry;

pub use broadcast::{JobBroadcaster, Subscription};
pub use events::JobEvent;
pub use history::{HistoryEntry, HistoryError, HistorySink, JsonHistoryStore, NullHistorySink};
pub use logbuf::{DEFAULT_LOG_CAPACITY, LogRing};
pub use manager::{CancelOutcome, JobError, JobManager, ManagerConfig, ResultFile};
pub use record::{JobId, JobRecord, JobStatus};
pub use registry::JobRegistry;

//! Async job manager around external media download tools.
//!
//! This is a facade crate that re-exports functionality from the
//! mediagrab workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```ignore
//! use mediagrab_lib::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let history = Arc::new(JsonHistoryStore::with_default_path()?);
//!     let manager = JobManager::new(ManagerConfig::default(), history);
//!
//!     let request = DownloadRequest::detect(
//!         "https://www.youtube.com/watch?v=abc123",
//!         "mp4-720p".parse()?,
//!     )?;
//!     let job_id = manager.submit(request)?;
//!
//!     let mut events = manager.subscribe(job_id).expect("job just registered");
//!     while let Some(event) = events.next().await {
//!         println!("{event:?}");
//!     }
//!
//!     Ok(())
//! }
//! ```

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/mediagrab/mediagrab/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use mediagrab_types::*;

// Re-export fetcher plumbing
pub use mediagrab_fetcher::{
    FETCHER_PROGRAM, FetcherEvent, FetcherHandle, KillSwitch, OutputChannel, ProgressUpdate,
    SpawnError, classify_failure, fetcher_args, locate_fetcher, parse_progress,
    relaxed_fetcher_args, spawn_fetcher,
};

// Re-export the remux collaborator
pub use mediagrab_remux::{REMUXER_PROGRAM, RemuxError, Remuxer};

// Re-export job management
pub use mediagrab_jobs::{
    CancelOutcome, DEFAULT_LOG_CAPACITY, HistoryEntry, HistoryError, HistorySink, JobBroadcaster,
    JobError, JobEvent, JobId, JobManager, JobRecord, JobRegistry, JobStatus, JsonHistoryStore,
    LogRing, ManagerConfig, NullHistorySink, ResultFile, Subscription,
};

/// Prelude module for convenient imports.
///
/// ```
/// use mediagrab_lib::prelude::*;
/// ```
pub mod prelude {
    pub use mediagrab_types::{
        Container, DownloadRequest, MediaFormat, MediagrabError, Platform, Result,
    };

    pub use mediagrab_jobs::{
        CancelOutcome, HistorySink, JobEvent, JobId, JobManager, JobRecord, JobStatus,
        JsonHistoryStore, ManagerConfig, ResultFile, Subscription,
    };

    pub use mediagrab_remux::Remuxer;
}

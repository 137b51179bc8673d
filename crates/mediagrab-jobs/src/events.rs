//! Events broadcast to a job's subscribers.

use crate::record::{JobRecord, JobStatus};
use serde::{Deserialize, Serialize};

/// One event in a job's broadcast stream.
///
/// Every subscriber receives an `initial-state` first, then the job's
/// mutations in the order they occurred. Exactly one of the three
/// terminal events ends the stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum JobEvent {
    /// Snapshot of the record at the instant of subscription.
    InitialState {
        /// The record as it was when the subscriber attached.
        record: Box<JobRecord>,
    },
    /// The job moved to a new non-terminal status.
    StatusChanged {
        /// The status after the transition.
        status: JobStatus,
    },
    /// A progress sample parsed from fetcher output.
    ProgressSample {
        /// Percentage complete in `[0, 100]`.
        percent: f64,
        /// Transfer rate, if observed in the same chunk.
        speed: Option<String>,
        /// Time-remaining estimate, if observed in the same chunk.
        eta: Option<String>,
    },
    /// The job finished and the file is available.
    Completed {
        /// Display filename of the result.
        filename: String,
    },
    /// The job finished with an error.
    Failed {
        /// Human-readable failure message.
        error: String,
    },
    /// The job was cancelled.
    Cancelled,
}

impl JobEvent {
    /// Returns true for the three stream-ending events.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled)
    }
}

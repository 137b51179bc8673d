//! Download job records and the terminal-state machine.

use crate::logbuf::LogRing;
use chrono::{DateTime, Utc};
use mediagrab_types::{DownloadRequest, MediaFormat, Platform};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for a download job.
pub type JobId = Uuid;

/// Status of a download job.
///
/// Transitions are monotonic along
/// `queued -> running -> {completed, failed, cancelled}`; the three
/// right-hand states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job is registered but its subprocess has not started yet.
    #[default]
    Queued,
    /// The fetcher subprocess is running.
    Running,
    /// Job finished and the file is available.
    Completed,
    /// Job finished with an error.
    Failed,
    /// Job was cancelled by an explicit request.
    Cancelled,
}

impl JobStatus {
    /// Returns true if the job is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns the status as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The full state of one download job.
///
/// A record is mutated only by the task driving its subprocess; every
/// other component works on clones handed out by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique identifier, assigned at creation.
    pub id: JobId,
    /// The submitted media URL.
    pub url: String,
    /// The platform the URL belongs to.
    pub platform: Platform,
    /// The requested output format.
    pub format: MediaFormat,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Percentage complete in `[0, 100]`, non-decreasing while running.
    pub progress: f64,
    /// Last observed transfer rate, as reported by the fetcher.
    pub speed: Option<String>,
    /// Last observed time-remaining estimate.
    pub eta: Option<String>,
    /// Full path of the downloaded file (set on completion).
    pub result_path: Option<PathBuf>,
    /// Display filename without the work-dir prefix (set on completion).
    pub result_filename: Option<String>,
    /// Size of the downloaded file in bytes (set on completion).
    pub result_file_size: Option<u64>,
    /// Human-readable failure message (set on failure).
    pub error_message: Option<String>,
    /// Timestamp when the job was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the subprocess lifecycle started.
    pub started_at: Option<DateTime<Utc>>,
    /// Timestamp when the job reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Ring buffer of raw subprocess output, for diagnostics.
    pub log: LogRing,
}

impl JobRecord {
    /// Creates a new record in the `queued` state.
    #[must_use]
    pub fn new(request: &DownloadRequest, log_capacity: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: request.url.clone(),
            platform: request.platform,
            format: request.format,
            status: JobStatus::Queued,
            progress: 0.0,
            speed: None,
            eta: None,
            result_path: None,
            result_filename: None,
            result_file_size: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            log: LogRing::new(log_capacity),
        }
    }

    /// Returns true if the job is in a terminal state.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves `queued -> running`. Returns false from any other state.
    pub fn mark_running(&mut self) -> bool {
        if self.status != JobStatus::Queued {
            return false;
        }
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    /// Folds a progress sample into the record.
    ///
    /// Samples are clamped into `[0, 100]` and folded through `max`, so
    /// observed progress never decreases (the fetcher restarts its
    /// percentage for each stream it downloads). Telemetry tokens
    /// overwrite the previous observation. Returns false when the job is
    /// not running.
    pub fn record_progress(
        &mut self,
        percent: f64,
        speed: Option<String>,
        eta: Option<String>,
    ) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        self.progress = self.progress.max(percent.clamp(0.0, 100.0));
        if speed.is_some() {
            self.speed = speed;
        }
        if eta.is_some() {
            self.eta = eta;
        }
        true
    }

    /// Moves `running -> completed` with the result file's details.
    /// Returns false once terminal.
    pub fn mark_completed(&mut self, path: PathBuf, filename: String, file_size: u64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Completed;
        self.progress = 100.0;
        self.speed = None;
        self.eta = None;
        self.result_path = Some(path);
        self.result_filename = Some(filename);
        self.result_file_size = Some(file_size);
        self.finished_at = Some(Utc::now());
        true
    }

    /// Moves into `failed` with a human-readable message.
    /// Returns false once terminal.
    pub fn mark_failed(&mut self, error: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.error_message = Some(error.into());
        self.finished_at = Some(Utc::now());
        true
    }

    /// Moves into `cancelled`. Returns false once terminal.
    pub fn mark_cancelled(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Cancelled;
        self.finished_at = Some(Utc::now());
        true
    }
}

//! The job manager: drives one fetcher subprocess per job.

use crate::broadcast::Subscription;
use crate::events::JobEvent;
use crate::history::{HistoryEntry, HistorySink};
use crate::logbuf::DEFAULT_LOG_CAPACITY;
use crate::record::{JobId, JobRecord, JobStatus};
use crate::registry::{JobEntry, JobRegistry};
use chrono::Utc;
use mediagrab_fetcher::{
    FetcherEvent, OutputChannel, classify_failure, fetcher_args, locate_fetcher, parse_progress,
    relaxed_fetcher_args, spawn_fetcher,
};
use mediagrab_remux::Remuxer;
use mediagrab_types::{Container, DownloadRequest};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Total spawn attempts: the initial one plus a single retry with
/// relaxed arguments. Deliberately not configurable.
const MAX_SPAWN_ATTEMPTS: usize = 2;

/// Tunables for the job manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Directory downloaded files land in (created on demand).
    pub work_dir: PathBuf,
    /// Explicit fetcher binary location; looked up on `PATH` otherwise.
    pub fetcher_path: Option<PathBuf>,
    /// Explicit remuxer binary location; looked up on `PATH` otherwise.
    pub remuxer_path: Option<PathBuf>,
    /// Capacity of each job's log ring.
    pub log_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("mediagrab"),
            fetcher_path: None,
            remuxer_path: None,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// Outcome of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job's subprocess was told to die; the job finalizes as
    /// `cancelled` on its own task.
    Cancelled,
    /// No such job, or it already reached a terminal state. Never an
    /// error, and never a retroactive state change.
    NotFoundOrFinished,
}

/// Availability of a job's downloaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultFile {
    /// The job completed; the file is at this path.
    Ready(PathBuf),
    /// The job exists but has not completed.
    NotReady,
    /// No such job.
    NotFound,
}

/// Errors from the job manager's request boundary.
#[derive(Error, Debug)]
pub enum JobError {
    /// The work directory could not be created at submission.
    #[error("Failed to create work directory '{path}': {source}")]
    WorkDir {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Orchestrates download jobs.
///
/// `submit` registers a job and spawns one task that owns the whole
/// subprocess lifecycle; every other method is a cheap lookup against
/// the registry. The manager is `Send + Sync` and meant to be shared
/// behind an `Arc` by whatever transport sits above it.
#[derive(Debug)]
pub struct JobManager {
    registry: Arc<JobRegistry>,
    config: ManagerConfig,
    remuxer: Option<Remuxer>,
    history: Arc<dyn HistorySink>,
}

impl JobManager {
    /// Creates a manager, locating the remuxer once up front.
    #[must_use]
    pub fn new(config: ManagerConfig, history: Arc<dyn HistorySink>) -> Self {
        let remuxer = Remuxer::locate(config.remuxer_path.as_deref());
        if remuxer.is_none() {
            log::warn!("no media remuxer found; downloads keep their original container");
        }
        Self {
            registry: Arc::new(JobRegistry::new()),
            config,
            remuxer,
            history,
        }
    }

    /// Submits a download request and returns the new job's id.
    ///
    /// The record is registered (visible to `status`/`subscribe`) and
    /// marked `running` before this returns, so a concurrent
    /// subscription can never race-lose against job creation. The
    /// subprocess itself is spawned on the job's own task.
    ///
    /// # Errors
    ///
    /// Returns an error if the work directory cannot be created.
    pub fn submit(&self, request: DownloadRequest) -> Result<JobId, JobError> {
        fs::create_dir_all(&self.config.work_dir).map_err(|e| JobError::WorkDir {
            path: self.config.work_dir.clone(),
            source: e,
        })?;

        let record = JobRecord::new(&request, self.config.log_capacity);
        let id = record.id;
        let entry = self.registry.insert(record);

        entry.update(|rec| {
            rec.mark_running()
                .then_some(JobEvent::StatusChanged { status: rec.status })
        });

        log::info!("job {id}: submitted {} {}", request.platform, request.url);

        let ctx = JobContext {
            entry,
            request,
            config: self.config.clone(),
            remuxer: self.remuxer.clone(),
            history: Arc::clone(&self.history),
        };
        tokio::spawn(run_job(ctx));

        Ok(id)
    }

    /// Returns a snapshot of a job's record, or `None` for unknown ids.
    #[must_use]
    pub fn status(&self, id: JobId) -> Option<JobRecord> {
        self.registry.snapshot(id)
    }

    /// Attaches a subscriber to a job's event stream.
    ///
    /// The stream starts with an `initial-state` snapshot; for a job
    /// already in a terminal state that is the only event and the
    /// stream then closes.
    #[must_use]
    pub fn subscribe(&self, id: JobId) -> Option<Subscription> {
        self.registry.get(id).map(|entry| entry.subscribe())
    }

    /// Requests cancellation of a job.
    ///
    /// Returns promptly; the job's own task observes the subprocess
    /// exit and finalizes the record as `cancelled`.
    pub fn cancel(&self, id: JobId) -> CancelOutcome {
        match self.registry.get(id) {
            Some(entry) if entry.request_cancel() => {
                log::info!("job {id}: cancellation requested");
                CancelOutcome::Cancelled
            }
            _ => CancelOutcome::NotFoundOrFinished,
        }
    }

    /// Returns the downloaded file's path once a job has completed.
    #[must_use]
    pub fn result_file(&self, id: JobId) -> ResultFile {
        self.registry.snapshot(id).map_or(ResultFile::NotFound, |record| {
            match record.result_path {
                Some(path) if record.status == JobStatus::Completed => ResultFile::Ready(path),
                _ => ResultFile::NotReady,
            }
        })
    }

    /// Returns the registry for job listing and snapshots.
    #[must_use]
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }
}

/// Everything one job's driver task needs.
struct JobContext {
    entry: Arc<JobEntry>,
    request: DownloadRequest,
    config: ManagerConfig,
    remuxer: Option<Remuxer>,
    history: Arc<dyn HistorySink>,
}

/// Drives one job from spawn to terminal state.
///
/// This task is the sole mutator of the job's record; progress and log
/// callbacks all run here, never concurrently with each other.
async fn run_job(ctx: JobContext) {
    let timestamp = Utc::now().timestamp_millis();
    let prefix = format!("{}_{}_", ctx.request.platform, timestamp);
    let template = ctx.config.work_dir.join(format!("{prefix}%(title)s.%(ext)s"));

    let Some(program) = locate_fetcher(ctx.config.fetcher_path.as_deref()) else {
        fail(
            &ctx.entry,
            "Media fetcher not found; install yt-dlp or configure its location",
        );
        return;
    };

    let remuxer_location = ctx.remuxer.as_ref().and_then(Remuxer::location_override);

    // Spawn, with one permitted retry using relaxed arguments. A
    // non-zero exit after a successful spawn is never retried.
    let mut spawned = None;
    for attempt in 0..MAX_SPAWN_ATTEMPTS {
        let args = if attempt == 0 {
            fetcher_args(&ctx.request, &template, remuxer_location)
        } else {
            relaxed_fetcher_args(&ctx.request, &template, remuxer_location)
        };
        ctx.entry
            .log("CMD", &format!("{} {}", program.display(), args.join(" ")));

        match spawn_fetcher(&program, &args) {
            Ok(pair) => {
                spawned = Some(pair);
                break;
            }
            Err(e) => {
                log::warn!("spawn attempt {} failed: {e}", attempt + 1);
                ctx.entry.log("PROCESS ERROR", &e.to_string());
            }
        }
    }

    let Some((handle, mut events)) = spawned else {
        fail(&ctx.entry, "Failed to start downloader process after retry");
        return;
    };

    ctx.entry.set_kill_switch(handle.kill_switch());
    if ctx.entry.cancel_requested() {
        // Cancellation raced with the spawn; the switch exists now.
        handle.kill_switch().kill();
    }

    let mut stderr = String::new();
    let mut exit = None;

    while let Some(event) = events.recv().await {
        match event {
            FetcherEvent::Output { channel, text } => {
                ctx.entry.log(channel.as_str(), &text);
                if channel == OutputChannel::Stderr {
                    stderr.push_str(&text);
                    stderr.push('\n');
                }
                if let Some(update) = parse_progress(&text) {
                    ctx.entry.update(|rec| {
                        rec.record_progress(
                            update.percent,
                            update.speed.clone(),
                            update.eta.clone(),
                        )
                        .then(|| JobEvent::ProgressSample {
                            percent: rec.progress,
                            speed: rec.speed.clone(),
                            eta: rec.eta.clone(),
                        })
                    });
                }
            }
            FetcherEvent::Exited(status) => {
                exit = Some(status);
                break;
            }
        }
    }

    // An explicit cancel preempts whatever the exit code would imply.
    if ctx.entry.cancel_requested() {
        ctx.entry
            .update(|rec| rec.mark_cancelled().then_some(JobEvent::Cancelled));
        return;
    }

    let status = match exit {
        Some(Ok(status)) => status,
        Some(Err(e)) => {
            fail(&ctx.entry, format!("Failed to observe downloader exit: {e}"));
            return;
        }
        None => {
            fail(&ctx.entry, "Downloader output stream ended unexpectedly");
            return;
        }
    };

    if !status.success() {
        ctx.entry
            .log("EXIT", &format!("fetcher exited with status {status}"));
        fail(&ctx.entry, classify_failure(status.code(), &stderr));
        return;
    }

    match finalize_download(&ctx, &prefix).await {
        Ok(result) => {
            ctx.entry.update(|rec| {
                rec.mark_completed(result.path.clone(), result.filename.clone(), result.file_size)
                    .then(|| JobEvent::Completed {
                        filename: result.filename.clone(),
                    })
            });
            record_history(&ctx, &result);
        }
        Err(message) => fail(&ctx.entry, message),
    }
}

/// The produced file after scanning and optional remuxing.
struct DownloadResult {
    path: PathBuf,
    filename: String,
    file_size: u64,
}

/// Locates the produced file and repackages it when the container
/// differs from the requested one. Remux failures degrade to the
/// original container; only a missing file fails the job.
async fn finalize_download(ctx: &JobContext, prefix: &str) -> Result<DownloadResult, String> {
    let found = find_output_file(&ctx.config.work_dir, prefix)
        .map_err(|e| format!("Failed to scan work directory: {e}"))?;
    let Some(mut path) = found else {
        return Err("Download completed but file not found".to_string());
    };

    let requested = ctx.request.format.container();
    if let Some(container) = container_of(&path) {
        // Converting across kinds (an audio file when video was asked
        // for) cannot work; aim for the container's natural widely
        // playable target instead.
        let target = if container.is_video() == requested.is_video() {
            requested
        } else {
            container.remux_target().unwrap_or(requested)
        };

        if container != target {
            if let Some(remuxer) = ctx.remuxer.as_ref() {
                match remuxer.convert(&path, target).await {
                    Ok(converted) => {
                        let _ = fs::remove_file(&path);
                        path = converted;
                    }
                    Err(e) => {
                        log::warn!("remux failed, keeping {container}: {e}");
                        ctx.entry.log(
                            "REMUX",
                            &format!("conversion to {target} failed, keeping {container}: {e}"),
                        );
                    }
                }
            } else {
                ctx.entry.log(
                    "REMUX",
                    &format!("no remuxer available, keeping {container} instead of {target}"),
                );
            }
        }
    }

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let display_name = filename.strip_prefix(prefix).unwrap_or(&filename).to_string();
    let file_size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

    Ok(DownloadResult {
        path,
        filename: display_name,
        file_size,
    })
}

/// Finds the first file in `dir` matching the job's naming convention:
/// the `<platform>_<timestamp>_` prefix plus a known container
/// extension. Sorted for determinism when the fetcher left several.
fn find_output_file(dir: &Path, prefix: &str) -> std::io::Result<Option<PathBuf>> {
    let mut matches: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with(prefix))
                && container_of(path).is_some()
        })
        .collect();
    matches.sort();
    Ok(matches.into_iter().next())
}

/// Parses a path's extension into a known container.
fn container_of(path: &Path) -> Option<Container> {
    path.extension()
        .and_then(|ext| Container::from_extension(&ext.to_string_lossy()))
}

/// Marks the job failed and broadcasts the failure.
fn fail(entry: &JobEntry, message: impl Into<String>) {
    let message = message.into();
    entry.update(|rec| {
        rec.mark_failed(message.clone())
            .then(|| JobEvent::Failed {
                error: message.clone(),
            })
    });
}

/// Reports the completed download to the history sink, fire-and-forget.
fn record_history(ctx: &JobContext, result: &DownloadResult) {
    let entry = HistoryEntry {
        platform: ctx.request.platform.to_string(),
        url: ctx.request.url.clone(),
        title: result.filename.clone(),
        format: ctx.request.format.to_string(),
        file_size: result.file_size,
        status: "completed".to_string(),
        recorded_at: Utc::now(),
    };
    if let Err(e) = ctx.history.record(&entry) {
        log::warn!("failed to record download history: {e}");
        ctx.entry
            .log("HISTORY", &format!("failed to record history entry: {e}"));
    }
}

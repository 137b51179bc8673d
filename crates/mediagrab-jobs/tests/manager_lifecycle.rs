//! End-to-end job lifecycle tests against stub fetcher scripts.
//!
//! Each test points the manager at a small shell script standing in for
//! the real fetcher binary, which keeps the full spawn -> stream ->
//! finalize path honest without network access.

#![cfg(unix)]

use mediagrab_jobs::{
    CancelOutcome, HistoryEntry, HistoryError, HistorySink, JobEvent, JobManager, JobStatus,
    ManagerConfig, NullHistorySink, ResultFile, Subscription,
};
use mediagrab_types::{DownloadRequest, Platform};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use uuid::Uuid;

/// A fetcher stub that reports progress and produces a webm file at the
/// path derived from its `-o` template.
const FETCH_OK: &str = r#"tpl=""; prev=""
for arg; do
  if [ "$prev" = "-o" ]; then tpl="$arg"; fi
  prev="$arg"
done
out=$(printf '%s\n' "$tpl" | sed 's/%(title)s/My Video/; s/%(ext)s/webm/')
echo "[download]  42.5% of 10.00MiB at 1.2MiB/s ETA 00:10"
echo "[download] 100% of 10.00MiB in 00:02"
printf 'data' > "$out""#;

const FETCH_403: &str = r#"echo "ERROR: unable to download video data: HTTP Error 403: Forbidden" 1>&2
exit 1"#;

const FETCH_NO_FILE: &str = "exit 0";

const FETCH_HANG: &str = "sleep 30";

/// A remuxer stub that "converts" by touching its output argument.
const REMUX_OK: &str = r#"for last; do :; done
touch "$last""#;

const REMUX_BROKEN: &str = "exit 1";

fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn manager_with(
    dir: &TempDir,
    fetcher: PathBuf,
    remuxer: PathBuf,
    history: Arc<dyn HistorySink>,
) -> JobManager {
    let config = ManagerConfig {
        work_dir: dir.path().join("downloads"),
        fetcher_path: Some(fetcher),
        remuxer_path: Some(remuxer),
        log_capacity: 100,
    };
    JobManager::new(config, history)
}

fn request() -> DownloadRequest {
    DownloadRequest::new(
        "https://example.com/v/1",
        Platform::Youtube,
        "mp4-720p".parse().unwrap(),
    )
    .unwrap()
}

/// Drains a subscription; the stream closes after the terminal event.
async fn drain(sub: &mut Subscription) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Some(event) = sub.next().await {
        events.push(event);
    }
    events
}

#[derive(Debug, Default)]
struct RecordingSink(Mutex<Vec<HistoryEntry>>);

impl RecordingSink {
    fn entries(&self) -> Vec<HistoryEntry> {
        self.0.lock().unwrap().clone()
    }
}

impl HistorySink for RecordingSink {
    fn record(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        self.0.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

#[derive(Debug)]
struct FailingSink;

impl HistorySink for FailingSink {
    fn record(&self, _entry: &HistoryEntry) -> Result<(), HistoryError> {
        Err(HistoryError::WriteFile {
            path: PathBuf::from("/nowhere"),
            source: std::io::Error::other("sink down"),
        })
    }
}

#[tokio::test]
async fn test_job_is_running_before_submit_returns() {
    let dir = TempDir::new().unwrap();
    let fetcher = write_script(&dir, "fetcher", FETCH_OK);
    let remuxer = write_script(&dir, "remuxer", REMUX_BROKEN);
    let manager = manager_with(&dir, fetcher, remuxer, Arc::new(NullHistorySink));

    let id = manager.submit(request()).unwrap();

    // Registered and past `queued` already; the subprocess itself has
    // not even been polled yet on this runtime.
    let record = manager.status(id).unwrap();
    assert_eq!(record.status, JobStatus::Running);
}

#[tokio::test]
async fn test_completion_without_remuxer_keeps_original_container() {
    let dir = TempDir::new().unwrap();
    let fetcher = write_script(&dir, "fetcher", FETCH_OK);
    let remuxer = write_script(&dir, "remuxer", REMUX_BROKEN);
    let manager = manager_with(&dir, fetcher, remuxer, Arc::new(NullHistorySink));

    let id = manager.submit(request()).unwrap();
    let mut sub = manager.subscribe(id).unwrap();
    let events = drain(&mut sub).await;

    // The documented sample line parses into exactly this event.
    assert!(events.iter().any(|event| matches!(
        event,
        JobEvent::ProgressSample { percent, speed, eta }
            if *percent == 42.5
                && speed.as_deref() == Some("1.2MiB/s")
                && eta.as_deref() == Some("00:10")
    )));
    assert!(matches!(events.last(), Some(JobEvent::Completed { .. })));

    // Both remux strategies failed, so the webm survives.
    let record = manager.status(id).unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.progress, 100.0);
    assert_eq!(record.result_filename.as_deref(), Some("My Video.webm"));

    match manager.result_file(id) {
        ResultFile::Ready(path) => assert!(path.exists()),
        other => panic!("expected a ready file, got {other:?}"),
    }
}

#[tokio::test]
async fn test_completion_remuxes_to_requested_container() {
    let dir = TempDir::new().unwrap();
    let fetcher = write_script(&dir, "fetcher", FETCH_OK);
    let remuxer = write_script(&dir, "remuxer", REMUX_OK);
    let history = Arc::new(RecordingSink::default());
    let manager = manager_with(&dir, fetcher, remuxer, Arc::clone(&history) as Arc<dyn HistorySink>);

    let id = manager.submit(request()).unwrap();
    let mut sub = manager.subscribe(id).unwrap();
    drain(&mut sub).await;

    let record = manager.status(id).unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.result_filename.as_deref(), Some("My Video.mp4"));

    let path = record.result_path.unwrap();
    assert!(path.to_string_lossy().ends_with(".mp4"));
    assert!(path.exists());
    assert!(!path.with_extension("webm").exists(), "original is deleted");

    // Exactly one history record for the completed job.
    let entries = history.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].platform, "youtube");
    assert_eq!(entries[0].format, "mp4-720p");
    assert_eq!(entries[0].title, "My Video.mp4");
    assert_eq!(entries[0].status, "completed");
}

#[tokio::test]
async fn test_http_403_is_classified_as_access_denied() {
    let dir = TempDir::new().unwrap();
    let fetcher = write_script(&dir, "fetcher", FETCH_403);
    let remuxer = write_script(&dir, "remuxer", REMUX_BROKEN);
    let manager = manager_with(&dir, fetcher, remuxer, Arc::new(NullHistorySink));

    let id = manager.submit(request()).unwrap();
    let mut sub = manager.subscribe(id).unwrap();
    let events = drain(&mut sub).await;

    match events.last() {
        Some(JobEvent::Failed { error }) => assert!(error.contains("Access denied")),
        other => panic!("expected failure, got {other:?}"),
    }

    let record = manager.status(id).unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.error_message.unwrap().contains("Access denied"));
    assert_eq!(manager.result_file(id), ResultFile::NotReady);
}

#[tokio::test]
async fn test_zero_exit_without_output_file_fails() {
    let dir = TempDir::new().unwrap();
    let fetcher = write_script(&dir, "fetcher", FETCH_NO_FILE);
    let remuxer = write_script(&dir, "remuxer", REMUX_BROKEN);
    let manager = manager_with(&dir, fetcher, remuxer, Arc::new(NullHistorySink));

    let id = manager.submit(request()).unwrap();
    let mut sub = manager.subscribe(id).unwrap();
    drain(&mut sub).await;

    let record = manager.status(id).unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert!(
        record
            .error_message
            .unwrap()
            .contains("completed but file not found")
    );
}

#[tokio::test]
async fn test_spawn_failure_retries_exactly_once() {
    let dir = TempDir::new().unwrap();
    // Never written to disk: both spawn attempts fail.
    let fetcher = dir.path().join("missing-fetcher");
    let remuxer = write_script(&dir, "remuxer", REMUX_BROKEN);
    let manager = manager_with(&dir, fetcher, remuxer, Arc::new(NullHistorySink));

    let id = manager.submit(request()).unwrap();
    let mut sub = manager.subscribe(id).unwrap();
    drain(&mut sub).await;

    let record = manager.status(id).unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.error_message.unwrap().contains("Failed to start"));

    // One CMD line per attempt: the original and the relaxed retry.
    let cmd_lines: Vec<&str> = record
        .log
        .lines()
        .filter(|line| line.contains(" CMD: "))
        .collect();
    assert_eq!(cmd_lines.len(), 2);
    assert!(!cmd_lines[0].contains("--no-check-certificate"));
    assert!(cmd_lines[1].contains("--no-check-certificate"));
    assert!(cmd_lines[1].contains("--force-generic-extractor"));
}

#[tokio::test]
async fn test_cancel_kills_running_job_promptly() {
    let dir = TempDir::new().unwrap();
    let fetcher = write_script(&dir, "fetcher", FETCH_HANG);
    let remuxer = write_script(&dir, "remuxer", REMUX_BROKEN);
    let manager = manager_with(&dir, fetcher, remuxer, Arc::new(NullHistorySink));

    let id = manager.submit(request()).unwrap();
    let mut sub = manager.subscribe(id).unwrap();

    let started = Instant::now();
    assert_eq!(manager.cancel(id), CancelOutcome::Cancelled);

    let events = drain(&mut sub).await;
    assert!(matches!(events.last(), Some(JobEvent::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(10));

    let record = manager.status(id).unwrap();
    assert_eq!(record.status, JobStatus::Cancelled);

    // Cancelling a finished job is a reported no-op, not an error.
    assert_eq!(manager.cancel(id), CancelOutcome::NotFoundOrFinished);
    assert_eq!(manager.status(id).unwrap().status, JobStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_unknown_job() {
    let dir = TempDir::new().unwrap();
    let fetcher = write_script(&dir, "fetcher", FETCH_OK);
    let remuxer = write_script(&dir, "remuxer", REMUX_BROKEN);
    let manager = manager_with(&dir, fetcher, remuxer, Arc::new(NullHistorySink));

    assert_eq!(
        manager.cancel(Uuid::new_v4()),
        CancelOutcome::NotFoundOrFinished
    );
    assert_eq!(manager.result_file(Uuid::new_v4()), ResultFile::NotFound);
    assert!(manager.subscribe(Uuid::new_v4()).is_none());
    assert!(manager.status(Uuid::new_v4()).is_none());
}

#[tokio::test]
async fn test_two_subscribers_receive_identical_sequences() {
    let dir = TempDir::new().unwrap();
    let fetcher = write_script(&dir, "fetcher", FETCH_OK);
    let remuxer = write_script(&dir, "remuxer", REMUX_BROKEN);
    let manager = manager_with(&dir, fetcher, remuxer, Arc::new(NullHistorySink));

    let id = manager.submit(request()).unwrap();
    let mut first = manager.subscribe(id).unwrap();
    let mut second = manager.subscribe(id).unwrap();

    let first_events = drain(&mut first).await;
    let second_events = drain(&mut second).await;

    let percents = |events: &[JobEvent]| -> Vec<f64> {
        events
            .iter()
            .filter_map(|event| match event {
                JobEvent::ProgressSample { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect()
    };

    assert_eq!(percents(&first_events), percents(&second_events));
    assert!(matches!(first_events.last(), Some(JobEvent::Completed { .. })));
    assert!(matches!(second_events.last(), Some(JobEvent::Completed { .. })));
}

#[tokio::test]
async fn test_disconnecting_subscriber_leaves_the_other_untouched() {
    let dir = TempDir::new().unwrap();
    let fetcher = write_script(&dir, "fetcher", FETCH_OK);
    let remuxer = write_script(&dir, "remuxer", REMUX_BROKEN);
    let manager = manager_with(&dir, fetcher, remuxer, Arc::new(NullHistorySink));

    let id = manager.submit(request()).unwrap();
    let mut keep = manager.subscribe(id).unwrap();
    let leave = manager.subscribe(id).unwrap();
    drop(leave);

    let events = drain(&mut keep).await;
    assert!(matches!(events.last(), Some(JobEvent::Completed { .. })));
}

#[tokio::test]
async fn test_subscribe_after_terminal_closes_after_snapshot() {
    let dir = TempDir::new().unwrap();
    let fetcher = write_script(&dir, "fetcher", FETCH_OK);
    let remuxer = write_script(&dir, "remuxer", REMUX_BROKEN);
    let manager = manager_with(&dir, fetcher, remuxer, Arc::new(NullHistorySink));

    let id = manager.submit(request()).unwrap();
    let mut live = manager.subscribe(id).unwrap();
    drain(&mut live).await;

    let mut late = manager.subscribe(id).unwrap();
    match late.next().await {
        Some(JobEvent::InitialState { record }) => {
            assert_eq!(record.status, JobStatus::Completed);
        }
        other => panic!("expected initial-state, got {other:?}"),
    }
    assert!(late.next().await.is_none(), "stream closes after snapshot");
}

#[tokio::test]
async fn test_history_failure_never_fails_the_job() {
    let dir = TempDir::new().unwrap();
    let fetcher = write_script(&dir, "fetcher", FETCH_OK);
    let remuxer = write_script(&dir, "remuxer", REMUX_BROKEN);
    let manager = manager_with(&dir, fetcher, remuxer, Arc::new(FailingSink));

    let id = manager.submit(request()).unwrap();
    let mut sub = manager.subscribe(id).unwrap();
    drain(&mut sub).await;

    let record = manager.status(id).unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert!(
        record
            .log
            .lines()
            .any(|line| line.contains("failed to record history"))
    );
}

//! The process runner: spawns the fetcher and streams its output.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

/// Which output stream a chunk arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChannel {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl OutputChannel {
    /// Returns the channel's log tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "STDOUT",
            Self::Stderr => "STDERR",
        }
    }
}

/// An event from a running fetcher subprocess.
///
/// Output events arrive in read order per stream; [`Self::Exited`] is
/// always the final event on the channel.
#[derive(Debug)]
pub enum FetcherEvent {
    /// A line of raw output.
    Output {
        /// The stream the line arrived on.
        channel: OutputChannel,
        /// The raw line, without the trailing newline.
        text: String,
    },
    /// The subprocess finished (or could not be awaited).
    Exited(std::io::Result<ExitStatus>),
}

/// Error returned when the subprocess could not be started at all.
///
/// Distinct from a non-zero exit: a spawn failure means the program was
/// missing or not executable, and is the only failure the job manager
/// retries.
#[derive(Error, Debug)]
#[error("failed to start media fetcher '{program}': {source}")]
pub struct SpawnError {
    /// The program that could not be started.
    pub program: String,
    /// The underlying I/O error.
    #[source]
    pub source: std::io::Error,
}

/// Requests forceful termination of a running fetcher subprocess.
///
/// Cloneable and idempotent: killing twice is not an error, and killing
/// an already-exited process is a no-op.
#[derive(Debug, Clone)]
pub struct KillSwitch {
    fired: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl KillSwitch {
    fn new() -> Self {
        Self {
            fired: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Requests termination. Returns immediately; the process's exit is
    /// observed through the event stream.
    pub fn kill(&self) {
        self.fired.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Returns true once [`Self::kill`] has been called.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Resolves once termination has been requested.
    async fn triggered(&self) {
        if self.is_fired() {
            return;
        }
        self.notify.notified().await;
    }
}

/// Handle to a spawned fetcher subprocess.
#[derive(Debug)]
pub struct FetcherHandle {
    pid: Option<u32>,
    kill: KillSwitch,
}

impl FetcherHandle {
    /// Returns the OS process id, if the process is still identifiable.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Returns a cloneable kill switch for this subprocess.
    #[must_use]
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }
}

/// Spawns the fetcher subprocess and streams its output.
///
/// Returns a handle carrying the kill capability and a receiver that
/// yields [`FetcherEvent::Output`] lines from both streams followed by a
/// final [`FetcherEvent::Exited`]. The readers are drained before the
/// exit event is sent, so no output is lost.
///
/// # Errors
///
/// Returns [`SpawnError`] if the process could not be started; this is
/// distinguishable from any exit status.
pub fn spawn_fetcher(
    program: &Path,
    args: &[String],
) -> Result<(FetcherHandle, mpsc::Receiver<FetcherEvent>), SpawnError> {
    log::debug!("spawning media fetcher: {}", program.display());

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SpawnError {
            program: program.display().to_string(),
            source: e,
        })?;

    let kill = KillSwitch::new();
    let pid = child.id();
    let (tx, rx) = mpsc::channel(64);

    let stdout_task = child
        .stdout
        .take()
        .map(|stream| spawn_reader(stream, OutputChannel::Stdout, tx.clone()));
    let stderr_task = child
        .stderr
        .take()
        .map(|stream| spawn_reader(stream, OutputChannel::Stderr, tx.clone()));

    let kill_signal = kill.clone();
    tokio::spawn(async move {
        let status = tokio::select! {
            status = child.wait() => status,
            () = kill_signal.triggered() => {
                let _ = child.start_kill();
                child.wait().await
            }
        };

        // Drain both readers so Exited is the final event.
        if let Some(task) = stdout_task {
            let _ = task.await;
        }
        if let Some(task) = stderr_task {
            let _ = task.await;
        }

        let _ = tx.send(FetcherEvent::Exited(status)).await;
    });

    Ok((FetcherHandle { pid, kill }, rx))
}

fn spawn_reader<R>(
    stream: R,
    channel: OutputChannel,
    tx: mpsc::Sender<FetcherEvent>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(text)) = lines.next_line().await {
            if tx.send(FetcherEvent::Output { channel, text }).await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    async fn collect(
        mut rx: mpsc::Receiver<FetcherEvent>,
    ) -> (Vec<(OutputChannel, String)>, std::io::Result<ExitStatus>) {
        let mut lines = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                FetcherEvent::Output { channel, text } => lines.push((channel, text)),
                FetcherEvent::Exited(status) => return (lines, status),
            }
        }
        panic!("event stream ended without an exit event");
    }

    #[test]
    fn test_spawn_missing_program_is_spawn_error() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();

        let result = spawn_fetcher(&PathBuf::from("/definitely/not/here"), &[]);
        assert!(result.is_err());
        let error = result.err().unwrap();
        assert!(error.to_string().contains("/definitely/not/here"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_lines_then_exit() {
        let args = vec!["-c".to_string(), "echo one; echo two".to_string()];
        let (_handle, rx) = spawn_fetcher(&PathBuf::from("/bin/sh"), &args).unwrap();

        let (lines, status) = collect(rx).await;
        assert_eq!(
            lines,
            vec![
                (OutputChannel::Stdout, "one".to_string()),
                (OutputChannel::Stdout, "two".to_string()),
            ]
        );
        assert!(status.unwrap().success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stderr_and_exit_code() {
        let args = vec!["-c".to_string(), "echo oops 1>&2; exit 3".to_string()];
        let (_handle, rx) = spawn_fetcher(&PathBuf::from("/bin/sh"), &args).unwrap();

        let (lines, status) = collect(rx).await;
        assert_eq!(lines, vec![(OutputChannel::Stderr, "oops".to_string())]);
        assert_eq!(status.unwrap().code(), Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_interrupts_long_process() {
        let args = vec!["-c".to_string(), "sleep 30".to_string()];
        let (handle, rx) = spawn_fetcher(&PathBuf::from("/bin/sh"), &args).unwrap();

        let started = Instant::now();
        let kill = handle.kill_switch();
        kill.kill();
        kill.kill(); // second kill is a no-op

        let (_, status) = collect(rx).await;
        assert!(!status.unwrap().success());
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(kill.is_fired());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_after_exit_is_noop() {
        let args = vec!["-c".to_string(), "true".to_string()];
        let (handle, rx) = spawn_fetcher(&PathBuf::from("/bin/sh"), &args).unwrap();

        let (_, status) = collect(rx).await;
        assert!(status.unwrap().success());

        handle.kill_switch().kill();
    }
}

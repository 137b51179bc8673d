//! External remux/encode collaborator for mediagrab.
//!
//! Wraps the ffmpeg-compatible tool used to repackage a downloaded file
//! into the requested container:
//!
//! - [`Remuxer`] - Tool discovery and conversion
//! - [`RemuxError`] - Conversion failures (always non-fatal to the job)

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/mediagrab/mediagrab/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use mediagrab_types::Container;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

/// Name of the remuxer binary looked up on `PATH`.
pub const REMUXER_PROGRAM: &str = "ffmpeg";

/// Errors that can occur during a conversion.
#[derive(Error, Debug)]
pub enum RemuxError {
    /// The remuxer process could not be started.
    #[error("failed to run media remuxer '{program}': {source}")]
    Spawn {
        /// The program that could not be started.
        program: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The remuxer ran but did not produce the requested output.
    #[error("remux to {target} failed: {detail}")]
    Failed {
        /// The container that was requested.
        target: Container,
        /// The tool's exit code or last stderr line.
        detail: String,
    },

    /// Only mp4 and mp3 are supported as conversion targets.
    #[error("unsupported remux target '{0}'")]
    UnsupportedTarget(Container),
}

/// The external remux/encode tool.
///
/// `convert` prefers a fast lossless stream copy and falls back to a
/// full re-encode only when the copy is rejected. Failures here never
/// fail a job; the caller keeps the original container instead.
#[derive(Debug, Clone)]
pub struct Remuxer {
    program: PathBuf,
    explicit: bool,
}

impl Remuxer {
    /// Locates the remuxer tool.
    ///
    /// An explicit override is used when the file actually exists
    /// (otherwise it is ignored with a warning); without one the tool is
    /// looked up on `PATH`. Returns `None` when no tool can be found, in
    /// which case downloads complete in their original container.
    #[must_use]
    pub fn locate(override_path: Option<&Path>) -> Option<Self> {
        if let Some(path) = override_path {
            if path.exists() {
                return Some(Self {
                    program: path.to_path_buf(),
                    explicit: true,
                });
            }
            log::warn!(
                "configured remuxer path not found, falling back to PATH: {}",
                path.display()
            );
        }

        which::which(REMUXER_PROGRAM).ok().map(|program| Self {
            program,
            explicit: false,
        })
    }

    /// Returns the path of the tool binary.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Returns the tool location to forward to the fetcher, or `None`
    /// when the tool is on `PATH` and needs no forwarding.
    #[must_use]
    pub fn location_override(&self) -> Option<&Path> {
        self.explicit.then_some(self.program.as_path())
    }

    /// Converts `input` into the target container, next to the input.
    ///
    /// For mp4 a lossless stream copy is tried first, then a re-encode.
    /// For mp3 a single audio encode pass is used. The input file is
    /// left in place; the caller decides whether to delete it.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot run, every strategy fails, or
    /// the target is not mp4/mp3.
    pub async fn convert(&self, input: &Path, target: Container) -> Result<PathBuf, RemuxError> {
        let output = input.with_extension(target.extension());

        match target {
            Container::Mp4 => {
                match self.run(&copy_args(input, &output), &output, target).await {
                    Ok(()) => Ok(output),
                    Err(copy_err) => {
                        log::debug!(
                            "stream copy rejected ({copy_err}), re-encoding {}",
                            input.display()
                        );
                        self.run(&encode_args(input, &output), &output, target)
                            .await?;
                        Ok(output)
                    }
                }
            }
            Container::Mp3 => {
                self.run(&mp3_args(input, &output), &output, target).await?;
                Ok(output)
            }
            other => Err(RemuxError::UnsupportedTarget(other)),
        }
    }

    /// Runs one tool invocation and verifies the output file appeared.
    async fn run(
        &self,
        args: &[String],
        output: &Path,
        target: Container,
    ) -> Result<(), RemuxError> {
        let result = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| RemuxError::Spawn {
                program: self.program.display().to_string(),
                source: e,
            })?;

        if result.status.success() && output.exists() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&result.stderr);
        let detail = stderr
            .lines()
            .last()
            .map_or_else(
                || format!("exit code {}", result.status.code().unwrap_or(-1)),
                ToString::to_string,
            );

        Err(RemuxError::Failed { target, detail })
    }
}

/// Lossless stream-copy arguments (fast, may be rejected).
fn copy_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-c".to_string(),
        "copy".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Full re-encode arguments for mp4 output.
fn encode_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "veryfast".to_string(),
        "-crf".to_string(),
        "23".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Audio encode arguments for mp3 output.
fn mp3_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-vn".to_string(),
        "-acodec".to_string(),
        "libmp3lame".to_string(),
        "-q:a".to_string(),
        "2".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

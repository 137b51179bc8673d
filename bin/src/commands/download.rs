//! Download command implementation.
//!
//! Submits a job to an in-process manager and renders its event stream
//! as a progress bar. Ctrl-C cancels the in-flight job.

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use mediagrab_lib::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

/// Download one media URL and wait for the terminal event.
pub(crate) async fn download(
    url: &str,
    platform: Option<&str>,
    format: &str,
    output_dir: PathBuf,
    fetcher: Option<PathBuf>,
    remuxer: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    let format: MediaFormat = format
        .parse()
        .with_context(|| format!("Invalid format: {format}"))?;

    let request = match platform {
        Some(name) => {
            let platform: Platform = name
                .parse()
                .with_context(|| format!("Invalid platform: {name}"))?;
            DownloadRequest::new(url, platform, format)?
        }
        None => DownloadRequest::detect(url, format)?,
    };

    let history = Arc::new(
        JsonHistoryStore::with_default_path().context("Failed to initialize history store")?,
    );
    let config = ManagerConfig {
        work_dir: output_dir,
        fetcher_path: fetcher,
        remuxer_path: remuxer,
        ..Default::default()
    };
    let manager = JobManager::new(config, history);

    let job_id = manager.submit(request)?;
    let mut events = manager
        .subscribe(job_id)
        .context("Job vanished right after submission")?;

    // Setup progress bar
    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}",
                )
                .expect("Invalid progress template")
                .progress_chars("=>-"),
        );
        pb
    };

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                match event {
                    JobEvent::InitialState { record } => {
                        progress.set_position(record.progress as u64);
                        // The job may have finished before we attached;
                        // the snapshot is then the only event.
                        match record.status {
                            JobStatus::Completed => {
                                let filename = record.result_filename.clone().unwrap_or_default();
                                progress.finish_with_message(format!("done: {filename}"));
                            }
                            JobStatus::Failed => {
                                progress.abandon_with_message("failed");
                                bail!(
                                    "{}",
                                    record
                                        .error_message
                                        .unwrap_or_else(|| "download failed".to_string())
                                );
                            }
                            JobStatus::Cancelled => {
                                progress.abandon_with_message("cancelled");
                                bail!("Download cancelled");
                            }
                            JobStatus::Queued | JobStatus::Running => {}
                        }
                    }
                    JobEvent::StatusChanged { status } => {
                        progress.set_message(status.to_string());
                    }
                    JobEvent::ProgressSample { percent, speed, eta } => {
                        progress.set_position(percent as u64);
                        let mut message = speed.unwrap_or_default();
                        if let Some(eta) = eta {
                            message.push_str(" ETA ");
                            message.push_str(&eta);
                        }
                        progress.set_message(message);
                    }
                    JobEvent::Completed { filename } => {
                        progress.finish_with_message(format!("done: {filename}"));
                    }
                    JobEvent::Failed { error } => {
                        progress.abandon_with_message("failed");
                        bail!("{error}");
                    }
                    JobEvent::Cancelled => {
                        progress.abandon_with_message("cancelled");
                        bail!("Download cancelled");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                progress.set_message("cancelling...");
                let _ = manager.cancel(job_id);
            }
        }
    }

    match manager.result_file(job_id) {
        ResultFile::Ready(path) => {
            if !quiet {
                println!("Saved to: {}", path.display());
            }
            Ok(())
        }
        _ => bail!("Download finished without a result file"),
    }
}

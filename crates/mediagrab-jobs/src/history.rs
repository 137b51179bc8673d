//! Persistent download history.
//!
//! The job manager reports each completed download to a [`HistorySink`]
//! exactly once, fire-and-forget: a sink failure is logged but never
//! fails or rolls back the job.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while persisting history.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// Failed to create a directory.
    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        /// The path that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to write an entry file.
    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        /// The path that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to read the history directory.
    #[error("Failed to read directory '{path}': {source}")]
    ReadDir {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to serialize an entry.
    #[error("Failed to serialize history entry: {0}")]
    SerializeJson(#[from] serde_json::Error),
}

/// One completed download, as recorded for later retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Platform identifier (e.g. `youtube`).
    pub platform: String,
    /// The submitted media URL.
    pub url: String,
    /// Display title, derived from the produced filename.
    pub title: String,
    /// The requested format identifier (e.g. `mp4-720p`).
    pub format: String,
    /// Size of the downloaded file in bytes.
    pub file_size: u64,
    /// Final job status (always `completed` for recorded entries).
    pub status: String,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Receives one record per completed download.
///
/// Implementations must be cheap and infallible from the job's point of
/// view; the manager logs errors and moves on.
pub trait HistorySink: Send + Sync + std::fmt::Debug {
    /// Records a completed download.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry could not be persisted; the caller
    /// treats this as non-fatal.
    fn record(&self, entry: &HistoryEntry) -> Result<(), HistoryError>;
}

/// A sink that discards every entry, for embedders without history.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHistorySink;

impl HistorySink for NullHistorySink {
    fn record(&self, _entry: &HistoryEntry) -> Result<(), HistoryError> {
        Ok(())
    }
}

/// File-backed history store.
///
/// Entries are stored as individual JSON files under
/// `<base>/history/`. Corrupt files are skipped with a warning when
/// listing, so one bad write can never take the history down.
#[derive(Debug, Clone)]
pub struct JsonHistoryStore {
    history_path: PathBuf,
}

impl JsonHistoryStore {
    /// Creates a store rooted at `base_path`, creating directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub fn new(base_path: PathBuf) -> Result<Self, HistoryError> {
        let history_path = base_path.join("history");
        for path in [&base_path, &history_path] {
            if !path.exists() {
                fs::create_dir_all(path).map_err(|e| HistoryError::CreateDir {
                    path: path.clone(),
                    source: e,
                })?;
            }
        }
        Ok(Self { history_path })
    }

    /// Returns the default path for mediagrab state storage.
    ///
    /// Uses the platform data directory (e.g. `~/.local/share/mediagrab`
    /// on Linux), falling back to `~/.mediagrab` when it cannot be
    /// determined.
    #[must_use]
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("", "", "mediagrab").map_or_else(dirs_fallback, |proj_dirs| {
            proj_dirs.data_dir().to_path_buf()
        })
    }

    /// Creates a store at the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub fn with_default_path() -> Result<Self, HistoryError> {
        Self::new(Self::default_path())
    }

    /// Returns the directory entries are written into.
    #[must_use]
    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    /// Lists up to `limit` entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the history directory cannot be read.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let dir = fs::read_dir(&self.history_path).map_err(|e| HistoryError::ReadDir {
            path: self.history_path.clone(),
            source: e,
        })?;

        let mut entries = Vec::new();
        for dir_entry in dir.flatten() {
            let path = dir_entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|content| {
                    serde_json::from_str::<HistoryEntry>(&content).map_err(|e| e.to_string())
                }) {
                Ok(entry) => entries.push(entry),
                Err(e) => log::warn!("skipping unreadable history file {}: {e}", path.display()),
            }
        }

        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        entries.truncate(limit);
        Ok(entries)
    }
}

impl HistorySink for JsonHistoryStore {
    fn record(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        let path = self.history_path.join(format!("{}.json", Uuid::new_v4()));
        let json = serde_json::to_string_pretty(entry)?;
        fs::write(&path, json).map_err(|e| HistoryError::WriteFile { path, source: e })
    }
}

/// Fallback for determining the state directory.
fn dirs_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".mediagrab")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(title: &str, recorded_at: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry {
            platform: "youtube".to_string(),
            url: "https://youtube.com/watch?v=abc".to_string(),
            title: title.to_string(),
            format: "mp4-720p".to_string(),
            file_size: 1024,
            status: "completed".to_string(),
            recorded_at,
        }
    }

    #[test]
    fn test_store_creation() {
        let dir = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(dir.path().to_path_buf()).unwrap();
        assert!(store.history_path().exists());
    }

    #[test]
    fn test_record_and_list() {
        let dir = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(dir.path().to_path_buf()).unwrap();

        let now = Utc::now();
        store.record(&entry("older", now - chrono::Duration::hours(1))).unwrap();
        store.record(&entry("newest", now)).unwrap();

        let entries = store.list_recent(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "newest");
        assert_eq!(entries[1].title, "older");
    }

    #[test]
    fn test_list_respects_limit() {
        let dir = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(dir.path().to_path_buf()).unwrap();

        let now = Utc::now();
        for i in 0..5 {
            store
                .record(&entry(&format!("t{i}"), now - chrono::Duration::minutes(i)))
                .unwrap();
        }

        assert_eq!(store.list_recent(3).unwrap().len(), 3);
    }

    #[test]
    fn test_corrupt_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(dir.path().to_path_buf()).unwrap();

        store.record(&entry("good", Utc::now())).unwrap();
        fs::write(store.history_path().join("bad.json"), "{ not json").unwrap();

        let entries = store.list_recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "good");
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        NullHistorySink.record(&entry("x", Utc::now())).unwrap();
    }
}

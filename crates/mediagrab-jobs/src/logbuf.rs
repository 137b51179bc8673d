//! Bounded log ring buffer for raw subprocess output.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of log lines kept per job.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// A bounded ring buffer of timestamped raw output lines.
///
/// Kept for diagnostics only and never parsed back; the oldest line is
/// evicted once the buffer is full.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRing {
    capacity: usize,
    lines: VecDeque<String>,
}

impl LogRing {
    /// Creates an empty ring holding at most `capacity` lines.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lines: VecDeque::with_capacity(capacity.min(64)),
        }
    }

    /// Appends a tagged line (e.g. `CMD`, `STDOUT`, `STDERR`) with a
    /// timestamp, evicting the oldest line when at capacity.
    pub fn push(&mut self, tag: &str, text: &str) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines
            .push_back(format!("[{}] {tag}: {text}", Utc::now().to_rfc3339()));
    }

    /// Returns the number of buffered lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true if no lines are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterates over the buffered lines, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}

impl Default for LogRing {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

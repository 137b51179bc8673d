//! The process-wide job table.

use crate::broadcast::{JobBroadcaster, Subscription};
use crate::events::JobEvent;
use crate::record::{JobId, JobRecord};
use mediagrab_fetcher::KillSwitch;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// One registered job: its record, broadcaster, and kill capability.
///
/// The record mutex and the broadcaster's subscriber set are always
/// taken in that order (record first), both by publishers and by
/// subscribers, so every subscriber observes the mutation sequence
/// exactly as it happened.
#[derive(Debug)]
pub(crate) struct JobEntry {
    record: Mutex<JobRecord>,
    broadcaster: JobBroadcaster,
    kill: Mutex<Option<KillSwitch>>,
    cancel_requested: AtomicBool,
}

impl JobEntry {
    fn new(record: JobRecord) -> Self {
        Self {
            record: Mutex::new(record),
            broadcaster: JobBroadcaster::new(),
            kill: Mutex::new(None),
            cancel_requested: AtomicBool::new(false),
        }
    }

    /// Returns a clone of the current record.
    pub(crate) fn snapshot(&self) -> JobRecord {
        match self.record.lock() {
            Ok(record) => record.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Attaches a subscriber, delivering the initial snapshot under the
    /// record lock so no concurrent mutation can slip in between.
    pub(crate) fn subscribe(&self) -> Subscription {
        match self.record.lock() {
            Ok(record) => self.broadcaster.subscribe(&record),
            Err(poisoned) => self.broadcaster.subscribe(&poisoned.into_inner()),
        }
    }

    /// Mutates the record and broadcasts the event the closure returns,
    /// all under the record lock.
    pub(crate) fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut JobRecord) -> Option<JobEvent>,
    {
        let Ok(mut record) = self.record.lock() else {
            return;
        };
        if let Some(event) = mutate(&mut record) {
            self.broadcaster.publish(&event);
        }
    }

    /// Appends a tagged line to the record's log ring.
    pub(crate) fn log(&self, tag: &str, text: &str) {
        if let Ok(mut record) = self.record.lock() {
            record.log.push(tag, text);
        }
    }

    /// Stores the kill switch of the job's running subprocess.
    pub(crate) fn set_kill_switch(&self, kill: KillSwitch) {
        if let Ok(mut slot) = self.kill.lock() {
            *slot = Some(kill);
        }
    }

    /// Requests cancellation.
    ///
    /// Returns false when the job is already terminal (the record is not
    /// touched). Otherwise the cancel flag is set and the subprocess, if
    /// one is running, is killed; the job's own task observes the exit
    /// and finalizes the record.
    pub(crate) fn request_cancel(&self) -> bool {
        let finished = match self.record.lock() {
            Ok(record) => record.is_finished(),
            Err(poisoned) => poisoned.into_inner().is_finished(),
        };
        if finished {
            return false;
        }

        self.cancel_requested.store(true, Ordering::SeqCst);
        if let Ok(slot) = self.kill.lock() {
            if let Some(kill) = slot.as_ref() {
                kill.kill();
            }
        }
        true
    }

    /// Returns true once cancellation has been requested.
    pub(crate) fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }
}

/// Process-wide table of all submitted jobs.
///
/// Created once at service start and passed by handle to whichever
/// component needs it. A single coarse lock guards the map; per-job
/// mutation goes through each entry's own locks. The registry never
/// evicts records on its own: a client may poll for results long after
/// the subprocess finished, so retention is the embedder's policy.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, Arc<JobEntry>>>,
}

impl JobRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record and returns its entry.
    pub(crate) fn insert(&self, record: JobRecord) -> Arc<JobEntry> {
        let id = record.id;
        let entry = Arc::new(JobEntry::new(record));
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(id, Arc::clone(&entry));
        }
        entry
    }

    /// Looks up a job's entry.
    pub(crate) fn get(&self, id: JobId) -> Option<Arc<JobEntry>> {
        self.jobs
            .lock()
            .ok()
            .and_then(|jobs| jobs.get(&id).cloned())
    }

    /// Returns a snapshot of a job's record, or `None` for unknown ids.
    #[must_use]
    pub fn snapshot(&self, id: JobId) -> Option<JobRecord> {
        self.get(id).map(|entry| entry.snapshot())
    }

    /// Returns snapshots of all registered jobs, newest first.
    #[must_use]
    pub fn snapshots(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self
            .jobs
            .lock()
            .map(|jobs| jobs.values().map(|entry| entry.snapshot()).collect())
            .unwrap_or_default();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Returns the number of registered jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.lock().map_or(0, |jobs| jobs.len())
    }

    /// Returns true if no jobs are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::JobStatus;
    use mediagrab_types::{DownloadRequest, Platform};
    use uuid::Uuid;

    fn test_record() -> JobRecord {
        let request = DownloadRequest::new(
            "https://www.youtube.com/watch?v=abc",
            Platform::Youtube,
            "mp4".parse().unwrap(),
        )
        .unwrap();
        JobRecord::new(&request, 10)
    }

    #[test]
    fn test_insert_and_snapshot() {
        let registry = JobRegistry::new();
        let record = test_record();
        let id = record.id;
        registry.insert(record);

        let snapshot = registry.snapshot(id).unwrap();
        assert_eq!(snapshot.id, id);
        assert_eq!(snapshot.status, JobStatus::Queued);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_id_is_none() {
        let registry = JobRegistry::new();
        assert!(registry.snapshot(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_snapshots_are_isolated_clones() {
        let registry = JobRegistry::new();
        let id = {
            let record = test_record();
            let id = record.id;
            registry.insert(record);
            id
        };

        let mut snapshot = registry.snapshot(id).unwrap();
        snapshot.mark_running();
        snapshot.mark_failed("local mutation");

        // The registry's copy is untouched.
        assert_eq!(registry.snapshot(id).unwrap().status, JobStatus::Queued);
    }

    #[test]
    fn test_cancel_on_terminal_record_is_rejected() {
        let registry = JobRegistry::new();
        let mut record = test_record();
        record.mark_running();
        record.mark_completed("/tmp/v.mp4".into(), "v.mp4".into(), 1);
        let id = record.id;
        let entry = registry.insert(record);

        assert!(!entry.request_cancel());
        assert_eq!(registry.snapshot(id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_cancel_on_live_record_sets_flag() {
        let registry = JobRegistry::new();
        let mut record = test_record();
        record.mark_running();
        let entry = registry.insert(record);

        assert!(!entry.cancel_requested());
        assert!(entry.request_cancel());
        assert!(entry.cancel_requested());
    }
}

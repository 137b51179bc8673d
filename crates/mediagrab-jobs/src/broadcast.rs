//! Per-job event fan-out to concurrent subscribers.

use crate::events::JobEvent;
use crate::record::JobRecord;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Fans a job's events out to any number of live subscribers.
///
/// Each subscriber gets its own unbounded channel, so a slow or
/// disconnected subscriber can never block the task driving the job.
/// Closed channels are pruned on the next publish; after a terminal
/// event every sender is dropped, which ends all remaining streams.
#[derive(Debug, Default)]
pub struct JobBroadcaster {
    senders: Mutex<Vec<mpsc::UnboundedSender<JobEvent>>>,
}

impl JobBroadcaster {
    /// Creates a broadcaster with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber against the given record snapshot.
    ///
    /// The subscriber's first event is an `initial-state` carrying the
    /// snapshot. When the record is already terminal the subscriber is
    /// not registered at all: it receives the snapshot and the stream
    /// then closes, so attaching to a finished job can never hang.
    pub fn subscribe(&self, record: &JobRecord) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let finished = record.is_finished();
        let _ = tx.send(JobEvent::InitialState {
            record: Box::new(record.clone()),
        });

        if !finished {
            if let Ok(mut senders) = self.senders.lock() {
                senders.push(tx);
            }
        }

        Subscription { rx }
    }

    /// Delivers `event` to all current subscribers.
    ///
    /// Subscribers whose receiving end is gone are dropped here; a
    /// terminal event clears the whole set once delivered.
    pub fn publish(&self, event: &JobEvent) {
        let Ok(mut senders) = self.senders.lock() else {
            return;
        };
        senders.retain(|tx| tx.send(event.clone()).is_ok());
        if event.is_terminal() {
            senders.clear();
        }
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.senders.lock().map_or(0, |senders| senders.len())
    }
}

/// A live subscription to one job's event stream.
///
/// Dropping the subscription detaches the subscriber; the broadcaster
/// notices on its next publish.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<JobEvent>,
}

impl Subscription {
    /// Receives the next event, or `None` once the stream has closed.
    pub async fn next(&mut self) -> Option<JobEvent> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::JobStatus;
    use mediagrab_types::{DownloadRequest, Platform};

    fn running_record() -> JobRecord {
        let request = DownloadRequest::new(
            "https://www.youtube.com/watch?v=abc",
            Platform::Youtube,
            "mp4".parse().unwrap(),
        )
        .unwrap();
        let mut record = JobRecord::new(&request, 10);
        record.mark_running();
        record
    }

    fn progress(percent: f64) -> JobEvent {
        JobEvent::ProgressSample {
            percent,
            speed: None,
            eta: None,
        }
    }

    async fn drain(mut sub: Subscription) -> Vec<JobEvent> {
        let mut events = Vec::new();
        while let Some(event) = sub.next().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_two_subscribers_see_identical_sequences() {
        let broadcaster = JobBroadcaster::new();
        let record = running_record();
        let first = broadcaster.subscribe(&record);
        let second = broadcaster.subscribe(&record);
        assert_eq!(broadcaster.subscriber_count(), 2);

        broadcaster.publish(&progress(10.0));
        broadcaster.publish(&progress(50.0));
        broadcaster.publish(&JobEvent::Completed {
            filename: "v.mp4".into(),
        });

        let first = drain(first).await;
        let second = drain(second).await;

        assert_eq!(first.len(), 4);
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(
                serde_json::to_value(a).unwrap(),
                serde_json::to_value(b).unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_initial_state_reflects_snapshot() {
        let broadcaster = JobBroadcaster::new();
        let record = running_record();
        let mut sub = broadcaster.subscribe(&record);

        match sub.next().await {
            Some(JobEvent::InitialState { record: snapshot }) => {
                assert_eq!(snapshot.id, record.id);
                assert_eq!(snapshot.status, JobStatus::Running);
            }
            other => panic!("expected initial-state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let broadcaster = JobBroadcaster::new();
        let record = running_record();
        let keep = broadcaster.subscribe(&record);
        let drop_me = broadcaster.subscribe(&record);
        drop(drop_me);

        broadcaster.publish(&progress(30.0));
        assert_eq!(broadcaster.subscriber_count(), 1);

        // The remaining subscriber is unaffected.
        let mut keep = keep;
        assert!(keep.next().await.is_some()); // initial-state
        assert!(matches!(
            keep.next().await,
            Some(JobEvent::ProgressSample { percent, .. }) if percent == 30.0
        ));
    }

    #[tokio::test]
    async fn test_terminal_event_closes_streams() {
        let broadcaster = JobBroadcaster::new();
        let record = running_record();
        let sub = broadcaster.subscribe(&record);

        broadcaster.publish(&JobEvent::Failed {
            error: "boom".into(),
        });
        assert_eq!(broadcaster.subscriber_count(), 0);

        let events = drain(sub).await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_terminal());
    }

    #[tokio::test]
    async fn test_subscribe_after_terminal_yields_snapshot_then_closes() {
        let broadcaster = JobBroadcaster::new();
        let mut record = running_record();
        record.mark_cancelled();

        let sub = broadcaster.subscribe(&record);
        assert_eq!(broadcaster.subscriber_count(), 0);

        let events = drain(sub).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            JobEvent::InitialState { record } => {
                assert_eq!(record.status, JobStatus::Cancelled);
            }
            other => panic!("expected initial-state, got {other:?}"),
        }
    }
}

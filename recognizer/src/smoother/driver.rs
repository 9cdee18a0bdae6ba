use sign_sense_common::config::SmootherConfig;
use sign_sense_common::recognition::RecognitionResult;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::state::{RecognitionSmoother, Snapshot};

struct Observation {
    at: Instant,
    result: RecognitionResult,
}

/// Cheap, cloneable sender of detector results into a running smoother.
#[derive(Clone)]
pub struct Observer {
    tx: mpsc::UnboundedSender<Observation>,
}

impl Observer {
    /// Stamp `result` with the current time and hand it to the smoother.
    /// Results sent after the smoother shut down are dropped.
    pub fn observe(&self, result: RecognitionResult) {
        let _ = self.tx.send(Observation {
            at: Instant::now(),
            result,
        });
    }
}

/// Owner of the smoother task.
///
/// Dropping the handle (or calling `shutdown`) tears the task down and
/// discards every pending history append.
pub struct SmootherHandle {
    observer: Observer,
    snapshots: watch::Receiver<Snapshot>,
    task: Option<JoinHandle<()>>,
}

impl SmootherHandle {
    /// Spawn the smoother task on the current runtime.
    pub fn spawn(config: &SmootherConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshots) = watch::channel(Snapshot::default());
        let smoother = RecognitionSmoother::new(config);
        let task = tokio::spawn(run_smoother(smoother, rx, snapshot_tx));
        Self {
            observer: Observer { tx },
            snapshots,
            task: Some(task),
        }
    }

    pub fn observer(&self) -> Observer {
        self.observer.clone()
    }

    pub fn observe(&self, result: RecognitionResult) {
        self.observer.observe(result);
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Latest published state.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            debug!("smoother shut down");
        }
    }
}

impl Drop for SmootherHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_smoother(
    mut smoother: RecognitionSmoother,
    mut rx: mpsc::UnboundedReceiver<Observation>,
    snapshot_tx: watch::Sender<Snapshot>,
) {
    loop {
        let deadline = smoother.next_deadline();
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(obs) => {
                    smoother.observe(obs.result, obs.at);
                }
                None => {
                    let cancelled = smoother.cancel_pending();
                    debug!(cancelled, "all observers gone, smoother stopping");
                    return;
                }
            },
            _ = sleep_until(deadline) => {
                smoother.advance(Instant::now());
            }
        }
        publish(&snapshot_tx, smoother.snapshot());
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn publish(tx: &watch::Sender<Snapshot>, snapshot: Snapshot) {
    tx.send_if_modified(|current| {
        if *current == snapshot {
            false
        } else {
            *current = snapshot;
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smoother::state::ProcessingState;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn delayed_append_lands_after_delay() {
        let handle = SmootherHandle::spawn(&SmootherConfig::default());
        handle.observe(RecognitionResult::new("hello", 0.8));

        tokio::time::sleep(Duration::from_millis(10)).await;
        let snap = handle.snapshot();
        assert_eq!(snap.label.as_deref(), Some("hello"));
        assert_eq!(snap.processing, ProcessingState::Processing);
        assert!(snap.history.is_empty());

        tokio::time::sleep(Duration::from_millis(800)).await;
        let snap = handle.snapshot();
        assert_eq!(snap.history, vec!["hello"]);
        assert_eq!(snap.processing, ProcessingState::Idle);

        handle.observe(RecognitionResult::new("hello", 0.9));
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(handle.snapshot().history, vec!["hello"]);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_observes_each_append() {
        let handle = SmootherHandle::spawn(&SmootherConfig::default());
        let observer = handle.observer();
        observer.observe(RecognitionResult::new("yes", 0.9));
        tokio::time::sleep(Duration::from_millis(200)).await;
        observer.observe(RecognitionResult::new("no", 0.9));

        // First delay elapsed, second still pending
        tokio::time::sleep(Duration::from_millis(700)).await;
        let snap = handle.snapshot();
        assert_eq!(snap.history, vec!["yes"]);
        assert_eq!(snap.processing, ProcessingState::Processing);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handle.snapshot().history, vec!["yes", "no"]);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_updates() {
        let handle = SmootherHandle::spawn(&SmootherConfig::default());
        let mut rx = handle.subscribe();
        handle.observe(RecognitionResult::new("please", 0.75));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().label.as_deref(), Some("please"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().history, vec!["please"]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_discards_pending_appends() {
        let handle = SmootherHandle::spawn(&SmootherConfig::default());
        let observer = handle.observer();
        let rx = handle.subscribe();
        observer.observe(RecognitionResult::new("hello", 0.9));
        tokio::time::sleep(Duration::from_millis(100)).await;

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.borrow().history.is_empty());

        // Late results are dropped silently
        observer.observe(RecognitionResult::new("yes", 0.9));
    }
}

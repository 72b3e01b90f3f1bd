//! Status monitor: the single listener for worker termination events.

use ripple_core::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::worker::WeakRegistry;

/// How a worker left its run cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerStatus {
    /// Stopped cleanly.
    Ok,
    /// Terminated by a run failure.
    Failed,
}

/// A worker termination notice.
#[derive(Debug)]
pub(crate) struct StatusEvent {
    pub name: String,
    pub status: WorkerStatus,
}

impl StatusEvent {
    pub(crate) fn new(name: String, status: WorkerStatus) -> Self {
        Self { name, status }
    }
}

/// Spawn the monitor task. Every event marks the named worker inactive; a
/// failure event additionally releases the worker's completion barrier on its
/// behalf, so dependents blocked on it observe a null value instead of
/// waiting forever. The task exits when the status channel closes.
pub(crate) fn spawn(registry: WeakRegistry, mut status_rx: mpsc::Receiver<StatusEvent>) {
    tokio::spawn(async move {
        while let Some(event) = status_rx.recv().await {
            debug!(worker = %event.name, status = ?event.status, "worker quit");
            let Some(registry) = registry.upgrade() else {
                return;
            };
            let map = registry.read().await;
            if let Some(worker) = map.get(&event.name) {
                worker.deactivate();
                if event.status == WorkerStatus::Failed {
                    worker.release_barrier(Value::Null);
                }
            }
        }
    });
}

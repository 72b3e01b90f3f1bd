//! Worker: the persistent task evaluating one formula across run cycles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use ripple_core::{Formula, Value};
use ripple_script::{synthesize, Binding, EvalError, ScriptEvaluator};
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, warn};

use crate::monitor::{StatusEvent, WorkerStatus};

/// The name-to-worker registry, shared between the kernel, the worker tasks,
/// and the status monitor. Every access holds the lock only for the duration
/// of the lookup or mutation.
pub(crate) type Registry = Arc<RwLock<HashMap<String, Arc<Worker>>>>;

/// Weak registry handle held by the background tasks, so dropping the kernel
/// tears the whole task tree down.
pub(crate) type WeakRegistry = Weak<RwLock<HashMap<String, Arc<Worker>>>>;

/// Why a worker's run cycle terminated it.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// A referenced dependency name is not in the registry.
    #[error("dependency `{0}` does not exist")]
    MissingDependency(String),

    /// A formula names itself as a dependency; waiting on its own barrier
    /// would deadlock, so this is rejected before any wait.
    #[error("formula `{0}` depends on itself")]
    SelfDependency(String),

    /// The synthesized source failed to compile, or its entry function could
    /// not be retrieved.
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// The kernel was dropped while this worker was computing.
    #[error("kernel is shutting down")]
    Shutdown,
}

/// Shared handle to one worker: its identity, activity flag, completion
/// barrier, and the trigger channels into its task.
pub(crate) struct Worker {
    name: Mutex<String>,
    formula: Formula,
    active: AtomicBool,
    barrier: watch::Sender<Option<Value>>,
    run_tx: mpsc::Sender<()>,
    stop_tx: mpsc::Sender<()>,
}

impl Worker {
    /// The worker's current name (rename can change it mid-flight).
    pub(crate) fn name(&self) -> String {
        self.name.lock().expect("worker name lock").clone()
    }

    pub(crate) fn set_name(&self, name: &str) {
        *self.name.lock().expect("worker name lock") = name.to_string();
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// One-way transition; a worker is never reactivated.
    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// The last value published through the barrier, if any release happened.
    pub(crate) fn last_result(&self) -> Option<Value> {
        self.barrier.borrow().clone()
    }

    /// Release the completion barrier, publishing `value` to all dependents.
    pub(crate) fn release_barrier(&self, value: Value) {
        self.barrier.send_replace(Some(value));
    }

    /// Subscribe to the completion barrier.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<Value>> {
        self.barrier.subscribe()
    }

    /// Non-blocking attempt to deliver a run trigger.
    pub(crate) fn trigger_run(&self) -> bool {
        self.run_tx.try_send(()).is_ok()
    }

    /// Best-effort stop signal; lands when the worker is next in its ready
    /// state. An in-flight computation is never interrupted.
    pub(crate) fn signal_stop(&self) {
        let _ = self.stop_tx.try_send(());
    }
}

/// Create a worker for `name` and spawn its task.
pub(crate) fn spawn(
    name: String,
    formula: Formula,
    registry: WeakRegistry,
    evaluator: Arc<dyn ScriptEvaluator>,
    status_tx: mpsc::Sender<StatusEvent>,
    done_tx: mpsc::Sender<String>,
) -> Arc<Worker> {
    let (barrier, _) = watch::channel(None);
    let (run_tx, run_rx) = mpsc::channel(1);
    let (stop_tx, stop_rx) = mpsc::channel(1);
    let worker = Arc::new(Worker {
        name: Mutex::new(name),
        formula,
        active: AtomicBool::new(true),
        barrier,
        run_tx,
        stop_tx,
    });
    tokio::spawn(run_loop(
        worker.clone(),
        run_rx,
        stop_rx,
        registry,
        evaluator,
        status_tx,
        done_tx,
    ));
    worker
}

/// The worker task: ready → (run trigger → computing → ready) | (stop → gone).
async fn run_loop(
    worker: Arc<Worker>,
    mut run_rx: mpsc::Receiver<()>,
    mut stop_rx: mpsc::Receiver<()>,
    registry: WeakRegistry,
    evaluator: Arc<dyn ScriptEvaluator>,
    status_tx: mpsc::Sender<StatusEvent>,
    done_tx: mpsc::Sender<String>,
) {
    loop {
        debug!(worker = %worker.name(), "ready for commands");
        tokio::select! {
            stop = stop_rx.recv() => {
                if stop.is_some() {
                    debug!(worker = %worker.name(), "stopping");
                    let _ = status_tx
                        .send(StatusEvent::new(worker.name(), WorkerStatus::Ok))
                        .await;
                }
                return;
            }
            run = run_rx.recv() => {
                if run.is_none() {
                    return;
                }
                match compute(&worker, &registry, evaluator.as_ref()).await {
                    Ok(value) => {
                        debug!(worker = %worker.name(), result = %value, "run finished");
                        worker.release_barrier(value);
                        let _ = done_tx.send(worker.name()).await;
                        // Back to ready; the orchestrator decides whether
                        // another trigger or a stop comes next.
                    }
                    Err(err) => {
                        warn!(worker = %worker.name(), error = %err, "run failed");
                        let _ = status_tx
                            .send(StatusEvent::new(worker.name(), WorkerStatus::Failed))
                            .await;
                        return;
                    }
                }
            }
        }
    }
}

/// One evaluation: resolve dependencies, synthesize, compile, invoke.
async fn compute(
    worker: &Worker,
    registry: &WeakRegistry,
    evaluator: &dyn ScriptEvaluator,
) -> Result<Value, WorkerError> {
    let own_name = worker.name();
    let mut bindings = Vec::with_capacity(worker.formula.dependencies.len());
    let mut args = Vec::with_capacity(worker.formula.dependencies.len());

    for dependency in &worker.formula.dependencies {
        if *dependency == own_name {
            return Err(WorkerError::SelfDependency(own_name));
        }
        let dep_worker = {
            let registry = registry.upgrade().ok_or(WorkerError::Shutdown)?;
            let map = registry.read().await;
            map.get(dependency).cloned()
        }
        .ok_or_else(|| WorkerError::MissingDependency(dependency.clone()))?;

        // The sole ordering mechanism: block until the dependency's barrier
        // has released. A cyclic graph deadlocks right here.
        let mut barrier = dep_worker.subscribe();
        let value = barrier
            .wait_for(|slot| slot.is_some())
            .await
            .map_err(|_| WorkerError::Shutdown)?
            .clone()
            .unwrap_or(Value::Null);

        args.push(value.clone());
        bindings.push(Binding::new(dependency.clone(), value));
    }

    let source = synthesize(&worker.formula.code, &bindings);
    debug!(worker = %own_name, %source, "synthesized function");
    let script = evaluator.compile(&source).await?;

    // A fault raised inside formula execution is recovered locally and
    // becomes the result value, not an error status.
    let value = match script.call(&args) {
        Ok(value) => value,
        Err(fault) => {
            warn!(worker = %own_name, %fault, "recovered runtime fault");
            Value::Str(fault.to_string())
        }
    };
    Ok(value)
}

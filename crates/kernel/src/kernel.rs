//! Kernel: the formula registry and recompute orchestrator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ripple_core::{Formula, Value};
use ripple_script::ScriptEvaluator;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::monitor::{self, StatusEvent};
use crate::worker::{self, Registry, Worker};

/// The dependency-driven formula evaluation engine.
///
/// One kernel owns one name-to-worker registry and one status monitor task.
/// Dropping the kernel tears both down; there is no explicit shutdown.
pub struct Kernel {
    registry: Registry,
    evaluator: Arc<dyn ScriptEvaluator>,
    status_tx: mpsc::Sender<StatusEvent>,
}

impl Kernel {
    /// Create a kernel over the given script evaluation capability and start
    /// its status monitor.
    pub fn new(evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        let registry: Registry = Arc::new(RwLock::new(HashMap::new()));
        let (status_tx, status_rx) = mpsc::channel(64);
        monitor::spawn(Arc::downgrade(&registry), status_rx);
        Self {
            registry,
            evaluator,
            status_tx,
        }
    }

    /// Install a fresh worker for `name`, stopping any active prior holder.
    async fn register(&self, name: &str, formula: Formula, done_tx: mpsc::Sender<String>) {
        self.stop(name).await;

        debug!(worker = name, "creating worker");
        let worker = worker::spawn(
            name.to_string(),
            formula,
            Arc::downgrade(&self.registry),
            self.evaluator.clone(),
            self.status_tx.clone(),
            done_tx,
        );
        self.registry.write().await.insert(name.to_string(), worker);
    }

    /// Send a stop signal to `name`'s worker. No-op if the name is unknown or
    /// the worker is inactive. The old task exits on its own schedule.
    async fn stop(&self, name: &str) {
        let map = self.registry.read().await;
        if let Some(worker) = map.get(name) {
            if worker.is_active() {
                worker.signal_stop();
            }
        }
    }

    /// Snapshot count of active workers; the termination oracle for a pass.
    async fn active_count(&self) -> usize {
        let map = self.registry.read().await;
        map.values().filter(|w| w.is_active()).count()
    }

    /// Move a registry entry from `old_name` to `new_name`, updating the
    /// worker's own name if it is still active. Silent no-op when `old_name`
    /// is unknown. The worker is not restarted: an in-flight computation
    /// continues under the new identity.
    pub async fn rename_formula(&self, old_name: &str, new_name: &str) {
        let mut map = self.registry.write().await;
        if let Some(worker) = map.remove(old_name) {
            if worker.is_active() {
                worker.set_name(new_name);
            }
            map.insert(new_name.to_string(), worker);
        }
    }

    /// Deliver a run trigger to every registry worker. The send is
    /// non-blocking and retried with a short sleep until the worker accepts
    /// it, so one slow-starting task cannot stall the pass; a worker that
    /// goes inactive is skipped.
    async fn dispatch_runs(&self) {
        let workers: Vec<Arc<Worker>> = {
            let map = self.registry.read().await;
            map.values().cloned().collect()
        };
        for worker in workers {
            debug!(worker = %worker.name(), "starting");
            while worker.is_active() {
                if worker.trigger_run() {
                    debug!(worker = %worker.name(), "run signal delivered");
                    break;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
    }

    /// Run one full recompute pass over `formulas`.
    ///
    /// Every supplied formula gets a fresh worker; all workers are triggered
    /// and their results drained until no worker is active. Returns the
    /// formatted results by name; formulas whose worker failed are absent.
    pub async fn update(&self, formulas: HashMap<String, Formula>) -> HashMap<String, String> {
        debug!(formulas = formulas.len(), "starting recompute pass");
        let (done_tx, mut done_rx) = mpsc::channel(formulas.len().max(1));
        for (name, formula) in formulas {
            self.register(&name, formula, done_tx.clone()).await;
        }
        drop(done_tx);

        self.dispatch_runs().await;

        let mut output = HashMap::new();
        loop {
            match tokio::time::timeout(Duration::from_millis(1), done_rx.recv()).await {
                Ok(Some(name)) => {
                    debug!(worker = %name, "finished successfully");
                    let worker = {
                        let map = self.registry.read().await;
                        map.get(&name).cloned()
                    };
                    if let Some(worker) = worker {
                        // Successful workers are not reused within a pass.
                        if worker.is_active() {
                            worker.signal_stop();
                        }
                        let value = worker.last_result().unwrap_or(Value::Null);
                        output.insert(name, value.to_string());
                    }
                }
                Ok(None) => {
                    // Every worker has exited; wait for the monitor to catch
                    // up on the activity flags.
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                Err(_) => {}
            }
            if self.active_count().await == 0 {
                break;
            }
        }
        debug!(results = output.len(), "recompute pass finished");
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_script::CalcEvaluator;

    fn kernel() -> Kernel {
        Kernel::new(Arc::new(CalcEvaluator::new()))
    }

    fn sheet(entries: &[(&str, &[&str], &str)]) -> HashMap<String, Formula> {
        entries
            .iter()
            .map(|(name, deps, code)| {
                (
                    name.to_string(),
                    Formula::with_dependencies(deps.iter().copied(), *code),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn literal_formula() {
        let output = kernel().update(sheet(&[("X", &[], "return 2+2")])).await;
        assert_eq!(output.len(), 1);
        assert_eq!(output["X"], "4");
    }

    #[tokio::test]
    async fn dependency_chain() {
        let output = kernel()
            .update(sheet(&[
                ("A", &[], "return 10"),
                ("B", &["A"], "return A * 2"),
            ]))
            .await;
        assert_eq!(output["A"], "10");
        assert_eq!(output["B"], "20");
    }

    #[tokio::test]
    async fn diamond_graph() {
        let output = kernel()
            .update(sheet(&[
                ("A", &[], "return 1"),
                ("B", &["A"], "return A + 1"),
                ("C", &["A"], "return A + 2"),
                ("D", &["B", "C"], "return B * C"),
            ]))
            .await;
        assert_eq!(output["D"], "6");
        assert_eq!(output.len(), 4);
    }

    #[tokio::test]
    async fn missing_dependency_is_omitted() {
        let output = kernel().update(sheet(&[("B", &["A"], "return A")])).await;
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn failed_dependency_releases_dependents() {
        // A fails to compile; the monitor releases its barrier so B observes
        // a null value instead of blocking forever.
        let output = kernel()
            .update(sheet(&[
                ("A", &[], "return ("),
                ("B", &["A"], "return A == null"),
            ]))
            .await;
        assert!(!output.contains_key("A"));
        assert_eq!(output["B"], "true");
    }

    #[tokio::test]
    async fn fault_becomes_data() {
        let output = kernel().update(sheet(&[("X", &[], "return 1/0")])).await;
        assert_eq!(output["X"], "integer division by zero");
    }

    #[tokio::test]
    async fn fault_flows_to_dependents_as_value() {
        let output = kernel()
            .update(sheet(&[
                ("A", &[], "return 1/0"),
                ("B", &["A"], "return A"),
            ]))
            .await;
        assert_eq!(output["A"], "integer division by zero");
        assert_eq!(output["B"], "integer division by zero");
    }

    #[tokio::test]
    async fn self_dependency_fails() {
        let output = kernel().update(sheet(&[("A", &["A"], "return A")])).await;
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn duplicate_dependencies_bind_positionally() {
        let output = kernel()
            .update(sheet(&[
                ("A", &[], "return 10"),
                ("B", &["A", "A"], "return A + args[1]"),
            ]))
            .await;
        assert_eq!(output["B"], "20");
    }

    #[tokio::test]
    async fn repeated_update_is_idempotent() {
        let kernel = kernel();
        let formulas = sheet(&[
            ("A", &[], "return 10"),
            ("B", &["A"], "return A * 2"),
        ]);
        let first = kernel.update(formulas.clone()).await;
        let second = kernel.update(formulas).await;
        assert_eq!(first, second);
        assert_eq!(second["B"], "20");
    }

    #[tokio::test]
    async fn reregistration_supersedes_previous_worker() {
        let kernel = kernel();
        let first = kernel.update(sheet(&[("A", &[], "return 1")])).await;
        assert_eq!(first["A"], "1");
        let second = kernel.update(sheet(&[("A", &[], "return 2")])).await;
        assert_eq!(second["A"], "2");
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn stale_dependency_value_is_readable() {
        // A was computed in an earlier pass and not resupplied; B reads the
        // stale released value instead of deadlocking.
        let kernel = kernel();
        kernel.update(sheet(&[("A", &[], "return 7")])).await;
        let output = kernel.update(sheet(&[("B", &["A"], "return A * 2")])).await;
        assert_eq!(output["B"], "14");
    }

    #[tokio::test]
    async fn rename_moves_registry_entry() {
        let kernel = kernel();
        kernel.update(sheet(&[("A", &[], "return 7")])).await;
        kernel.rename_formula("A", "B").await;
        {
            let map = kernel.registry.read().await;
            assert!(map.get("A").is_none());
            let renamed = map.get("B").expect("entry moved to new name");
            assert_eq!(renamed.last_result(), Some(Value::Int(7)));
        }
        // Dependents now find the result under the new name only.
        let output = kernel
            .update(sheet(&[("C", &["B"], "return B + 1")]))
            .await;
        assert_eq!(output["C"], "8");
        let output = kernel.update(sheet(&[("D", &["A"], "return A")])).await;
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn rename_unknown_name_is_noop() {
        let kernel = kernel();
        kernel.rename_formula("missing", "other").await;
        assert_eq!(kernel.active_count().await, 0);
    }

    #[tokio::test]
    async fn empty_update_returns_empty() {
        let output = kernel().update(HashMap::new()).await;
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn string_results_are_verbatim() {
        let output = kernel()
            .update(sheet(&[("S", &[], r#"return "hi " + "there""#)]))
            .await;
        assert_eq!(output["S"], "hi there");
    }

    #[tokio::test]
    async fn cyclic_dependencies_never_terminate() {
        let kernel = kernel();
        let result = tokio::time::timeout(
            Duration::from_millis(250),
            kernel.update(sheet(&[
                ("A", &["B"], "return B"),
                ("B", &["A"], "return A"),
            ])),
        )
        .await;
        assert!(result.is_err(), "cyclic graph must deadlock the pass");
    }
}

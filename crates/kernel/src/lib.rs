//! The ripple kernel: a dependency-driven formula evaluation engine.
//!
//! The kernel owns a registry of persistent worker tasks, one per formula
//! name. A recompute pass triggers every worker; each worker blocks on its
//! dependencies' completion barriers, synthesizes a function from its formula
//! body, runs it through the injected script evaluator, and publishes the
//! result. A status monitor task tracks which workers are still active so the
//! pass knows when to stop draining results.
//!
//! There is no dependency-cycle detection: a cyclic graph deadlocks inside
//! the barrier waits and the pass never returns.

mod kernel;
mod monitor;
mod worker;

pub use kernel::Kernel;
pub use worker::WorkerError;

//! Script evaluator abstraction.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use ripple_core::Value;

/// Errors that can occur while compiling a synthesized function.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// The source failed to compile or evaluate.
    #[error("compile error: {0}")]
    Compile(String),

    /// The source compiled but the entry function could not be found.
    #[error("symbol lookup failed: {0}")]
    SymbolLookup(String),
}

/// A runtime fault raised while a compiled formula executes.
///
/// Faults never escape a worker: the engine recovers them locally and stores
/// the fault text as the formula's result.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ScriptFault {
    /// Human-readable fault description.
    pub message: String,
}

impl ScriptFault {
    /// Create a fault with the given description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A compiled formula, callable with positionally-bound dependency values.
pub trait CompiledScript: Send + Sync {
    /// Invoke the function. `args` holds one value per dependency, in the
    /// order the formula declared them.
    fn call(&self, args: &[Value]) -> Result<Value, ScriptFault>;
}

impl fmt::Debug for dyn CompiledScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompiledScript")
    }
}

/// The script evaluation capability.
///
/// Given the source of one function taking a sequence of dynamically-typed
/// parameters, implementations compile it and return a callable handle.
/// Implementations must make a standard numeric/math function library
/// available to the source.
#[async_trait]
pub trait ScriptEvaluator: Send + Sync {
    /// Compile the source text, returning a handle to the entry function.
    async fn compile(&self, source: &str) -> Result<Arc<dyn CompiledScript>, EvalError>;
}

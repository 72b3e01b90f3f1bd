//! Script evaluation for ripple.
//!
//! This crate holds the boundary to the script evaluation capability (the
//! service that compiles a synthesized function and returns something
//! callable), the code synthesizer that produces those functions from formula
//! bodies, and a small reference evaluator used by the CLI and tests.

mod calc;
mod evaluator;
mod synth;

pub use calc::CalcEvaluator;
pub use evaluator::{CompiledScript, EvalError, ScriptEvaluator, ScriptFault};
pub use synth::{synthesize, Binding};

//! Formula model - the unit of computation in ripple.

use serde::{Deserialize, Serialize};

/// A named unit of computation: the formulas it reads, in order, plus a body
/// of evaluator-specific source code.
///
/// The body is opaque to the engine; only the evaluator capability interprets
/// it. Dependency names are not de-duplicated: each occurrence produces its
/// own positional binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    /// Formula names this formula reads, in binding order.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Source text of the formula body.
    pub code: String,
}

impl Formula {
    /// Create a formula with no dependencies.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            dependencies: Vec::new(),
            code: code.into(),
        }
    }

    /// Create a formula that reads the given dependencies, in order.
    pub fn with_dependencies<I, S>(dependencies: I, code: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            code: code.into(),
        }
    }
}

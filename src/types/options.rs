use serde::{Deserialize, Serialize};

/// Evaluation-time settings, forwarded opaquely to the rule engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalOptions {
    trace: bool,
    strict_builtin_errors: bool,
}

impl EvalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable expression tracing in the engine.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Treat built-in function errors as evaluation failures instead of
    /// undefined results.
    pub fn with_strict_builtin_errors(mut self, strict: bool) -> Self {
        self.strict_builtin_errors = strict;
        self
    }

    pub fn trace(&self) -> bool {
        self.trace
    }

    pub fn strict_builtin_errors(&self) -> bool {
        self.strict_builtin_errors
    }
}

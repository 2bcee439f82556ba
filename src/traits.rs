//! The capability seam between the policy handle and the rule engine.

use std::sync::Arc;

use serde_json::Value;

use crate::context::EvalContext;
use crate::error::PolicyError;
use crate::source::PolicySource;
use crate::types::{EvalOptions, ResultSet};

/// Compiles rule sources into executable queries.
///
/// The handle owns one engine and invokes it on load and on every reload.
/// Keeping the engine behind this trait keeps the handle testable with a
/// fake engine substituted for the real one.
pub trait RuleEngine: Send + Sync {
    /// Compile the rule source at `source.path()` against `source.query()`.
    ///
    /// Accepts a single rule file, a bundle directory, or a tar.gz bundle
    /// archive; layout detection is the engine's job, callers pass the raw
    /// path through.
    fn compile_from_path(&self, source: &PolicySource) -> Result<Arc<dyn CompiledQuery>, PolicyError>;
}

/// An immutable, executable artifact produced by
/// [`RuleEngine::compile_from_path`].
///
/// A superseded compiled query stays alive for as long as any in-flight
/// evaluation still holds it; it is never mutated in place.
pub trait CompiledQuery: Send + Sync + std::fmt::Debug {
    /// Evaluate the query against one input document.
    ///
    /// Pure function of its arguments; safe to invoke concurrently on the
    /// same compiled query from many threads. Implementations poll `ctx`
    /// at their evaluation checkpoints.
    fn evaluate(
        &self,
        ctx: &EvalContext,
        input: &Value,
        options: &EvalOptions,
    ) -> Result<ResultSet, PolicyError>;

    /// Content digest of the rule source this query was compiled from.
    fn source_digest(&self) -> String;

    /// Bundle revision, when the source carried a manifest.
    fn revision(&self) -> Option<String> {
        None
    }
}

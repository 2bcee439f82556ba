//! The production rule engine, backed by `regorus`.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::context::EvalContext;
use crate::error::PolicyError;
use crate::loader;
use crate::source::PolicySource;
use crate::traits::{CompiledQuery, RuleEngine};
use crate::types::{EvalOptions, QueryResult, ResultSet};

/// Compiles Rego sources with `regorus`.
///
/// Stateless; the compiled state lives in the [`RegoCompiledQuery`] values
/// it produces.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegoRuleEngine;

impl RegoRuleEngine {
    pub fn new() -> Self {
        RegoRuleEngine
    }
}

impl RuleEngine for RegoRuleEngine {
    fn compile_from_path(
        &self,
        source: &PolicySource,
    ) -> Result<Arc<dyn CompiledQuery>, PolicyError> {
        let loaded = loader::load_source(source.path())?;
        debug!(
            event = "Compile",
            phase = "Sources",
            source = %source,
            kind = %loaded.kind(),
            modules = loaded.modules().len()
        );

        let mut engine = regorus::Engine::new();
        for module in loaded.modules() {
            engine
                .add_policy(module.name.clone(), module.source.clone())
                .map_err(|e| PolicyError::CompileError(e.to_string()))?;
        }
        for document in loaded.data() {
            let value = regorus::Value::from_json_str(&document.to_string())
                .map_err(|e| PolicyError::CompileError(e.to_string()))?;
            engine
                .add_data(value)
                .map_err(|e| PolicyError::CompileError(e.to_string()))?;
        }

        Ok(Arc::new(RegoCompiledQuery {
            engine,
            query: source.query().to_string(),
            digest: loaded.digest().to_string(),
            revision: loaded.manifest().and_then(|m| m.revision.clone()),
        }))
    }
}

/// A compiled Rego query.
///
/// Immutable after compilation. Each evaluation works on its own clone of
/// the inner engine: the compiled modules are shared between clones, the
/// mutable evaluation state (input, eval caches) is not, so concurrent
/// evaluations never interfere.
pub struct RegoCompiledQuery {
    engine: regorus::Engine,
    query: String,
    digest: String,
    revision: Option<String>,
}

impl std::fmt::Debug for RegoCompiledQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegoCompiledQuery")
            .field("query", &self.query)
            .field("digest", &self.digest)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl CompiledQuery for RegoCompiledQuery {
    fn evaluate(
        &self,
        ctx: &EvalContext,
        input: &Value,
        options: &EvalOptions,
    ) -> Result<ResultSet, PolicyError> {
        ctx.ensure_live()?;

        let input = regorus::Value::from_json_str(&input.to_string())
            .map_err(|e| PolicyError::EvalError(e.to_string()))?;

        let mut engine = self.engine.clone();
        engine.set_strict_builtin_errors(options.strict_builtin_errors());
        engine.set_input(input);
        let output = engine
            .eval_query(self.query.clone(), options.trace())
            .map_err(|e| PolicyError::EvalError(e.to_string()))?;

        let mut results = Vec::new();
        for row in output.result {
            // Undefined expressions are dropped, matching the convention
            // that an undefined rule yields no result rather than a value.
            let values = row
                .expressions
                .iter()
                .filter(|expression| expression.value != regorus::Value::Undefined)
                .map(|expression| {
                    serde_json::to_value(&expression.value)
                        .map_err(|e| PolicyError::EvalError(e.to_string()))
                })
                .collect::<Result<Vec<Value>, PolicyError>>()?;
            if values.is_empty() {
                continue;
            }
            results.push(QueryResult::new(values));
        }
        Ok(ResultSet::new(results))
    }

    fn source_digest(&self) -> String {
        self.digest.clone()
    }

    fn revision(&self) -> Option<String> {
        self.revision.clone()
    }
}

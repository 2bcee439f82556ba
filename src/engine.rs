use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::context::EvalContext;
use crate::error::PolicyError;
use crate::metrics;
use crate::rego::RegoRuleEngine;
use crate::source::PolicySource;
use crate::traits::{CompiledQuery, RuleEngine};
use crate::types::{EvalOptions, PolicyVersion, ResultSet};

/// The compiled query a handle currently serves, plus its version metadata.
///
/// Immutable once published. A snapshot held by an in-flight evaluation
/// stays valid after being superseded; it is dropped when its last holder
/// finishes.
pub struct PolicySnapshot {
    compiled: Arc<dyn CompiledQuery>,
    version: PolicyVersion,
}

impl PolicySnapshot {
    fn new(compiled: Arc<dyn CompiledQuery>) -> Self {
        let version = PolicyVersion {
            hash: compiled.source_digest(),
            revision: compiled.revision(),
            loaded_at: Utc::now().to_rfc3339(),
        };
        PolicySnapshot { compiled, version }
    }

    pub fn version(&self) -> &PolicyVersion {
        &self.version
    }

    pub fn compiled(&self) -> &dyn CompiledQuery {
        self.compiled.as_ref()
    }
}

/// The main policy handle. Cloneable and thread-safe.
///
/// Created by [`PolicyEngine::load_from_path`]; serves any number of
/// concurrent [`PolicyEngine::evaluate`] calls while
/// [`PolicyEngine::reload`] re-points it at freshly compiled rules. The
/// active snapshot is always a fully compiled policy: a failed reload
/// leaves the previous one in force.
#[derive(Clone)]
pub struct PolicyEngine {
    source: PolicySource,
    engine: Arc<dyn RuleEngine>,
    current: Arc<RwLock<Arc<PolicySnapshot>>>,
    // Serializes reloads so a slow compile cannot publish over a newer one.
    reload_serial: Arc<Mutex<()>>,
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl PolicyEngine {
    /// Load and compile the policy at `path`, extracting the decision named
    /// by the dotted `query` reference (e.g. `data.policy.allow`).
    ///
    /// `path` may name a single rule file, a bundle directory, or a tar.gz
    /// bundle archive; the layouts are interchangeable.
    pub fn load_from_path(
        path: impl Into<PathBuf>,
        query: impl Into<String>,
    ) -> Result<Self, PolicyError> {
        Self::load_from_path_with_engine(Arc::new(RegoRuleEngine::new()), path, query)
    }

    /// Like [`PolicyEngine::load_from_path`], with an injected rule engine.
    pub fn load_from_path_with_engine(
        engine: Arc<dyn RuleEngine>,
        path: impl Into<PathBuf>,
        query: impl Into<String>,
    ) -> Result<Self, PolicyError> {
        let source = PolicySource::new(path, query)?;
        let compiled =
            engine
                .compile_from_path(&source)
                .map_err(|e| PolicyError::LoadError {
                    path: source.path().display().to_string(),
                    cause: e.to_string(),
                })?;
        let snapshot = Arc::new(PolicySnapshot::new(compiled));
        info!(
            event = "Load",
            phase = "Published",
            source = %source,
            hash = %snapshot.version().hash
        );

        Ok(PolicyEngine {
            source,
            engine,
            current: Arc::new(RwLock::new(snapshot)),
            reload_serial: Arc::new(Mutex::new(())),
        })
    }

    /// Recompile from the handle's source against the filesystem's current
    /// contents and atomically publish the result.
    ///
    /// All-or-nothing: on failure the previously compiled policy stays in
    /// force and keeps serving evaluations. An evaluation concurrent with a
    /// reload completes against either the pre-reload or the post-reload
    /// snapshot, never a mixture.
    pub fn reload(&self) -> Result<(), PolicyError> {
        let _serial = self.reload_serial.lock()?;

        // Compile outside the snapshot lock; in-flight and new evaluations
        // keep serving the current snapshot until the swap below.
        let compiled = match self.engine.compile_from_path(&self.source) {
            Ok(compiled) => compiled,
            Err(e) => {
                warn!(
                    event = "Reload",
                    phase = "Failed",
                    source = %self.source,
                    cause = %e
                );
                return Err(PolicyError::ReloadError {
                    path: self.source.path().display().to_string(),
                    cause: e.to_string(),
                });
            }
        };

        let snapshot = Arc::new(PolicySnapshot::new(compiled));
        let hash = snapshot.version().hash.clone();
        *self.current.write()? = snapshot;

        metrics::record_reload(hash.clone());
        info!(
            event = "Reload",
            phase = "Published",
            source = %self.source,
            hash = %hash
        );
        Ok(())
    }

    /// Evaluate `input` against the currently active compiled policy.
    pub fn evaluate(&self, ctx: &EvalContext, input: &Value) -> Result<ResultSet, PolicyError> {
        self.evaluate_with_options(ctx, input, &EvalOptions::default())
    }

    /// Evaluate with explicit engine options.
    ///
    /// Never mutates the handle, and failures are not retried; each call's
    /// error is independent of past and future calls.
    pub fn evaluate_with_options(
        &self,
        ctx: &EvalContext,
        input: &Value,
        options: &EvalOptions,
    ) -> Result<ResultSet, PolicyError> {
        // One atomic observation of the active snapshot; the lock is
        // released before evaluation starts.
        let snapshot = self.current_snapshot()?;
        debug!(
            event = "Request",
            phase = "Evaluation",
            query = self.source.query(),
            hash = %snapshot.version().hash
        );

        let started = Instant::now();
        let result = snapshot.compiled().evaluate(ctx, input, options);
        match &result {
            Ok(set) => {
                metrics::record_evaluation(
                    set.allowed(),
                    started.elapsed(),
                    self.source.query().to_string(),
                );
                debug!(
                    event = "Request",
                    phase = "Result",
                    allowed = set.allowed(),
                    results = set.len()
                );
            }
            Err(e) => {
                debug!(event = "Request", phase = "Error", cause = %e);
            }
        }
        result
    }

    /// The currently active snapshot.
    pub fn current_snapshot(&self) -> Result<Arc<PolicySnapshot>, PolicyError> {
        Ok(Arc::clone(&*self.current.read()?))
    }

    /// Version metadata of the currently active snapshot.
    pub fn current_version(&self) -> Result<PolicyVersion, PolicyError> {
        Ok(self.current_snapshot()?.version().clone())
    }

    pub fn source(&self) -> &PolicySource {
        &self.source
    }
}

#[cfg(test)]
mod tests;

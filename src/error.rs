use std::sync::{Arc, MutexGuard, PoisonError, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::PolicySnapshot;

/// Error taxonomy for the policy handle.
///
/// `LoadError` is fatal to that load attempt and no handle is produced.
/// `ReloadError` is non-fatal to the handle: the previously compiled policy
/// stays in force. Evaluation-time failures (`EvalError`, `Cancelled`,
/// `DeadlineExceeded`) never affect the stored compiled query, and no error
/// poisons later calls.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum PolicyError {
    #[error("failed to load policy from {path}: {cause}")]
    LoadError { path: String, cause: String },

    #[error("failed to reload policy from {path}: {cause}")]
    ReloadError { path: String, cause: String },

    #[error("evaluation error: {0}")]
    EvalError(String),

    #[error("policy source not found: {0}")]
    SourceNotFound(String),

    #[error("failed to read policy source {path}: {cause}")]
    SourceUnreadable { path: String, cause: String },

    #[error("failed to compile policy: {0}")]
    CompileError(String),

    #[error("invalid query reference: {0}")]
    InvalidQuery(String),

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("evaluation deadline exceeded")]
    DeadlineExceeded,

    #[error("poisoned lock error: {0}")]
    PoisonedLockError(String),
}

impl PolicyError {
    /// True for errors produced while evaluating, as opposed to while
    /// loading or reloading.
    pub fn is_eval_error(&self) -> bool {
        matches!(
            self,
            PolicyError::EvalError(_) | PolicyError::Cancelled | PolicyError::DeadlineExceeded
        )
    }

    pub fn is_load_error(&self) -> bool {
        matches!(self, PolicyError::LoadError { .. })
    }

    pub fn is_reload_error(&self) -> bool {
        matches!(self, PolicyError::ReloadError { .. })
    }
}

impl From<PoisonError<RwLockReadGuard<'_, Arc<PolicySnapshot>>>> for PolicyError {
    fn from(err: PoisonError<RwLockReadGuard<'_, Arc<PolicySnapshot>>>) -> Self {
        PolicyError::PoisonedLockError(err.to_string())
    }
}

impl From<PoisonError<RwLockWriteGuard<'_, Arc<PolicySnapshot>>>> for PolicyError {
    fn from(err: PoisonError<RwLockWriteGuard<'_, Arc<PolicySnapshot>>>) -> Self {
        PolicyError::PoisonedLockError(err.to_string())
    }
}

impl From<PoisonError<MutexGuard<'_, ()>>> for PolicyError {
    fn from(err: PoisonError<MutexGuard<'_, ()>>) -> Self {
        PolicyError::PoisonedLockError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let load = PolicyError::LoadError {
            path: "policy.rego".to_string(),
            cause: "no such file".to_string(),
        };
        assert!(load.is_load_error());
        assert!(!load.is_reload_error());
        assert!(!load.is_eval_error());

        let reload = PolicyError::ReloadError {
            path: "policy.rego".to_string(),
            cause: "syntax error".to_string(),
        };
        assert!(reload.is_reload_error());

        assert!(PolicyError::Cancelled.is_eval_error());
        assert!(PolicyError::DeadlineExceeded.is_eval_error());
        assert!(PolicyError::EvalError("type mismatch".to_string()).is_eval_error());
    }

    #[test]
    fn test_error_display_carries_cause() {
        let err = PolicyError::LoadError {
            path: "bundle.tar.gz".to_string(),
            cause: "unexpected token".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("bundle.tar.gz"));
        assert!(display.contains("unexpected token"));
    }

    #[test]
    fn test_error_serialization() {
        let err = PolicyError::InvalidQuery("data..allow".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: PolicyError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, PolicyError::InvalidQuery(q) if q == "data..allow"));
    }
}

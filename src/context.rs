//! Cancellation and deadline scope for evaluations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::PolicyError;

/// Per-evaluation context: an optional deadline plus a shared cancellation
/// flag.
///
/// Cancelling a context aborts only evaluations observing it; the policy
/// handle's stored compiled query and any concurrent reload are unaffected.
/// Engines poll [`EvalContext::ensure_live`] at their evaluation
/// checkpoints.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl EvalContext {
    /// A context that never expires.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        EvalContext {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// A handle that cancels every evaluation sharing this context.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancelled))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Err if the context has been cancelled or its deadline has passed.
    pub fn ensure_live(&self) -> Result<(), PolicyError> {
        if self.is_cancelled() {
            return Err(PolicyError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(PolicyError::DeadlineExceeded);
            }
        }
        Ok(())
    }
}

/// Cancels the evaluations sharing its context. Cloneable and thread-safe.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_context_is_live() {
        let ctx = EvalContext::background();
        assert!(ctx.ensure_live().is_ok());
        assert!(!ctx.is_cancelled());
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn test_cancelled_context() {
        let ctx = EvalContext::background();
        ctx.cancel_handle().cancel();
        assert!(ctx.is_cancelled());
        assert!(matches!(ctx.ensure_live(), Err(PolicyError::Cancelled)));
    }

    #[test]
    fn test_cancellation_is_shared_across_clones() {
        let ctx = EvalContext::background();
        let clone = ctx.clone();
        ctx.cancel_handle().cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_expired_deadline() {
        let ctx = EvalContext::with_deadline(Instant::now());
        assert!(matches!(
            ctx.ensure_live(),
            Err(PolicyError::DeadlineExceeded)
        ));
    }

    #[test]
    fn test_future_deadline_is_live() {
        let ctx = EvalContext::with_timeout(Duration::from_secs(60));
        assert!(ctx.ensure_live().is_ok());
    }

    #[test]
    fn test_cancellation_reported_before_deadline() {
        let ctx = EvalContext::with_deadline(Instant::now());
        ctx.cancel_handle().cancel();
        assert!(matches!(ctx.ensure_live(), Err(PolicyError::Cancelled)));
    }
}

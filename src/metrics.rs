//! Vendor-agnostic metrics collection via a pluggable sink.
//!
//! Implement [`MetricsSink`] to route evaluation and reload events to any
//! backend (Prometheus, OpenTelemetry, CloudWatch, ...) without tying the
//! library to one. If no sink is set, a built-in no-op sink is used.
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use gatepost_core::metrics::{EvaluationStats, MetricsSink, ReloadStats};
//!
//! struct CounterSink {
//!     evaluations: AtomicU64,
//! }
//!
//! impl MetricsSink for CounterSink {
//!     fn on_evaluation(&self, stats: &EvaluationStats) {
//!         self.evaluations.fetch_add(1, Ordering::Relaxed);
//!         eprintln!("eval took {:?}, allowed: {}", stats.duration, stats.allowed);
//!     }
//!
//!     fn on_reload(&self, _stats: &ReloadStats) {}
//! }
//!
//! gatepost_core::metrics::set_sink(Arc::new(CounterSink { evaluations: AtomicU64::new(0) }));
//! ```

use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tracing::warn;

/// Snapshot of one policy evaluation, passed to [`MetricsSink::on_evaluation`].
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationStats {
    /// Total wall-clock time for the evaluation.
    pub duration: Duration,
    /// Whether the result set extracted to an allow decision.
    pub allowed: bool,
    /// The query reference that was evaluated.
    pub query: String,
}

/// Snapshot of one successful policy reload, passed to [`MetricsSink::on_reload`].
#[derive(Debug, Clone, Serialize)]
pub struct ReloadStats {
    /// Time when the reload published its snapshot.
    pub reload_time: SystemTime,
    /// Content hash of the newly published policy.
    pub hash: String,
}

/// Trait for consuming evaluation and reload metrics.
///
/// Invoked synchronously after every evaluation and every successful
/// reload. Implementations must be thread-safe and should return quickly;
/// they are called on the evaluation hot path.
pub trait MetricsSink: Send + Sync {
    /// Called after each policy evaluation with timing and decision info.
    fn on_evaluation(&self, stats: &EvaluationStats);

    /// Called after each successful policy reload.
    fn on_reload(&self, stats: &ReloadStats);
}

/// No-op sink; metrics are silently dropped.
struct NoOpSink;

impl MetricsSink for NoOpSink {
    fn on_evaluation(&self, _stats: &EvaluationStats) {}
    fn on_reload(&self, _stats: &ReloadStats) {}
}

static SINK: OnceLock<Arc<dyn MetricsSink>> = OnceLock::new();

fn sink() -> Arc<dyn MetricsSink> {
    match SINK.get() {
        Some(sink) => Arc::clone(sink),
        None => Arc::new(NoOpSink),
    }
}

/// Set the global metrics sink.
///
/// Call once at application startup. A second call is ignored with a
/// warning; the sink cannot be swapped after installation.
pub fn set_sink(sink: Arc<dyn MetricsSink>) {
    if SINK.set(sink).is_err() {
        warn!("metrics sink was already installed; ignoring subsequent set_sink call");
    }
}

pub(crate) fn record_evaluation(allowed: bool, duration: Duration, query: String) {
    sink().on_evaluation(&EvaluationStats {
        duration,
        allowed,
        query,
    });
}

pub(crate) fn record_reload(hash: String) {
    sink().on_reload(&ReloadStats {
        reload_time: SystemTime::now(),
        hash,
    });
}

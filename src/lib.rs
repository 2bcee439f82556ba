// src/lib.rs
pub use context::{CancelHandle, EvalContext};
pub use engine::{PolicyEngine, PolicySnapshot};
pub use error::PolicyError;
pub use loader::{Manifest, RuleModule, SourceKind};
pub use rego::RegoRuleEngine;
pub use source::PolicySource;
pub use traits::{CompiledQuery, RuleEngine};
pub use types::{EvalOptions, PolicyVersion, QueryResult, ResultSet};

mod context;
mod engine;
mod error;
mod loader;
pub mod metrics;
mod rego;
mod source;
mod traits;
mod types;

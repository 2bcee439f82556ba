use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Shape of a query reference: a dotted path into the compiled rule
/// namespace, e.g. `data.policy.allow`.
static QUERY_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").unwrap());

/// Where a policy comes from and which rule result constitutes the decision.
///
/// Immutable once constructed; a reload re-reads the same path with the same
/// query. Whether the referenced rule actually exists is not checked here;
/// that surfaces at first evaluation, per the rule engine's own semantics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PolicySource {
    path: PathBuf,
    query: String,
}

impl PolicySource {
    /// Construct a source, validating the query reference shape.
    pub fn new(path: impl Into<PathBuf>, query: impl Into<String>) -> Result<Self, PolicyError> {
        let query = query.into();
        if query.is_empty() {
            return Err(PolicyError::InvalidQuery(
                "query reference must not be empty".to_string(),
            ));
        }
        if !QUERY_REFERENCE.is_match(&query) {
            return Err(PolicyError::InvalidQuery(format!(
                "not a dotted rule reference: {query}"
            )));
        }
        Ok(PolicySource {
            path: path.into(),
            query,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

impl Display for PolicySource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}#{}", self.path.display(), self.query)
    }
}

//! Evaluation result sets.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// One result row from evaluating a compiled query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, ToSchema)]
pub struct QueryResult {
    /// Values of the query's expressions, in expression order.
    pub values: Vec<Value>,
}

impl QueryResult {
    pub fn new(values: Vec<Value>) -> Self {
        QueryResult { values }
    }
}

/// The full outcome of one evaluation: zero or more result rows.
///
/// An empty set means the queried rule was undefined for the input, which
/// callers extracting a boolean decision treat as "not allowed".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, ToSchema)]
pub struct ResultSet {
    results: Vec<QueryResult>,
}

impl ResultSet {
    pub fn new(results: Vec<QueryResult>) -> Self {
        ResultSet { results }
    }

    pub fn empty() -> Self {
        ResultSet::default()
    }

    pub fn results(&self) -> &[QueryResult] {
        &self.results
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// The boolean decision: exactly one result row whose single expression
    /// value is `true`. Undefined results and non-boolean values are not
    /// allowed.
    pub fn allowed(&self) -> bool {
        match self.results.as_slice() {
            [row] => matches!(row.values.as_slice(), [Value::Bool(true)]),
            _ => false,
        }
    }

    /// The single decision value, when the query produced exactly one.
    pub fn value(&self) -> Option<&Value> {
        match self.results.as_slice() {
            [row] => match row.values.as_slice() {
                [value] => Some(value),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Display for ResultSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.value() {
            Some(value) => write!(f, "ResultSet({value})"),
            None => write!(f, "ResultSet({} results)", self.results.len()),
        }
    }
}

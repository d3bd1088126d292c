//! Query specifications, plans and results.
//!
//! A [`QuerySpec`] is the unit submitted to the store: fixed SQL text with
//! positional placeholders, the values bound to them and a timeout. The text
//! never carries request data; only allow-listed identifiers vary in it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Per-query timeout applied when none is configured.
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 5_000;

/// One result record, column name to value.
pub type Row = Map<String, Value>;

// ============================================================================
// QUERY SPEC
// ============================================================================

/// Value bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Text(String),
    Bool(bool),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

/// Parameterized query plus execution timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub text: String,
    pub parameters: Vec<SqlValue>,
    pub timeout_ms: u64,
    /// Fixed column the final row set is sorted by, ascending. Executors that
    /// wrap `text` in an outer query apply it there, since an inner
    /// `ORDER BY` does not survive the wrapping.
    #[serde(skip)]
    pub order_by: Option<&'static str>,
}

impl QuerySpec {
    pub fn new(text: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
            timeout_ms,
            order_by: None,
        }
    }

    pub fn ordered_by(mut self, column: &'static str) -> Self {
        self.order_by = Some(column);
        self
    }

    /// Append a bound value; its placeholder is `$n` where n is the new length.
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.parameters.push(value.into());
        self
    }
}

/// A query tagged with the slot its rows are merged into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedQuery {
    pub slot: &'static str,
    pub spec: QuerySpec,
}

/// Strategy chosen for a command, with the queries it needs up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// Execute once, return the rows.
    Single(QuerySpec),
    /// Execute the lookup; its first row names the table read by the
    /// second stage, which the router builds from that result.
    TwoStage { lookup: QuerySpec },
    /// Execute all concurrently and merge by slot.
    ParallelMerge(Vec<NamedQuery>),
    /// The command cannot be served; no query is issued.
    Unsupported { reason: String },
}

impl QueryPlan {
    pub fn unsupported(reason: impl Into<String>) -> Self {
        QueryPlan::Unsupported {
            reason: reason.into(),
        }
    }

    /// Strategy label for logs and metrics.
    pub fn strategy(&self) -> &'static str {
        match self {
            QueryPlan::Single(_) => "single",
            QueryPlan::TwoStage { .. } => "two_stage",
            QueryPlan::ParallelMerge(_) => "parallel_merge",
            QueryPlan::Unsupported { .. } => "unsupported",
        }
    }

    /// Specs known before execution starts.
    pub fn specs(&self) -> Vec<&QuerySpec> {
        match self {
            QueryPlan::Single(spec) => vec![spec],
            QueryPlan::TwoStage { lookup } => vec![lookup],
            QueryPlan::ParallelMerge(queries) => queries.iter().map(|q| &q.spec).collect(),
            QueryPlan::Unsupported { .. } => Vec::new(),
        }
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// Rows returned by one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub row_count: u64,
}

impl QueryResult {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let row_count = rows.len() as u64;
        Self { rows, row_count }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Named grouping of row sets from a parallel merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregatedResult {
    groups: BTreeMap<String, Vec<Row>>,
}

impl AggregatedResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: impl Into<String>, rows: Vec<Row>) {
        self.groups.insert(slot.into(), rows);
    }

    pub fn get(&self, slot: &str) -> Option<&Vec<Row>> {
        self.groups.get(slot)
    }

    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Successful dispatch payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Rows(QueryResult),
    Aggregated(AggregatedResult),
}

impl DispatchOutcome {
    /// Wire form: a row array, or an object keyed by slot.
    pub fn into_json(self) -> Value {
        match self {
            DispatchOutcome::Rows(result) => {
                Value::Array(result.rows.into_iter().map(Value::Object).collect())
            }
            DispatchOutcome::Aggregated(merged) => Value::Object(
                merged
                    .groups
                    .into_iter()
                    .map(|(slot, rows)| {
                        (slot, Value::Array(rows.into_iter().map(Value::Object).collect()))
                    })
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[test]
    fn test_bind_appends_in_order() {
        let spec = QuerySpec::new("SELECT $1, $2", 100).bind("a").bind(true);
        assert_eq!(
            spec.parameters,
            vec![SqlValue::Text("a".to_string()), SqlValue::Bool(true)]
        );
    }

    #[test]
    fn test_rows_render_as_array() {
        let outcome = DispatchOutcome::Rows(QueryResult::from_rows(vec![row(json!({"a": 1}))]));
        assert_eq!(outcome.into_json(), json!([{"a": 1}]));
    }

    #[test]
    fn test_aggregated_renders_as_object() {
        let mut merged = AggregatedResult::new();
        merged.insert("lockedData", vec![]);
        merged.insert("activityDetails", vec![row(json!({"activity_id": "a1"}))]);
        let json = DispatchOutcome::Aggregated(merged).into_json();
        assert_eq!(
            json,
            json!({"activityDetails": [{"activity_id": "a1"}], "lockedData": []})
        );
    }
}

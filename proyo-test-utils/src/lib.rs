//! Proyo Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - `MockExecutor`, a scripted in-memory `QueryExecutor`
//! - request fixtures for each command code
//! - proptest generators for gateway and webhook inputs

pub use proyo_core::{
    CommandCode, CommandRequest, GatewayError, QueryError, QueryExecutor, QueryResult, QuerySpec,
    Row,
};

use async_trait::async_trait;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

// ============================================================================
// MOCK EXECUTOR
// ============================================================================

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    response: Result<Vec<Row>, QueryError>,
    delay: Option<Duration>,
}

/// In-memory executor answering queries from a script.
///
/// Each rule matches when its needle is a substring of the query text; the
/// first matching rule wins. Unmatched queries return no rows. Every
/// executed spec is recorded in order of arrival.
#[derive(Debug, Default)]
pub struct MockExecutor {
    rules: Mutex<Vec<Rule>>,
    executed: Mutex<Vec<QuerySpec>>,
    unreachable: Mutex<bool>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer queries containing `needle` with `rows`.
    pub fn with_rows(self, needle: impl Into<String>, rows: Vec<Row>) -> Self {
        self.push(needle, Ok(rows), None)
    }

    /// Answer queries containing `needle` with `error`.
    pub fn with_error(self, needle: impl Into<String>, error: QueryError) -> Self {
        self.push(needle, Err(error), None)
    }

    /// Answer queries containing `needle` with `rows` after `delay`.
    pub fn with_delayed_rows(
        self,
        needle: impl Into<String>,
        rows: Vec<Row>,
        delay: Duration,
    ) -> Self {
        self.push(needle, Ok(rows), Some(delay))
    }

    /// Make `ping` fail.
    pub fn unreachable(self) -> Self {
        *lock(&self.unreachable) = true;
        self
    }

    fn push(
        self,
        needle: impl Into<String>,
        response: Result<Vec<Row>, QueryError>,
        delay: Option<Duration>,
    ) -> Self {
        lock(&self.rules).push(Rule {
            needle: needle.into(),
            response,
            delay,
        });
        self
    }

    /// Specs executed so far.
    pub fn executed(&self) -> Vec<QuerySpec> {
        lock(&self.executed).clone()
    }

    pub fn execution_count(&self) -> usize {
        lock(&self.executed).len()
    }

    /// Whether any executed query contained `needle`.
    pub fn saw(&self, needle: &str) -> bool {
        lock(&self.executed).iter().any(|spec| spec.text.contains(needle))
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn execute(&self, spec: &QuerySpec) -> Result<QueryResult, QueryError> {
        lock(&self.executed).push(spec.clone());

        let rule = lock(&self.rules)
            .iter()
            .find(|rule| spec.text.contains(&rule.needle))
            .cloned();

        let Some(rule) = rule else {
            return Ok(QueryResult::default());
        };
        if let Some(delay) = rule.delay {
            tokio::time::sleep(delay).await;
        }
        rule.response.map(QueryResult::from_rows)
    }

    async fn ping(&self) -> Result<(), QueryError> {
        if *lock(&self.unreachable) {
            Err(QueryError::connection("mock store unreachable"))
        } else {
            Ok(())
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Build a row from a JSON object literal.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("row fixture must be an object, got {}", other),
    }
}

/// `cmd: "1"` body for a student in class 8.
pub fn overview_payload() -> Value {
    json!({"cmd": "1", "user": "auden_cbse", "class": "8", "section": "A"})
}

/// `cmd: "2"` body; `complete` selects the update path.
pub fn progress_payload(complete: bool) -> Value {
    json!({"cmd": "2", "user": "auden_cbse", "id": "activity123", "isComplete": complete})
}

/// `cmd: "3"` body for `activity123` in class 8.
pub fn asset_lookup_payload() -> Value {
    json!({"cmd": "3", "user": "auden_cbse", "class": "8", "section": "A", "id": "activity123"})
}

/// `cmd: "4"` body.
pub fn token_usage_payload() -> Value {
    json!({"cmd": "4", "user": "auden@cbse.in"})
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Webhook display names.
pub fn webhook_name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 _-]{0,30}"
}

/// HTTP methods accepted for webhooks, in assorted case.
pub fn webhook_method_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("GET"),
        Just("post"),
        Just("PUT"),
        Just("Patch"),
        Just("DELETE"),
    ]
    .prop_map(str::to_string)
}

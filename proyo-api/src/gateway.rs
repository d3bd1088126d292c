//! Command Gateway
//!
//! Turns a [`CommandRequest`] into store queries and a normalized payload.
//! The [`QueryBuilder`] picks the strategy; this module runs it:
//!
//! ```text
//! Received -> Validated -> SingleQuery | TwoStageQuery | ParallelMergeQuery -> Completed | Failed
//! ```

use futures_util::future::join_all;
use proyo_core::{
    AggregatedResult, AssetTableRef, CommandRequest, DispatchOutcome, GatewayError, NamedQuery,
    QueryBuilder, QueryError, QueryExecutor, QueryPlan, QueryResult, QuerySpec,
    ASSET_REFERENCE_COLUMN,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::telemetry::metrics;

/// Lifecycle of one dispatch, as it appears in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Received,
    Validated,
    SingleQuery,
    TwoStageQuery,
    ParallelMergeQuery,
    Completed,
    Failed,
}

impl DispatchState {
    fn for_plan(plan: &QueryPlan) -> Option<Self> {
        match plan {
            QueryPlan::Single(_) => Some(DispatchState::SingleQuery),
            QueryPlan::TwoStage { .. } => Some(DispatchState::TwoStageQuery),
            QueryPlan::ParallelMerge(_) => Some(DispatchState::ParallelMergeQuery),
            QueryPlan::Unsupported { .. } => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchState::Received => "received",
            DispatchState::Validated => "validated",
            DispatchState::SingleQuery => "single_query",
            DispatchState::TwoStageQuery => "two_stage_query",
            DispatchState::ParallelMergeQuery => "parallel_merge_query",
            DispatchState::Completed => "completed",
            DispatchState::Failed => "failed",
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatches commands to the strategy their plan names.
#[derive(Clone)]
pub struct CommandRouter {
    builder: QueryBuilder,
    executor: Arc<dyn QueryExecutor>,
}

impl CommandRouter {
    pub fn new(executor: Arc<dyn QueryExecutor>, builder: QueryBuilder) -> Self {
        Self { builder, executor }
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn executor(&self) -> &Arc<dyn QueryExecutor> {
        &self.executor
    }

    /// Parse a JSON body, dispatch it and render the outcome.
    ///
    /// Shared by the HTTP route and the gateway webhook.
    pub async fn handle_payload(&self, payload: Value) -> Result<Value, GatewayError> {
        let request = CommandRequest::from_payload(payload)?;
        let outcome = self.dispatch(&request).await?;
        Ok(outcome.into_json())
    }

    /// Run the plan for `request`.
    ///
    /// Unsupported commands fail before any query is issued. Nothing is
    /// retried.
    pub async fn dispatch(&self, request: &CommandRequest) -> Result<DispatchOutcome, GatewayError> {
        let start = Instant::now();
        let command = request.command().as_str().to_string();
        tracing::debug!(command = %command, state = %DispatchState::Received, "Command received");

        let plan = self.builder.build(request);
        let strategy = plan.strategy();
        if let Some(state) = DispatchState::for_plan(&plan) {
            tracing::debug!(command = %command, state = %DispatchState::Validated, "Command validated");
            tracing::debug!(command = %command, state = %state, "Executing plan");
        }
        let result = self.run(plan).await;

        let elapsed = start.elapsed();
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        if let Some(metrics) = metrics() {
            metrics.record_dispatch(&command, strategy, outcome, elapsed.as_secs_f64());
        }

        match &result {
            Ok(_) => tracing::info!(
                command = %command,
                strategy,
                state = %DispatchState::Completed,
                duration_ms = elapsed.as_millis(),
                "Command completed"
            ),
            Err(e) if e.is_client_error() => tracing::info!(
                command = %command,
                strategy,
                state = %DispatchState::Failed,
                error = %e,
                "Command rejected"
            ),
            Err(e) => tracing::error!(
                command = %command,
                strategy,
                state = %DispatchState::Failed,
                error = %e,
                "Command failed"
            ),
        }

        result
    }

    async fn run(&self, plan: QueryPlan) -> Result<DispatchOutcome, GatewayError> {
        match plan {
            QueryPlan::Single(spec) => Ok(DispatchOutcome::Rows(self.execute(&spec).await?)),
            QueryPlan::TwoStage { lookup } => {
                self.two_stage(&lookup).await.map(DispatchOutcome::Rows)
            }
            QueryPlan::ParallelMerge(queries) => {
                self.parallel_merge(&queries).await.map(DispatchOutcome::Aggregated)
            }
            QueryPlan::Unsupported { reason } => Err(GatewayError::invalid_command(reason)),
        }
    }

    /// Lookup first; its row names the table read by the second query.
    async fn two_stage(&self, lookup: &QuerySpec) -> Result<QueryResult, GatewayError> {
        let found = self.execute(lookup).await?;
        let first = found.rows.first().ok_or(GatewayError::ReferenceNotFound)?;

        let raw = match first.get(ASSET_REFERENCE_COLUMN) {
            None | Some(Value::Null) => return Err(GatewayError::ReferenceNotFound),
            Some(Value::String(raw)) => raw.as_str(),
            Some(other) => {
                return Err(GatewayError::InvalidReference {
                    reference: other.to_string(),
                })
            }
        };
        let reference = AssetTableRef::parse(raw).ok_or_else(|| GatewayError::InvalidReference {
            reference: raw.to_string(),
        })?;

        tracing::debug!(reference = %reference, "Resolved asset table");
        let rows = self.builder.asset_rows(&reference);
        Ok(self.execute(&rows).await?)
    }

    /// Run every query concurrently, wait for all of them, then merge by slot.
    ///
    /// Any failure fails the whole merge; the first failed slot in plan order
    /// is reported.
    async fn parallel_merge(&self, queries: &[NamedQuery]) -> Result<AggregatedResult, GatewayError> {
        let results = join_all(queries.iter().map(|query| self.execute(&query.spec))).await;

        let mut merged = AggregatedResult::new();
        for (query, result) in queries.iter().zip(results) {
            match result {
                Ok(rows) => merged.insert(query.slot, rows.rows),
                Err(source) => {
                    return Err(GatewayError::PartialMerge {
                        slot: query.slot.to_string(),
                        source,
                    })
                }
            }
        }
        Ok(merged)
    }

    async fn execute(&self, spec: &QuerySpec) -> Result<QueryResult, QueryError> {
        let start = Instant::now();
        let result = self.executor.execute(spec).await;
        let elapsed = start.elapsed();

        if let Some(metrics) = metrics() {
            metrics.record_query(result.is_ok(), elapsed.as_secs_f64());
        }
        match &result {
            Ok(rows) => tracing::debug!(
                rows = rows.row_count,
                parameters = spec.parameters.len(),
                duration_ms = elapsed.as_millis(),
                "Query executed"
            ),
            Err(e) => tracing::warn!(error = %e, duration_ms = elapsed.as_millis(), "Query failed"),
        }
        result
    }
}

//! Command → query plan translation.
//!
//! Pure and deterministic: the same request always yields the same plan,
//! and building never touches the store.

use crate::command::{CommandCode, CommandRequest};
use crate::identifier::{ActivitySchema, AssetTableRef, ClassId, Identifier};
use crate::query::{NamedQuery, QueryPlan, QuerySpec, DEFAULT_QUERY_TIMEOUT_MS};

/// Slot names of the activity overview merge.
pub const SLOT_ACTIVITY_DETAILS: &str = "activityDetails";
pub const SLOT_PROGRESS_DATA: &str = "progressData";
pub const SLOT_LOCKED_DATA: &str = "lockedData";

/// Column holding the `schema.table` pointer read by the asset lookup.
pub const ASSET_REFERENCE_COLUMN: &str = "asset_table_reference";

/// Column the asset rows are ordered by.
pub const ASSET_ORDER_COLUMN: &str = "order_index";

const TRACKING_SCHEMA: &str = "\"user_tracking\"";
const TOKENS_TABLE: &str = "\"mobile_user\".\"user_tokens\"";
const PROGRESS_COLUMNS: &str =
    "activity_id, slide_num, answer_cnt, activity_complete, total_q_slide, slide_complete, act_complete_bool";
const ACTIVITY_COLUMNS: &str = "activity_id, activity_name, series_num, description, outcome, subject";

/// Builds query plans for gateway commands.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    timeout_ms: u64,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_TIMEOUT_MS)
    }
}

impl QueryBuilder {
    pub fn new(timeout_ms: u64) -> Self {
        Self { timeout_ms }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Choose the strategy for `request` and build the queries known up front.
    pub fn build(&self, request: &CommandRequest) -> QueryPlan {
        let built = match request.command() {
            CommandCode::ActivityOverview => self.activity_overview(request),
            CommandCode::ActivityProgress => self.activity_progress(request),
            CommandCode::AssetLookup => self.asset_lookup(request),
            CommandCode::TokenUsage => self.token_usage(request),
            CommandCode::Unknown(raw) => Err(format!("unsupported command '{}'", raw)),
        };
        built.unwrap_or_else(QueryPlan::unsupported)
    }

    /// Second stage of the asset lookup, built from the reference found by the first.
    pub fn asset_rows(&self, reference: &AssetTableRef) -> QuerySpec {
        self.spec(format!(
            "SELECT * FROM {}.{} ORDER BY \"{}\" ASC",
            reference.schema.quoted(),
            reference.table.quoted(),
            ASSET_ORDER_COLUMN
        ))
        .ordered_by(ASSET_ORDER_COLUMN)
    }

    // ========================================================================
    // STRATEGIES
    // ========================================================================

    fn activity_overview(&self, request: &CommandRequest) -> Result<QueryPlan, String> {
        let schema = ActivitySchema::for_role(request.text("role").as_deref());
        let class = class_id(request)?;
        // One identity names both the tracking table and the lock row.
        let mail = request
            .text_any(&["mail", "user"])
            .ok_or("missing field 'mail'")?;
        let tracking = tracking_table(&mail)?;

        Ok(QueryPlan::ParallelMerge(vec![
            NamedQuery {
                slot: SLOT_ACTIVITY_DETAILS,
                spec: self.spec(format!(
                    "SELECT {} FROM {}.{}",
                    ACTIVITY_COLUMNS,
                    schema.identifier().quoted(),
                    class.activity_table().quoted()
                )),
            },
            NamedQuery {
                slot: SLOT_PROGRESS_DATA,
                spec: self.spec(format!(
                    "SELECT {} FROM {}.{}",
                    PROGRESS_COLUMNS,
                    TRACKING_SCHEMA,
                    tracking.quoted()
                )),
            },
            NamedQuery {
                slot: SLOT_LOCKED_DATA,
                spec: self
                    .spec(format!("SELECT locked FROM {} WHERE email = $1", TOKENS_TABLE))
                    .bind(mail),
            },
        ]))
    }

    fn activity_progress(&self, request: &CommandRequest) -> Result<QueryPlan, String> {
        let actor = request.actor().ok_or("missing field 'user'")?;
        let tracking = tracking_table(actor)?;
        let activity_id = request
            .text_any(&["id", "activity_id"])
            .ok_or("missing field 'id'")?;
        let is_complete = request
            .flag("isComplete")
            .ok_or("field 'isComplete' must be a boolean")?;

        let spec = if is_complete {
            self.spec(format!(
                "UPDATE {}.{} SET activity_complete = $1 WHERE activity_id::text = $2 \
                 RETURNING activity_id, activity_complete",
                TRACKING_SCHEMA,
                tracking.quoted()
            ))
            .bind(true)
            .bind(activity_id)
        } else {
            self.spec(format!(
                "SELECT {} FROM {}.{} WHERE activity_id::text = $1",
                PROGRESS_COLUMNS,
                TRACKING_SCHEMA,
                tracking.quoted()
            ))
            .bind(activity_id)
        };
        Ok(QueryPlan::Single(spec))
    }

    fn asset_lookup(&self, request: &CommandRequest) -> Result<QueryPlan, String> {
        let class = class_id(request)?;
        let activity_id = request
            .text_any(&["id", "activity_id"])
            .ok_or("missing field 'id'")?;

        let lookup = self
            .spec(format!(
                "SELECT {} FROM {}.{} WHERE activity_id::text = $1",
                ASSET_REFERENCE_COLUMN,
                ActivitySchema::MobileUser.identifier().quoted(),
                class.activity_table().quoted()
            ))
            .bind(activity_id);
        Ok(QueryPlan::TwoStage { lookup })
    }

    fn token_usage(&self, request: &CommandRequest) -> Result<QueryPlan, String> {
        let email = request.text("user").ok_or("missing field 'user'")?;
        Ok(QueryPlan::Single(
            self.spec(format!(
                "SELECT p_input_token, p_output_token, p_total FROM {} WHERE email = $1",
                TOKENS_TABLE
            ))
            .bind(email),
        ))
    }

    fn spec(&self, text: String) -> QuerySpec {
        QuerySpec::new(text, self.timeout_ms)
    }
}

fn class_id(request: &CommandRequest) -> Result<ClassId, String> {
    let raw = request.text("class").ok_or("missing field 'class'")?;
    ClassId::parse(&raw).ok_or_else(|| format!("invalid class '{}'", raw))
}

fn tracking_table(actor: &str) -> Result<Identifier, String> {
    Identifier::sanitized(actor).ok_or_else(|| "user cannot name a tracking table".to_string())
}

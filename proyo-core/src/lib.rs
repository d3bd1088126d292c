//! Proyo Core - Command Translation
//!
//! Pure types for the command gateway: command codes, parameterized query
//! specs, query plans and the builder that maps one to the other. Nothing in
//! this crate performs I/O; execution goes through the [`QueryExecutor`]
//! trait.

pub mod builder;
pub mod command;
pub mod error;
pub mod executor;
pub mod identifier;
pub mod query;

pub use builder::{
    QueryBuilder, ASSET_ORDER_COLUMN, ASSET_REFERENCE_COLUMN, SLOT_ACTIVITY_DETAILS, SLOT_LOCKED_DATA,
    SLOT_PROGRESS_DATA,
};
pub use command::{CommandCode, CommandRequest};
pub use error::{GatewayError, QueryError};
pub use executor::QueryExecutor;
pub use identifier::{ActivitySchema, AssetTableRef, ClassId, Identifier};
pub use query::{
    AggregatedResult, DispatchOutcome, NamedQuery, QueryPlan, QueryResult, QuerySpec, Row,
    SqlValue, DEFAULT_QUERY_TIMEOUT_MS,
};

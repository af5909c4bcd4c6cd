//! Question → SQL → rows, with a self-healing execution loop.
//!
//! ```text
//!  question ──► resolve ──► ResolvedIntent ──► synthesize ──► GeneratedQuery
//!                                                                  │
//!           oracle text ──► oracle_sql::{extract_sql, normalize} ──┤
//!                                                                  ▼
//!                           heal::execute_with_repair ◄──── validate::check
//!                                     │
//!                                     ▼
//!                           store::MetricStore::fetch ──► Vec<MetricRow>
//! ```
//!
//! - The resolver only ever returns projects present in the catalog snapshot
//!   it was given.
//! - Nothing reaches a store without passing the validator, including
//!   repaired queries.

pub mod heal;
pub mod oracle_sql;
pub mod resolve;
pub mod store;
pub mod synthesize;
pub mod validate;

pub use heal::{
    execute_with_repair, ExecutionError, ExecutionOutcome, RepairPolicy, RepairRule,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RULES,
};
pub use oracle_sql::{extract_sql, normalize};
pub use resolve::{resolve, MatchKind, ProjectMatch, ResolutionFailure, ResolvedIntent};
pub use store::{MetricStore, SqliteStore, StoreError};
pub use synthesize::{build_query, synthesize, GeneratedQuery, METRIC_TABLE};
pub use validate::{check, validate, Rejection};

//! Resolved intent → one read-only SQL statement.
//!
//! The shape is fixed: three columns, a project filter, a metric filter and a
//! chronological order. Everything that reaches the store through this path is
//! built from catalog ids and enum labels, never from raw user text.

use crate::resolve::ResolvedIntent;
use detective_model::{MetricKind, ProjectId};
use serde::Serialize;

/// Table holding the monthly series.
pub const METRIC_TABLE: &str = "metric_series";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedQuery {
    pub sql: String,
    pub projects: Vec<ProjectId>,
    pub metric: MetricKind,
}

/// Quote a string literal, doubling embedded single quotes.
pub fn quote_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

pub fn synthesize(intent: &ResolvedIntent) -> GeneratedQuery {
    let projects: Vec<ProjectId> = intent.projects.iter().cloned().collect();
    build_query(&projects, intent.metric)
}

/// Build the query for an explicit project list (kept in the given order).
///
/// An empty list yields a valid query that matches no rows.
pub fn build_query(projects: &[ProjectId], metric: MetricKind) -> GeneratedQuery {
    let project_filter = match projects {
        [] => "0 = 1".to_string(),
        [single] => format!("project_id = {}", quote_literal(single.as_str())),
        many => {
            let list: Vec<String> = many.iter().map(|p| quote_literal(p.as_str())).collect();
            format!("project_id IN ({})", list.join(", "))
        }
    };

    let sql = format!(
        "SELECT project_id, time_bucket, value FROM {METRIC_TABLE} \
         WHERE {project_filter} AND metric = {} \
         ORDER BY time_bucket ASC",
        quote_literal(metric.as_str())
    );

    GeneratedQuery {
        sql,
        projects: projects.to_vec(),
        metric,
    }
}

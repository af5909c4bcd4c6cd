//! Validate → execute → repair loop.
//!
//! ```text
//!            ┌──────────────────────────────┐
//!            ▼                              │ patched SQL
//!       [validate] ──reject──▶ ValidationRejected (never retried)
//!            │
//!        [execute] ──ok──▶ rows
//!            │ error
//!      [classify] ──no rule──▶ ExecutionFailure / RepairExhausted
//!            │ rule applies, attempts left
//!         [patch] ───────────────────────────┘
//! ```
//!
//! Exactly one patch is applied per failed attempt and every patch leaves a
//! note in the repair log. Every attempt is logged with its exact SQL.

use crate::store::MetricStore;
use crate::validate;
use detective_model::MetricRow;
use regex::Regex;
use serde::Serialize;

/// Default bound on execution attempts (the first run plus one repair).
pub const DEFAULT_MAX_ATTEMPTS: usize = 2;

/// A known mismatch between a name the query uses and the current schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairRule {
    pub bad: &'static str,
    pub good: &'static str,
}

/// Legacy upstream names mapped onto the `metric_series` schema.
pub const DEFAULT_RULES: &[RepairRule] = &[
    RepairRule { bad: "repo_name", good: "project_id" },
    RepairRule { bad: "month", good: "time_bucket" },
    RepairRule { bad: "metric_type", good: "metric" },
    RepairRule { bad: "metric_value", good: "value" },
    RepairRule { bad: "open_digger_metrics", good: "metric_series" },
];

impl RepairRule {
    fn pattern(&self) -> Option<Regex> {
        Regex::new(&format!(r"(?i)\b{}\b", regex::escape(self.bad))).ok()
    }

    /// The rewritten query, if this rule explains `message` and applies to `sql`.
    pub fn apply(&self, sql: &str, message: &str) -> Option<String> {
        if !message.to_ascii_lowercase().contains(self.bad) {
            return None;
        }
        let pattern = self.pattern()?;
        if !pattern.is_match(sql) {
            return None;
        }
        Some(pattern.replace_all(sql, self.good).into_owned())
    }
}

#[derive(Debug, Clone)]
pub struct RepairPolicy {
    pub max_attempts: usize,
    pub rules: Vec<RepairRule>,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rules: DEFAULT_RULES.to_vec(),
        }
    }
}

impl RepairPolicy {
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// First rule (in order) that explains the failure.
    pub fn find_repair(&self, sql: &str, message: &str) -> Option<(RepairRule, String)> {
        self.rules
            .iter()
            .find_map(|rule| rule.apply(sql, message).map(|patched| (*rule, patched)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionError {
    #[error("query rejected: {reason}")]
    ValidationRejected { reason: String },
    #[error("query failed: {message}")]
    ExecutionFailure { message: String },
    #[error("query still failing after {attempts} attempts: {message}")]
    RepairExhausted { attempts: usize, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub rows: Vec<MetricRow>,
    pub error: Option<ExecutionError>,
    pub repair_log: Vec<String>,
    /// SQL of the last attempt (patched, if a repair was applied).
    pub final_sql: String,
    pub attempts: usize,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Run `sql` against `store`, repairing known schema mismatches.
pub fn execute_with_repair(
    sql: &str,
    store: &dyn MetricStore,
    policy: &RepairPolicy,
) -> ExecutionOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut current = sql.trim().to_string();
    let mut repair_log: Vec<String> = Vec::new();
    let mut attempts = 0;

    loop {
        attempts += 1;
        tracing::info!(attempt = attempts, sql = %current, "executing query");

        if let Err(rejection) = validate::check(&current) {
            tracing::warn!(
                target: "detective::security",
                attempt = attempts,
                reason = %rejection,
                sql = %current,
                "query rejected by validator"
            );
            repair_log.push(format!("attempt {attempts}: rejected ({rejection})"));
            return ExecutionOutcome {
                rows: Vec::new(),
                error: Some(ExecutionError::ValidationRejected {
                    reason: rejection.to_string(),
                }),
                repair_log,
                final_sql: current,
                attempts,
            };
        }

        let err = match store.fetch(&current) {
            Ok(rows) => {
                tracing::info!(attempt = attempts, rows = rows.len(), "query succeeded");
                return ExecutionOutcome {
                    rows,
                    error: None,
                    repair_log,
                    final_sql: current,
                    attempts,
                };
            }
            Err(err) => err,
        };

        let message = err.message();
        tracing::warn!(attempt = attempts, error = %err, "query failed");

        let repair = policy.find_repair(&current, &message);
        let error = match repair {
            Some((rule, patched)) if attempts < max_attempts => {
                repair_log.push(format!(
                    "attempt {attempts}: store does not know `{}`; replaced with `{}`",
                    rule.bad, rule.good
                ));
                current = patched;
                continue;
            }
            Some(_) => ExecutionError::RepairExhausted { attempts, message },
            None if repair_log.is_empty() => ExecutionError::ExecutionFailure { message },
            None => ExecutionError::RepairExhausted { attempts, message },
        };

        repair_log.push(format!("attempt {attempts}: giving up ({error})"));
        return ExecutionOutcome {
            rows: Vec::new(),
            error: Some(error),
            repair_log,
            final_sql: current,
            attempts,
        };
    }
}

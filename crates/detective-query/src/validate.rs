//! Read-only gate in front of the store.
//!
//! Two independent checks, both required:
//! - a keyword blacklist over standalone words (case-insensitive) outside
//!   single-quoted literals, which also catches text the parser would not see
//!   as a statement;
//! - a `sqlparser` parse where every statement must be a pure read.
//!
//! A parse failure is a rejection. Nothing reaches the store without passing
//! this module.

use sqlparser::ast::{Query, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Words that may never appear as standalone tokens in an executed query.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "truncate", "grant", "revoke",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("query is empty")]
    Empty,
    #[error("forbidden keyword `{0}`")]
    ForbiddenKeyword(String),
    #[error("query does not parse: {0}")]
    ParseError(String),
    #[error("statement is not a pure read: {0}")]
    NotReadOnly(String),
}

/// `true` when the query may be executed.
pub fn validate(sql: &str) -> bool {
    check(sql).is_ok()
}

/// Validate and explain why a query was refused.
pub fn check(sql: &str) -> Result<(), Rejection> {
    if sql.trim().is_empty() {
        return Err(Rejection::Empty);
    }

    if let Some(word) = forbidden_keyword(sql) {
        return Err(Rejection::ForbiddenKeyword(word));
    }

    let dialect = GenericDialect {};
    let statements =
        Parser::parse_sql(&dialect, sql).map_err(|e| Rejection::ParseError(e.to_string()))?;
    if statements.is_empty() {
        return Err(Rejection::Empty);
    }

    for stmt in &statements {
        match stmt {
            Statement::Query(query) => check_query(query)?,
            other => {
                return Err(Rejection::NotReadOnly(statement_kind(other)));
            }
        }
    }
    Ok(())
}

fn forbidden_keyword(sql: &str) -> Option<String> {
    blank_string_literals(sql)
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .map(|w| w.to_ascii_lowercase())
        .find(|w| FORBIDDEN_KEYWORDS.contains(&w.as_str()))
}

/// Replace the contents of `'...'` literals (with `''` escapes) by spaces.
/// An unterminated literal blanks the rest of the text; the parser rejects it.
fn blank_string_literals(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_literal = false;
    while let Some(c) = chars.next() {
        if c != '\'' {
            out.push(if in_literal { ' ' } else { c });
            continue;
        }
        if in_literal && chars.peek() == Some(&'\'') {
            chars.next();
            out.push_str("  ");
            continue;
        }
        in_literal = !in_literal;
        out.push(c);
    }
    out
}

fn check_query(query: &Query) -> Result<(), Rejection> {
    if !query.locks.is_empty() {
        return Err(Rejection::NotReadOnly("locking clause".to_string()));
    }
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            check_query(&cte.query)?;
        }
    }
    check_set_expr(&query.body)
}

fn check_set_expr(body: &SetExpr) -> Result<(), Rejection> {
    match body {
        SetExpr::Select(select) => {
            if select.into.is_some() {
                return Err(Rejection::NotReadOnly("SELECT ... INTO".to_string()));
            }
            for table in &select.from {
                check_from(table)?;
            }
            Ok(())
        }
        SetExpr::Query(inner) => check_query(inner),
        SetExpr::SetOperation { left, right, .. } => {
            check_set_expr(left)?;
            check_set_expr(right)
        }
        SetExpr::Values(_) | SetExpr::Table(_) => Ok(()),
        other => Err(Rejection::NotReadOnly(first_word(&other.to_string()))),
    }
}

fn check_from(table: &TableWithJoins) -> Result<(), Rejection> {
    check_factor(&table.relation)?;
    for join in &table.joins {
        check_factor(&join.relation)?;
    }
    Ok(())
}

fn check_factor(factor: &TableFactor) -> Result<(), Rejection> {
    match factor {
        TableFactor::Derived { subquery, .. } => check_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => check_from(table_with_joins),
        _ => Ok(()),
    }
}

/// First word of the statement's SQL rendering, for log messages.
fn statement_kind(stmt: &Statement) -> String {
    first_word(&stmt.to_string())
}

fn first_word(rendered: &str) -> String {
    rendered
        .split_whitespace()
        .next()
        .unwrap_or("statement")
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_compound_reads() {
        assert!(validate(
            "SELECT project_id, time_bucket, value FROM metric_series \
             WHERE project_id = 'vuejs/core' AND metric = 'stars' ORDER BY time_bucket ASC"
        ));
        assert!(validate(
            "WITH recent AS (SELECT * FROM metric_series WHERE time_bucket > '2023-01') \
             SELECT project_id, value FROM recent"
        ));
        assert!(validate(
            "SELECT value FROM metric_series UNION ALL SELECT value FROM metric_series"
        ));
        assert!(validate(
            "SELECT t.value FROM (SELECT value FROM metric_series) AS t"
        ));
    }

    #[test]
    fn rejects_blacklisted_keywords_in_any_case() {
        assert_eq!(
            check("DROP TABLE metric_series"),
            Err(Rejection::ForbiddenKeyword("drop".to_string()))
        );
        assert!(!validate("select 1; DeLeTe from metric_series"));
        assert!(!validate("SELECT * FROM t WHERE x = 1; truncate t"));
    }

    #[test]
    fn keywords_inside_string_literals_are_data() {
        assert!(validate(
            "SELECT project_id, time_bucket, value FROM metric_series \
             WHERE project_id = 'acme/drop-in' AND metric = 'stars'"
        ));
        assert!(validate(
            "SELECT value FROM metric_series WHERE project_id IN ('it''s/delete', 'grant/x')"
        ));
        assert_eq!(
            check("SELECT 'a''b'; DROP TABLE metric_series"),
            Err(Rejection::ForbiddenKeyword("drop".to_string()))
        );
    }

    #[test]
    fn blanking_keeps_quotes_and_layout() {
        assert_eq!(blank_string_literals("a = 'x''y' b"), "a = '    ' b");
        assert_eq!(blank_string_literals("no literals"), "no literals");
    }

    #[test]
    fn keyword_must_stand_alone() {
        // `updated_at` and `dropped` are identifiers, not keywords.
        assert!(validate("SELECT updated_at, dropped FROM metric_series"));
    }

    #[test]
    fn rejects_parse_failures_and_empty_input() {
        assert!(matches!(check("SELEC value FRM"), Err(Rejection::ParseError(_))));
        assert_eq!(check("   "), Err(Rejection::Empty));
        assert_eq!(check(";"), Err(Rejection::Empty));
    }

    #[test]
    fn rejects_non_query_statements() {
        assert!(matches!(
            check("CREATE TABLE x (a INT)"),
            Err(Rejection::NotReadOnly(_))
        ));
        assert!(matches!(
            check("SELECT * INTO backup FROM metric_series"),
            Err(Rejection::NotReadOnly(_))
        ));
    }
}

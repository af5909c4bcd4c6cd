//! Cleanup of SQL proposed by an external text-to-SQL oracle.
//!
//! Oracle output is chatty: status envelopes, markdown fences, trailing
//! prose. [`extract_sql`] digs the statement out; [`normalize`] strips
//! comments and maps loose literals onto stored labels and catalog ids. The
//! result still has to pass the validator like any other query.

use detective_model::{MetricCatalog, MetricKind};
use regex::{Captures, Regex};
use std::str::FromStr;
use std::sync::OnceLock;

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> Option<&'static Regex> {
            static RE: OnceLock<Option<Regex>> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).ok()).as_ref()
        }
    };
}

cached_regex!(status_envelope, r#"(?s)^\s*\{\s*"success"\s*:.*?\}"#);
cached_regex!(fenced_sql, r"(?is)```sql\s*(.*?)\s*```");
cached_regex!(raw_select, r"(?is)\bSELECT\s+.*?(?:LIMIT\s+\d+|;|$)");
cached_regex!(line_comment, r"(?m)--.*$");
cached_regex!(block_comment, r"(?s)/\*.*?\*/");
cached_regex!(string_literal, r"'([^']*)'");

/// Marker some oracles append to the statement.
const TRAILER: &str = "execute-success";

/// Literal spellings the oracle uses for stored metric labels.
const METRIC_ALIASES: &[(&str, MetricKind)] = &[
    ("star", MetricKind::Stars),
    ("issue", MetricKind::IssuesNew),
    ("issues", MetricKind::IssuesNew),
    ("rank", MetricKind::OpenRank),
];

/// Pull one SQL statement out of free-form oracle output.
pub fn extract_sql(text: &str) -> Option<String> {
    let mut text = text.to_string();
    if let Some(re) = status_envelope() {
        while let Some(range) = re.find(&text).map(|m| m.range()) {
            text.replace_range(range, "");
        }
    }

    if let Some(caps) = fenced_sql().and_then(|re| re.captures(&text)) {
        let sql = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        return non_empty(sql);
    }

    if let Some(m) = raw_select().and_then(|re| re.find(&text)) {
        let span = m.as_str();
        let sql = span.split(TRAILER).next().unwrap_or(span);
        return non_empty(sql.trim());
    }

    non_empty(text.trim())
}

fn non_empty(sql: &str) -> Option<String> {
    (!sql.is_empty()).then(|| sql.to_string())
}

/// Strip comments and canonicalize quoted literals.
pub fn normalize(sql: &str, catalog: &MetricCatalog) -> String {
    let mut out = sql.to_string();
    if let Some(re) = line_comment() {
        out = re.replace_all(&out, "").into_owned();
    }
    if let Some(re) = block_comment() {
        out = re.replace_all(&out, "").into_owned();
    }
    if let Some(re) = string_literal() {
        out = re
            .replace_all(&out, |caps: &Captures<'_>| {
                let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                format!("'{}'", canonical_literal(raw, catalog))
            })
            .into_owned();
    }
    out.trim().to_string()
}

fn canonical_literal(raw: &str, catalog: &MetricCatalog) -> String {
    let lowered = raw.trim().to_lowercase();

    if MetricKind::from_str(&lowered).is_ok() {
        return raw.to_string();
    }
    if let Some((_, metric)) = METRIC_ALIASES.iter().find(|(alias, _)| *alias == lowered) {
        return metric.as_str().to_string();
    }
    if let Some(id) = catalog.find_ignore_case(&lowered) {
        return id.as_str().to_string();
    }
    if let Some(id) = catalog
        .projects()
        .iter()
        .find(|p| p.segments().iter().any(|s| *s == lowered))
    {
        return id.as_str().to_string();
    }
    raw.to_string()
}

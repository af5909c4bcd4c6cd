//! Final answer text.
//!
//! Checked in order: unresolved question, failed execution, empty result,
//! then the evidence answer (trend, narrative or fallback report, anomaly
//! clues).

use detective_analytics::{summarize, Anomaly, SeriesSummary};
use detective_model::{MetricKind, MetricRow};
use detective_narrator::sanitize;
use detective_query::{ExecutionError, ResolvedIntent};

pub const UNRESOLVED_TEXT: &str = "I could not identify a target project in this question. \
Mention a tracked repository by name (for example `vuejs/core` or just `vue`).";

pub const NO_EVIDENCE_TEXT: &str =
    "No evidence found: the metrics store holds no matching records for this question.";

pub struct ComposeInput<'a> {
    /// `None` when resolution failed.
    pub intent: Option<&'a ResolvedIntent>,
    pub error: Option<&'a ExecutionError>,
    pub rows: &'a [MetricRow],
    pub anomalies: &'a [Anomaly],
    pub trend: &'a str,
    /// Raw narrator output, sanitized here.
    pub narrative: Option<&'a str>,
}

pub fn failure_text(error: &ExecutionError) -> String {
    format!("The investigation stopped while querying the metrics store: {error}")
}

pub fn compose(input: &ComposeInput<'_>) -> String {
    let Some(intent) = input.intent else {
        return UNRESOLVED_TEXT.to_string();
    };
    if let Some(error) = input.error {
        return failure_text(error);
    }
    if input.rows.is_empty() {
        return NO_EVIDENCE_TEXT.to_string();
    }

    let mut sections = vec![input.trend.trim().to_string()];

    match input.narrative.and_then(sanitize) {
        Some(narrative) => sections.push(narrative),
        None => sections.push(fallback_report(intent.metric, input.rows)),
    }

    if !input.anomalies.is_empty() {
        sections.push(anomaly_clues(input.anomalies));
    }
    sections.join("\n\n")
}

/// Deterministic report from summary statistics, one block per project.
pub fn fallback_report(metric: MetricKind, rows: &[MetricRow]) -> String {
    let mut out = format!("Evidence report ({})", metric.display_name());
    for summary in summarize(rows) {
        out.push('\n');
        out.push_str(&summary_line(&summary));
    }
    out
}

fn summary_line(s: &SeriesSummary) -> String {
    let change = match s.percent_change {
        Some(pct) => format!("{pct:+.1}%"),
        None => "n/a (starts at zero)".to_string(),
    };
    format!(
        "- {}: {} months ({} to {}); start {:.2}, end {:.2}, min {:.2}, max {:.2}, mean {:.2}; \
         peak in {}; change {}",
        s.project_id,
        s.count,
        s.start_bucket,
        s.end_bucket,
        s.start,
        s.end,
        s.min,
        s.max,
        s.mean,
        s.peak_bucket,
        change
    )
}

pub fn anomaly_clues(anomalies: &[Anomaly]) -> String {
    let mut out = String::from("Anomaly clues:");
    for anomaly in anomalies {
        out.push_str("\n- ");
        out.push_str(&anomaly.to_string());
    }
    out
}

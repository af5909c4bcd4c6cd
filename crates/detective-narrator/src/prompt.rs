//! Prompt construction for the chat-style oracles.

use crate::oracle::{ChatMessage, NarrationRequest, SqlRequest};
use detective_model::MetricKind;

const SCHEMA: &str = "Table: metric_series
Columns:
- project_id (TEXT): full repository name, e.g. 'vuejs/core'
- metric (TEXT): one of the metric labels listed below
- time_bucket (TEXT): month in 'YYYY-MM' form
- value (REAL): the measured value";

const NARRATOR_SYSTEM: &str = "You are an analyst of open-source project health metrics. \
Write a short plain-text Markdown report grounded ONLY in the data you are given. \
Never output JSON, chart configurations or code blocks.";

/// Messages for a narration request: system, history, then the question with its data.
pub fn narration_messages(request: &NarrationRequest) -> Vec<ChatMessage> {
    let data = serde_json::to_string(&request.sample).unwrap_or_else(|_| "[]".to_string());
    let mut messages = vec![ChatMessage::system(NARRATOR_SYSTEM)];
    messages.extend(request.history.iter().cloned());
    messages.push(ChatMessage::user(format!(
        "Question: \"{}\"\nData sample: {data}",
        request.question
    )));
    messages
}

/// Messages for a text-to-SQL request.
pub fn sql_messages(request: &SqlRequest) -> Vec<ChatMessage> {
    let metrics: Vec<&str> = MetricKind::ALL.iter().map(|m| m.as_str()).collect();
    let catalog: Vec<&str> = request.catalog.iter().map(|p| p.as_str()).collect();
    let matched: Vec<&str> = request.projects.iter().map(|p| p.as_str()).collect();

    let system = format!(
        "You translate questions about open-source project metrics into one SQLite SELECT statement.

{SCHEMA}

Metric labels: {metrics}
Supported repositories: {catalog}

Rules:
1. Output ONLY the SQL statement, without explanations.
2. Always SELECT project_id, time_bucket, value.
3. Filter by metric and by project_id; use project_id IN (...) to compare several repositories.
4. ORDER BY time_bucket ASC.
5. Use the full repository names from the supported list.",
        metrics = metrics.join(", "),
        catalog = catalog.join(", "),
    );

    let mut messages = vec![ChatMessage::system(system)];
    messages.extend(request.history.iter().cloned());
    messages.push(ChatMessage::user(format!(
        "Question: {}\nLikely repositories: {}\nLikely metric: {}",
        request.question,
        matched.join(", "),
        request.metric
    )));
    messages
}

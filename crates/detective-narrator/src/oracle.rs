//! Oracle contracts.
//!
//! An oracle is an unreliable text-in/text-out collaborator. Callers must
//! treat every error (and every suspicious answer) as "fall back to the
//! deterministic path".

use detective_model::{MetricKind, MetricRow, ProjectId};
use serde::{Deserialize, Serialize};

/// Rows sent to a narrator.
pub const MAX_SAMPLE_ROWS: usize = 15;

/// Conversation turns sent to an oracle.
pub const MAX_HISTORY_TURNS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("oracle is disabled")]
    Disabled,
    #[error("network error: {0}")]
    Network(String),
    #[error("oracle timed out")]
    Timeout,
    #[error("API error: {0}")]
    Api(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Last `MAX_HISTORY_TURNS` turns, oldest first.
pub fn recent_history(history: &[ChatMessage]) -> Vec<ChatMessage> {
    let skip = history.len().saturating_sub(MAX_HISTORY_TURNS);
    history[skip..].to_vec()
}

/// Input for a narrative over query results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrationRequest {
    pub question: String,
    /// At most [`MAX_SAMPLE_ROWS`] rows.
    pub sample: Vec<MetricRow>,
    /// At most [`MAX_HISTORY_TURNS`] turns.
    pub history: Vec<ChatMessage>,
}

impl NarrationRequest {
    pub fn new(question: &str, rows: &[MetricRow], history: &[ChatMessage]) -> Self {
        Self {
            question: question.to_string(),
            sample: rows.iter().take(MAX_SAMPLE_ROWS).cloned().collect(),
            history: recent_history(history),
        }
    }
}

/// Input for text-to-SQL generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlRequest {
    pub question: String,
    /// Every id the store knows about.
    pub catalog: Vec<ProjectId>,
    /// Projects the resolver already matched.
    pub projects: Vec<ProjectId>,
    pub metric: MetricKind,
    pub history: Vec<ChatMessage>,
}

impl SqlRequest {
    pub fn new(
        question: &str,
        catalog: &[ProjectId],
        projects: Vec<ProjectId>,
        metric: MetricKind,
        history: &[ChatMessage],
    ) -> Self {
        Self {
            question: question.to_string(),
            catalog: catalog.to_vec(),
            projects,
            metric,
            history: recent_history(history),
        }
    }
}

/// Writes prose about a result set.
pub trait Narrator: Send + Sync {
    fn narrate(&self, request: &NarrationRequest) -> Result<String, OracleError>;
}

/// Proposes SQL for a question.
pub trait QueryOracle: Send + Sync {
    fn generate_sql(&self, request: &SqlRequest) -> Result<String, OracleError>;
}

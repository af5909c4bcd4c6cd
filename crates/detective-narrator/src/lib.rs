//! External text oracles for Open Detective.
//!
//! Two roles, one contract: text in, text out, may fail at any time.
//!
//! - [`Narrator`] writes prose about a (sampled) result set.
//! - [`QueryOracle`] proposes SQL for a question.
//!
//! [`ChatOracle`] talks to Ollama or an OpenAI-compatible server over blocking
//! HTTP with an explicit timeout; [`MockOracle`] replays canned answers.
//! Whatever a narrator returns goes through [`sanitize`] before a user sees it.

pub mod chat;
pub mod mock;
pub mod oracle;
pub mod prompt;
pub mod sanitize;

pub use chat::{ChatBackend, ChatOracle, ChatSettings};
pub use mock::MockOracle;
pub use oracle::{
    recent_history, ChatMessage, ChatRole, NarrationRequest, Narrator, OracleError, QueryOracle,
    SqlRequest, MAX_HISTORY_TURNS, MAX_SAMPLE_ROWS,
};
pub use sanitize::{sanitize, sanitize_with, NarrativeFilter, STANDARD};

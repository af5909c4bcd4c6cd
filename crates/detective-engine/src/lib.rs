//! Request orchestration for Open Detective.
//!
//! [`Detective`] ties the pieces together: catalog refresh, intent
//! resolution, SQL from the cache, an oracle or the synthesizer, the
//! self-healing execution loop, analytics, optional narration and the
//! answer composer. [`EngineConfig`] carries the knobs.

pub mod cache;
pub mod compose;
pub mod config;
pub mod pipeline;

pub use cache::{cache_key, QueryCache, DEFAULT_CACHE_CAPACITY};
pub use compose::{
    anomaly_clues, compose, failure_text, fallback_report, ComposeInput, NO_EVIDENCE_TEXT,
    UNRESOLVED_TEXT,
};
pub use config::{ConfigError, EngineConfig, OracleBackend, OracleConfig};
pub use pipeline::{Answer, AnswerStatus, Detective, EngineError, QuerySource};

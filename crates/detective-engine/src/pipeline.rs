//! One question in, one answer out.
//!
//! ```text
//! question ─▶ [resolve] ─▶ [cache | oracle SQL | synthesizer]
//!                  │                    │
//!              unresolved        [validate/execute/repair]
//!                  │                    │
//!                  │     [anomalies · forecast · trend] ─▶ [narrator]
//!                  ▼                    ▼
//!              [compose] ◀──────────────┘
//! ```
//!
//! Every request runs inside an `ask` span tagged with a fresh request id.
//! An unreachable oracle never fails the request: SQL falls back to the
//! synthesizer and prose falls back to the deterministic report. SQL the
//! validator rejects is different: the request stops with that rejection.

use crate::cache::{cache_key, QueryCache, DEFAULT_CACHE_CAPACITY};
use crate::compose::{compose, ComposeInput};
use crate::config::{ConfigError, EngineConfig};
use chrono::{DateTime, Utc};
use detective_analytics::{
    detect_anomalies, forecast, trend_narrative, Anomaly, DEFAULT_HORIZON, DEFAULT_THRESHOLD,
};
use detective_model::{CatalogHandle, MetricCatalog, MetricRow};
use detective_narrator::{
    ChatMessage, ChatOracle, NarrationRequest, Narrator, OracleError, QueryOracle, SqlRequest,
};
use detective_query::{
    execute_with_repair, extract_sql, normalize, resolve, synthesize, ExecutionError,
    ExecutionOutcome, MetricStore, RepairPolicy, ResolvedIntent, SqliteStore, StoreError,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, info_span, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to open metrics store: {0}")]
    Store(#[from] StoreError),
    #[error("failed to set up oracle: {0}")]
    Oracle(#[from] OracleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Answered,
    Unresolved,
    NoEvidence,
    Failed,
}

/// Where the executed SQL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuerySource {
    Cache,
    Oracle,
    Synthesizer,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub request_id: Uuid,
    pub answered_at: DateTime<Utc>,
    pub status: AnswerStatus,
    pub text: String,
    /// SQL of the last executed attempt.
    pub sql: Option<String>,
    pub query_source: Option<QuerySource>,
    pub intent: Option<ResolvedIntent>,
    pub rows: Vec<MetricRow>,
    pub forecast: Vec<MetricRow>,
    pub anomalies: Vec<Anomaly>,
    pub repair_log: Vec<String>,
    pub attempts: usize,
    pub error: Option<ExecutionError>,
}

impl Answer {
    fn unresolved(request_id: Uuid, text: String) -> Self {
        Self {
            request_id,
            answered_at: Utc::now(),
            status: AnswerStatus::Unresolved,
            text,
            sql: None,
            query_source: None,
            intent: None,
            rows: Vec::new(),
            forecast: Vec::new(),
            anomalies: Vec::new(),
            repair_log: Vec::new(),
            attempts: 0,
            error: None,
        }
    }
}

pub struct Detective {
    catalog: Arc<CatalogHandle>,
    store: Arc<dyn MetricStore>,
    narrator: Option<Arc<dyn Narrator>>,
    query_oracle: Option<Arc<dyn QueryOracle>>,
    cache: QueryCache,
    policy: RepairPolicy,
    anomaly_threshold: f64,
    forecast_horizon: usize,
}

impl Detective {
    pub fn new(catalog: Arc<CatalogHandle>, store: Arc<dyn MetricStore>) -> Self {
        Self {
            catalog,
            store,
            narrator: None,
            query_oracle: None,
            cache: QueryCache::new(DEFAULT_CACHE_CAPACITY),
            policy: RepairPolicy::default(),
            anomaly_threshold: DEFAULT_THRESHOLD,
            forecast_horizon: DEFAULT_HORIZON,
        }
    }

    /// Convenience for a fixed catalog.
    pub fn with_catalog(catalog: MetricCatalog, store: Arc<dyn MetricStore>) -> Self {
        Self::new(Arc::new(CatalogHandle::fixed(catalog)), store)
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn Narrator>) -> Self {
        self.narrator = Some(narrator);
        self
    }

    pub fn with_query_oracle(mut self, oracle: Arc<dyn QueryOracle>) -> Self {
        self.query_oracle = Some(oracle);
        self
    }

    /// Apply the numeric knobs of `config` (not the catalog, store or oracle).
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.cache = QueryCache::new(config.cache_capacity);
        self.policy = RepairPolicy::default().with_max_attempts(config.max_attempts);
        self.anomaly_threshold = config.anomaly_threshold;
        self.forecast_horizon = config.forecast_horizon;
        self
    }

    /// Wire everything from configuration: file-backed catalog, read-only
    /// SQLite store and, when enabled, a chat oracle.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let catalog = Arc::new(CatalogHandle::from_file(&config.catalog_path));
        let store = SqliteStore::open_read_only(&config.database_path)?
            .with_timeout(config.store_timeout());
        let mut detective = Self::new(catalog, Arc::new(store)).with_config(config);

        if let Some(settings) = config.oracle.chat_settings() {
            let oracle = Arc::new(ChatOracle::new(settings)?);
            info!(oracle = %oracle.describe(), sql = config.oracle.generate_sql, "oracle enabled");
            if config.oracle.generate_sql {
                detective = detective.with_query_oracle(oracle.clone());
            }
            detective = detective.with_narrator(oracle);
        }
        Ok(detective)
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    /// Answer `question` given the prior conversation.
    pub fn answer(&self, question: &str, history: &[ChatMessage]) -> Answer {
        let request_id = Uuid::new_v4();
        let span = info_span!("ask", request_id = %request_id);
        let _enter = span.enter();

        self.catalog.refresh();
        let catalog = self.catalog.snapshot();
        info!(question, catalog_version = catalog.version(), "question received");

        let intent = match resolve(question, &catalog) {
            Ok(intent) => intent,
            Err(failure) => {
                info!(reason = %failure, "question not resolved");
                let text = compose(&ComposeInput {
                    intent: None,
                    error: None,
                    rows: &[],
                    anomalies: &[],
                    trend: "",
                    narrative: None,
                });
                return Answer::unresolved(request_id, text);
            }
        };
        info!(
            projects = ?intent.projects,
            metric = intent.metric.as_str(),
            "question resolved"
        );

        let key = cache_key(question, history.len());
        let (source, sql) = match self.cache.get(&key) {
            Some(sql) => {
                info!("query cache hit");
                (QuerySource::Cache, sql)
            }
            None => match self.oracle_sql(question, &catalog, &intent, history) {
                Some(sql) => (QuerySource::Oracle, sql),
                None => (QuerySource::Synthesizer, synthesize(&intent).sql),
            },
        };

        let (source, outcome) = self.execute(source, &sql, &intent);
        if outcome.is_success() && !outcome.rows.is_empty() {
            self.cache.insert(key, outcome.final_sql.clone());
        }

        let rows = &outcome.rows;
        let anomalies = detect_anomalies(rows, self.anomaly_threshold);
        let projected = forecast(rows, self.forecast_horizon);
        let trend = trend_narrative(rows);
        let narrative = if outcome.is_success() && !rows.is_empty() {
            self.narrate(question, rows, history)
        } else {
            None
        };

        let text = compose(&ComposeInput {
            intent: Some(&intent),
            error: outcome.error.as_ref(),
            rows,
            anomalies: &anomalies,
            trend: &trend,
            narrative: narrative.as_deref(),
        });

        let status = match (&outcome.error, rows.is_empty()) {
            (Some(_), _) => AnswerStatus::Failed,
            (None, true) => AnswerStatus::NoEvidence,
            (None, false) => AnswerStatus::Answered,
        };
        info!(?status, rows = rows.len(), attempts = outcome.attempts, "answer composed");

        Answer {
            request_id,
            answered_at: Utc::now(),
            status,
            text,
            sql: Some(outcome.final_sql),
            query_source: Some(source),
            intent: Some(intent),
            rows: outcome.rows,
            forecast: projected,
            anomalies,
            repair_log: outcome.repair_log,
            attempts: outcome.attempts,
            error: outcome.error,
        }
    }

    fn oracle_sql(
        &self,
        question: &str,
        catalog: &MetricCatalog,
        intent: &ResolvedIntent,
        history: &[ChatMessage],
    ) -> Option<String> {
        let oracle = self.query_oracle.as_ref()?;
        let request = SqlRequest::new(
            question,
            catalog.projects(),
            intent.projects.iter().cloned().collect(),
            intent.metric,
            history,
        );
        match oracle.generate_sql(&request) {
            Ok(raw) => {
                let sql = extract_sql(&raw).map(|sql| normalize(&sql, catalog));
                if sql.is_none() {
                    warn!("oracle reply contained no SQL");
                }
                sql
            }
            Err(error) => {
                warn!(error = %error, "oracle SQL generation failed");
                None
            }
        }
    }

    /// Run `sql`. If SQL from the cache or the oracle fails in the store,
    /// retry once with the synthesized query; logs and attempt counts
    /// accumulate. A validator rejection is final.
    fn execute(
        &self,
        source: QuerySource,
        sql: &str,
        intent: &ResolvedIntent,
    ) -> (QuerySource, ExecutionOutcome) {
        let first = execute_with_repair(sql, self.store.as_ref(), &self.policy);
        let store_failure = matches!(
            first.error,
            Some(ExecutionError::ExecutionFailure { .. } | ExecutionError::RepairExhausted { .. })
        );
        if !store_failure || source == QuerySource::Synthesizer {
            return (source, first);
        }

        let fallback = synthesize(intent).sql;
        warn!(?source, "query failed; falling back to synthesized SQL");
        let mut second = execute_with_repair(&fallback, self.store.as_ref(), &self.policy);

        let mut repair_log = first.repair_log;
        repair_log.push(format!(
            "{} query abandoned; switched to synthesized query",
            match source {
                QuerySource::Cache => "cached",
                _ => "oracle",
            }
        ));
        repair_log.append(&mut second.repair_log);
        second.repair_log = repair_log;
        second.attempts += first.attempts;
        (QuerySource::Synthesizer, second)
    }

    fn narrate(&self, question: &str, rows: &[MetricRow], history: &[ChatMessage]) -> Option<String> {
        let narrator = self.narrator.as_ref()?;
        let request = NarrationRequest::new(question, rows, history);
        match narrator.narrate(&request) {
            Ok(text) => Some(text),
            Err(error) => {
                warn!(error = %error, "narrator failed; using fallback report");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use detective_model::MetricKind;
    use detective_narrator::MockOracle;
    use parking_lot::Mutex;

    /// Records the SQL it sees and serves fixed rows or a fixed error.
    struct FixedStore {
        result: Result<Vec<MetricRow>, StoreError>,
        seen: Mutex<Vec<String>>,
    }

    impl FixedStore {
        fn rows(rows: Vec<MetricRow>) -> Arc<Self> {
            Arc::new(Self { result: Ok(rows), seen: Mutex::new(Vec::new()) })
        }
    }

    impl MetricStore for FixedStore {
        fn fetch(&self, sql: &str) -> Result<Vec<MetricRow>, StoreError> {
            self.seen.lock().push(sql.to_string());
            self.result.clone()
        }
    }

    fn vue_rows() -> Vec<MetricRow> {
        ["2023-01", "2023-02", "2023-03", "2023-04"]
            .iter()
            .zip([100.0, 110.0, 300.0, 320.0])
            .map(|(bucket, value)| MetricRow::actual("vuejs/core", bucket, value))
            .collect()
    }

    fn detective(store: Arc<FixedStore>) -> Detective {
        Detective::with_catalog(MetricCatalog::new(["vuejs/core", "facebook/react"]), store)
    }

    #[test]
    fn answers_from_synthesized_query() {
        let store = FixedStore::rows(vue_rows());
        let answer = detective(store.clone()).answer("How are vue stars doing?", &[]);

        assert_eq!(answer.status, AnswerStatus::Answered);
        assert_eq!(answer.query_source, Some(QuerySource::Synthesizer));
        assert_eq!(answer.attempts, 1);
        assert_eq!(answer.forecast.len(), 3);
        assert!(answer.forecast.iter().all(|r| r.is_forecast));
        assert_eq!(answer.anomalies.len(), 1);
        assert!(answer.text.contains("Evidence report (star count)"));
        assert!(store.seen.lock()[0].contains("project_id = 'vuejs/core'"));
        assert_eq!(
            answer.intent.map(|i| i.metric),
            Some(MetricKind::Stars)
        );
    }

    #[test]
    fn unresolved_question_skips_the_store() {
        let store = FixedStore::rows(vue_rows());
        let answer = detective(store.clone()).answer("what is the weather", &[]);
        assert_eq!(answer.status, AnswerStatus::Unresolved);
        assert!(answer.sql.is_none());
        assert!(store.seen.lock().is_empty());
    }

    #[test]
    fn second_identical_question_hits_cache() {
        let store = FixedStore::rows(vue_rows());
        let detective = detective(store);
        let first = detective.answer("vue stars", &[]);
        let second = detective.answer("  VUE   stars ", &[]);
        assert_eq!(first.query_source, Some(QuerySource::Synthesizer));
        assert_eq!(second.query_source, Some(QuerySource::Cache));
        assert_eq!(first.sql, second.sql);
        assert_ne!(first.request_id, second.request_id);
    }

    #[test]
    fn empty_results_are_not_cached() {
        let store = FixedStore::rows(Vec::new());
        let detective = detective(store);
        let answer = detective.answer("vue stars", &[]);
        assert_eq!(answer.status, AnswerStatus::NoEvidence);
        assert!(detective.cache().is_empty());
    }

    #[test]
    fn rejected_oracle_sql_fails_the_request() {
        let store = FixedStore::rows(vue_rows());
        let oracle = Arc::new(MockOracle::always("DROP TABLE metric_series"));
        let detective = detective(store.clone()).with_query_oracle(oracle.clone());

        let answer = detective.answer("vue stars", &[]);
        assert_eq!(oracle.calls(), 1);
        assert_eq!(answer.status, AnswerStatus::Failed);
        assert_eq!(answer.query_source, Some(QuerySource::Oracle));
        assert_eq!(answer.attempts, 1);
        assert!(matches!(
            answer.error,
            Some(ExecutionError::ValidationRejected { .. })
        ));
        assert!(answer.text.contains("forbidden keyword `drop`"));
        assert!(answer.rows.is_empty());
        assert!(store.seen.lock().is_empty());
        assert!(detective.cache().is_empty());
    }

    /// Fails any query that mentions `legacy_table`, serves rows otherwise.
    struct LegacyAwareStore {
        seen: Mutex<Vec<String>>,
    }

    impl MetricStore for LegacyAwareStore {
        fn fetch(&self, sql: &str) -> Result<Vec<MetricRow>, StoreError> {
            self.seen.lock().push(sql.to_string());
            if sql.contains("legacy_table") {
                return Err(StoreError::from_message("no such table: legacy_table"));
            }
            Ok(vue_rows())
        }
    }

    #[test]
    fn oracle_sql_failing_in_store_falls_back_to_synthesizer() {
        let store = Arc::new(LegacyAwareStore { seen: Mutex::new(Vec::new()) });
        let oracle = Arc::new(MockOracle::always(
            "SELECT project_id, time_bucket, value FROM legacy_table",
        ));
        let detective = Detective::with_catalog(MetricCatalog::new(["vuejs/core"]), store.clone())
            .with_query_oracle(oracle);

        let answer = detective.answer("vue stars", &[]);
        assert_eq!(answer.status, AnswerStatus::Answered);
        assert_eq!(answer.query_source, Some(QuerySource::Synthesizer));
        assert_eq!(answer.attempts, 2);
        assert!(answer
            .repair_log
            .iter()
            .any(|l| l.contains("oracle query abandoned")));
        assert_eq!(store.seen.lock().len(), 2);
    }

    #[test]
    fn narrator_error_uses_fallback_report() {
        let store = FixedStore::rows(vue_rows());
        let narrator = Arc::new(MockOracle::failing(OracleError::Timeout));
        let answer = detective(store)
            .with_narrator(narrator.clone())
            .answer("vue stars", &[]);
        assert_eq!(narrator.calls(), 1);
        assert!(answer.text.contains("Evidence report"));
    }

    #[test]
    fn store_failure_is_reported() {
        let store = Arc::new(FixedStore {
            result: Err(StoreError::Backend("disk I/O error".into())),
            seen: Mutex::new(Vec::new()),
        });
        let answer = detective(store).answer("vue stars", &[]);
        assert_eq!(answer.status, AnswerStatus::Failed);
        assert!(answer.text.contains("disk I/O error"));
        assert!(matches!(
            answer.error,
            Some(ExecutionError::ExecutionFailure { .. })
        ));
    }
}

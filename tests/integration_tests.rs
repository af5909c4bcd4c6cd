//! End-to-end tests for the Open Detective pipeline
//!
//! These tests drive `Detective::answer` across crates:
//! - resolve → synthesize → SQLite → analytics → compose
//! - oracle SQL → normalize → self-healing execution
//! - narration → sanitizer → fallback report
//!
//! Run with: cargo test --test integration_tests

use detective_engine::{
    AnswerStatus, Detective, EngineConfig, QuerySource, NO_EVIDENCE_TEXT, UNRESOLVED_TEXT,
};
use detective_model::{CatalogHandle, MetricCatalog, MetricKind, ProjectId};
use detective_narrator::{ChatMessage, MockOracle};
use detective_query::{ExecutionError, SqliteStore};
use std::sync::Arc;
use tempfile::tempdir;

const PROJECTS: [&str; 3] = ["vuejs/core", "facebook/react", "nodejs/node"];

fn seeded_store() -> SqliteStore {
    let store = SqliteStore::in_memory().unwrap();
    store.create_schema().unwrap();
    store
        .insert_series(
            &ProjectId::new("vuejs/core"),
            MetricKind::Stars,
            &[
                ("2023-01", 100.0),
                ("2023-02", 105.0),
                ("2023-03", 260.0),
                ("2023-04", 270.0),
            ],
        )
        .unwrap();
    store
        .insert_series(
            &ProjectId::new("facebook/react"),
            MetricKind::Stars,
            &[
                ("2023-01", 400.0),
                ("2023-02", 410.0),
                ("2023-03", 405.0),
                ("2023-04", 150.0),
            ],
        )
        .unwrap();
    store
}

fn detective() -> Detective {
    Detective::with_catalog(MetricCatalog::new(PROJECTS), Arc::new(seeded_store()))
}

// ============================================================================
// Deterministic path
// ============================================================================

#[test]
fn test_compare_two_projects_end_to_end() {
    let answer = detective().answer("Compare vue and react stars", &[]);

    assert_eq!(answer.status, AnswerStatus::Answered);
    assert_eq!(answer.query_source, Some(QuerySource::Synthesizer));
    assert_eq!(answer.rows.len(), 8);
    assert_eq!(answer.forecast.len(), 6);

    let sql = answer.sql.as_deref().unwrap();
    assert!(sql.contains("project_id IN ('facebook/react', 'vuejs/core')"));

    // One spike for vue, one drop for react.
    assert_eq!(answer.anomalies.len(), 2);
    assert!(answer.text.contains("vuejs/core: The series shows strong growth"));
    assert!(answer.text.contains("facebook/react: The series shows a severe decline"));
    assert!(answer.text.contains("Anomaly clues:"));
    assert!(answer.text.contains("2023-03 | vuejs/core | SPIKE"));
    assert!(answer.text.contains("2023-04 | facebook/react | DROP"));
}

#[test]
fn test_unresolved_question() {
    let answer = detective().answer("how is the weather in Paris", &[]);
    assert_eq!(answer.status, AnswerStatus::Unresolved);
    assert_eq!(answer.text, UNRESOLVED_TEXT);
    assert!(answer.rows.is_empty());
}

#[test]
fn test_known_project_without_data_reports_no_evidence() {
    let answer = detective().answer("node stars", &[]);
    assert_eq!(answer.status, AnswerStatus::NoEvidence);
    assert_eq!(answer.text, NO_EVIDENCE_TEXT);
    assert!(answer.forecast.is_empty());
}

#[test]
fn test_cache_reuses_successful_sql() {
    let detective = detective();
    let first = detective.answer("vue stars", &[]);
    let second = detective.answer("Vue  Stars", &[]);
    assert_eq!(second.query_source, Some(QuerySource::Cache));
    assert_eq!(first.sql, second.sql);
    assert_eq!(first.rows, second.rows);

    // Different history length, different cache slot.
    let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
    let third = detective.answer("vue stars", &history);
    assert_eq!(third.query_source, Some(QuerySource::Synthesizer));
}

#[test]
fn test_keyword_inside_project_id_is_not_rejected() {
    let store = SqliteStore::in_memory().unwrap();
    store.create_schema().unwrap();
    store
        .insert_series(
            &ProjectId::new("acme/drop-in"),
            MetricKind::Stars,
            &[("2023-01", 10.0), ("2023-02", 11.0)],
        )
        .unwrap();
    let detective = Detective::with_catalog(MetricCatalog::new(["acme/drop-in"]), Arc::new(store));

    let answer = detective.answer("acme/drop-in的星标", &[]);
    assert_eq!(answer.status, AnswerStatus::Answered);
    assert_eq!(answer.rows.len(), 2);
    assert!(answer.sql.unwrap().contains("project_id = 'acme/drop-in'"));
}

#[test]
fn test_catalog_swap_is_picked_up() {
    let handle = Arc::new(CatalogHandle::fixed(MetricCatalog::new(["vuejs/core"])));
    let detective = Detective::new(handle.clone(), Arc::new(seeded_store()));

    assert_eq!(
        detective.answer("react stars", &[]).status,
        AnswerStatus::Unresolved
    );
    handle.swap(MetricCatalog::new(["vuejs/core", "facebook/react"]));
    assert_eq!(
        detective.answer("react stars", &[]).status,
        AnswerStatus::Answered
    );
}

// ============================================================================
// Oracle paths
// ============================================================================

#[test]
fn test_legacy_oracle_sql_is_repaired() {
    let oracle = Arc::new(MockOracle::always(
        "{\"success\": true}\n```sql\n\
         SELECT repo_name AS project_id, time_bucket, value FROM metric_series \
         WHERE repo_name = 'VueJS/Core' AND metric = 'star' -- stars only\n```",
    ));
    let answer = detective()
        .with_query_oracle(oracle.clone())
        .answer("vue stars", &[]);

    assert_eq!(oracle.calls(), 1);
    assert_eq!(answer.status, AnswerStatus::Answered);
    assert_eq!(answer.query_source, Some(QuerySource::Oracle));
    assert_eq!(answer.attempts, 2);
    assert_eq!(answer.repair_log.len(), 1);
    assert!(answer.repair_log[0].contains("repo_name"));
    assert_eq!(answer.rows.len(), 4);
    assert!(answer
        .sql
        .as_deref()
        .unwrap()
        .contains("project_id = 'vuejs/core'"));
}

#[test]
fn test_malicious_oracle_sql_is_rejected_and_never_runs() {
    let store = Arc::new(seeded_store());
    let oracle = Arc::new(MockOracle::always(
        "```sql\nSELECT value FROM metric_series; DROP TABLE metric_series;\n```",
    ));
    let detective = Detective::with_catalog(MetricCatalog::new(PROJECTS), store.clone())
        .with_query_oracle(oracle);

    let answer = detective.answer("vue stars", &[]);
    assert_eq!(answer.status, AnswerStatus::Failed);
    assert_eq!(answer.query_source, Some(QuerySource::Oracle));
    assert!(matches!(
        answer.error,
        Some(ExecutionError::ValidationRejected { .. })
    ));
    assert!(answer.text.contains("forbidden keyword `drop`"));
    assert!(answer.rows.is_empty());

    // Table still intact.
    let plain = Detective::with_catalog(MetricCatalog::new(PROJECTS), store);
    let again = plain.answer("react stars", &[]);
    assert_eq!(again.rows.len(), 4);
}

#[test]
fn test_chart_narrative_is_replaced_by_report() {
    let narrator = Arc::new(MockOracle::always(
        r#"{"type": "bar", "xAxis": ["2023-01"], "series": [{"data": [1]}]}"#,
    ));
    let answer = detective()
        .with_narrator(narrator.clone())
        .answer("vue stars", &[]);

    assert_eq!(narrator.calls(), 1);
    assert!(answer.text.contains("Evidence report (star count)"));
    assert!(answer.text.contains("- vuejs/core: 4 months (2023-01 to 2023-04)"));
    assert!(!answer.text.contains("xAxis"));
}

#[test]
fn test_clean_narrative_is_used() {
    let narrator = Arc::new(MockOracle::always(
        "Vue gained most of its stars in March 2023.",
    ));
    let answer = detective().with_narrator(narrator).answer("vue stars", &[]);
    assert!(answer.text.contains("Vue gained most of its stars in March 2023."));
    assert!(!answer.text.contains("Evidence report"));
}

// ============================================================================
// Configuration wiring
// ============================================================================

#[test]
fn test_from_config_with_files_on_disk() {
    let dir = tempdir().unwrap();
    let catalog_path = dir.path().join("repos.json");
    let db_path = dir.path().join("metrics.sqlite");
    std::fs::write(&catalog_path, r#"["vuejs/core", "facebook/react"]"#).unwrap();

    {
        let store = SqliteStore::open(&db_path).unwrap();
        store.create_schema().unwrap();
        store
            .insert_series(
                &ProjectId::new("vuejs/core"),
                MetricKind::Activity,
                &[("2023-01", 10.0), ("2023-02", 12.0)],
            )
            .unwrap();
    }

    let config = EngineConfig {
        catalog_path,
        database_path: db_path,
        ..EngineConfig::default()
    };
    let detective = Detective::from_config(&config).unwrap();
    let answer = detective.answer("vue activity", &[]);

    assert_eq!(answer.status, AnswerStatus::Answered);
    assert_eq!(answer.rows.len(), 2);
    assert_eq!(answer.intent.as_ref().map(|i| i.metric), Some(MetricKind::Activity));

    let json = serde_json::to_value(&answer).unwrap();
    assert_eq!(json["status"], "answered");
    assert_eq!(json["query_source"], "synthesizer");
}

#[test]
fn test_missing_table_is_a_failure_not_a_panic() {
    let store = SqliteStore::in_memory().unwrap();
    let detective = Detective::with_catalog(MetricCatalog::new(PROJECTS), Arc::new(store));
    let answer = detective.answer("vue stars", &[]);
    assert_eq!(answer.status, AnswerStatus::Failed);
    assert!(matches!(
        answer.error,
        Some(ExecutionError::ExecutionFailure { .. })
    ));
}

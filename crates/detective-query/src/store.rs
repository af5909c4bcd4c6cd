//! Relational read interface and its SQLite implementation.
//!
//! Result sets are normalized here, once: whatever column names the query
//! produced, callers only ever see [`MetricRow`]s. Accepted column names:
//!
//! | field | columns (first present wins) |
//! |---|---|
//! | project | `project_id`, `repo_name` (absent → `"unknown"`) |
//! | bucket | `time_bucket`, `month` |
//! | value | `value`, `metric_value` (NULL rows skipped) |
//!
//! Stores opened with [`SqliteStore::open_read_only`] give every fetch its own
//! connection, so concurrent requests do not wait on each other. Writable and
//! in-memory stores share one connection and serialize their fetches.

use detective_model::{MetricKind, MetricRow, ProjectId};
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, ErrorCode, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default per-query deadline.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_millis(5000);

/// VM instructions between deadline checks.
const PROGRESS_OPS: i32 = 1000;

const PROJECT_COLUMNS: &[&str] = &["project_id", "repo_name"];
const BUCKET_COLUMNS: &[&str] = &["time_bucket", "month"];
const VALUE_COLUMNS: &[&str] = &["value", "metric_value"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("unknown column `{column}`: {message}")]
    UnknownColumn { column: String, message: String },
    #[error("unknown table `{table}`: {message}")]
    UnknownTable { table: String, message: String },
    #[error("query exceeded its deadline")]
    Timeout,
    #[error("result set has an unexpected shape: {0}")]
    Shape(String),
    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Raw backend text, as matched by repair rules.
    pub fn message(&self) -> String {
        match self {
            StoreError::UnknownColumn { message, .. } | StoreError::UnknownTable { message, .. } => {
                message.clone()
            }
            StoreError::Backend(message) | StoreError::Shape(message) => message.clone(),
            StoreError::Timeout => "interrupted: query timeout".to_string(),
        }
    }

    /// Classify a backend message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if let Some(column) = missing_name(&message, "no such column: ") {
            return StoreError::UnknownColumn { column, message };
        }
        if let Some(table) = missing_name(&message, "no such table: ") {
            return StoreError::UnknownTable { table, message };
        }
        StoreError::Backend(message)
    }
}

fn missing_name(message: &str, marker: &str) -> Option<String> {
    let (_, rest) = message.split_once(marker)?;
    let name = rest.split_whitespace().next()?;
    let name = name.trim_matches(|c: char| c == '"' || c == '`' || c == '\'');
    (!name.is_empty()).then(|| name.to_string())
}

/// Read-only access to the metric series.
pub trait MetricStore: Send + Sync {
    /// Run one validated query and return normalized rows.
    fn fetch(&self, sql: &str) -> Result<Vec<MetricRow>, StoreError>;
}

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    /// Set for read-only file stores; fetches open their own connection.
    read_only_path: Option<PathBuf>,
    timeout: Duration,
}

fn open_read_only_connection(path: &Path) -> Result<Connection, StoreError> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
    )
    .map_err(backend)
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(backend)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an existing database without write access.
    pub fn open_read_only(path: &Path) -> Result<Self, StoreError> {
        let conn = open_read_only_connection(path)?;
        let mut store = Self::from_connection(conn);
        store.read_only_path = Some(path.to_path_buf());
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            read_only_path: None,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create the `metric_series` table and its lookup index.
    pub fn create_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS metric_series (
                project_id  TEXT NOT NULL,
                metric      TEXT NOT NULL,
                time_bucket TEXT NOT NULL,
                value       REAL
            );
            CREATE INDEX IF NOT EXISTS idx_metric_series_lookup
                ON metric_series (project_id, metric, time_bucket);",
        )
        .map_err(backend)
    }

    /// Insert one series in a single transaction. Returns the number of rows written.
    pub fn insert_series(
        &self,
        project: &ProjectId,
        metric: MetricKind,
        points: &[(&str, f64)],
    ) -> Result<usize, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(backend)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO metric_series (project_id, metric, time_bucket, value)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(backend)?;
            for (bucket, value) in points {
                stmt.execute(params![project.as_str(), metric.as_str(), bucket, value])
                    .map_err(backend)?;
            }
        }
        tx.commit().map_err(backend)?;
        Ok(points.len())
    }

    /// Run arbitrary SQL against the underlying connection (schema fixtures only).
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(sql).map_err(backend)
    }
}

impl MetricStore for SqliteStore {
    fn fetch(&self, sql: &str) -> Result<Vec<MetricRow>, StoreError> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let result = match &self.read_only_path {
            Some(path) => {
                let conn = open_read_only_connection(path)?;
                run_with_deadline(&conn, sql, deadline)
            }
            None => run_with_deadline(&self.conn.lock(), sql, deadline),
        };

        match &result {
            Ok(rows) => tracing::debug!(
                rows = rows.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "store query finished"
            ),
            Err(err) => tracing::debug!(error = %err, "store query failed"),
        }
        result
    }
}

fn run_with_deadline(
    conn: &Connection,
    sql: &str,
    deadline: Instant,
) -> Result<Vec<MetricRow>, StoreError> {
    conn.progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= deadline));
    let result = run_query(conn, sql);
    conn.progress_handler(0, None::<fn() -> bool>);
    result
}

fn run_query(conn: &Connection, sql: &str) -> Result<Vec<MetricRow>, StoreError> {
    let mut stmt = conn.prepare(sql).map_err(classify)?;
    let names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|n| n.to_ascii_lowercase())
        .collect();

    let find = |candidates: &[&str]| {
        candidates
            .iter()
            .find_map(|c| names.iter().position(|n| n == c))
    };
    let project_idx = find(PROJECT_COLUMNS);
    let bucket_idx = find(BUCKET_COLUMNS).ok_or_else(|| {
        StoreError::Shape(format!("no time bucket column among {names:?}"))
    })?;
    let value_idx = find(VALUE_COLUMNS)
        .ok_or_else(|| StoreError::Shape(format!("no value column among {names:?}")))?;

    let mut rows = stmt.query([]).map_err(classify)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(classify)? {
        let Some(value) = as_number(row.get_ref(value_idx).map_err(classify)?)? else {
            continue;
        };
        let Some(time_bucket) = as_text(row.get_ref(bucket_idx).map_err(classify)?) else {
            continue;
        };
        let project_id = match project_idx {
            Some(idx) => as_text(row.get_ref(idx).map_err(classify)?)
                .map(ProjectId::new)
                .unwrap_or_else(ProjectId::unknown),
            None => ProjectId::unknown(),
        };
        out.push(MetricRow {
            project_id,
            time_bucket,
            value,
            is_forecast: false,
        });
    }
    Ok(out)
}

fn as_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn as_number(value: ValueRef<'_>) -> Result<Option<f64>, StoreError> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(i) => Ok(Some(i as f64)),
        ValueRef::Real(f) => Ok(Some(f)),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            text.trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| StoreError::Shape(format!("non-numeric value `{text}`")))
        }
        ValueRef::Blob(_) => Err(StoreError::Shape("binary value column".to_string())),
    }
}

fn classify(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(e, _) = &err {
        if e.code == ErrorCode::OperationInterrupted {
            return StoreError::Timeout;
        }
    }
    StoreError::from_message(err.to_string())
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

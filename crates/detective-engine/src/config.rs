//! Engine configuration.
//!
//! Resolution order: built-in defaults, then an optional JSON file, then
//! `DETECTIVE_*` environment variables. Numeric knobs are clamped to a sane
//! range; values that cannot be parsed are errors, not silently ignored.

use detective_narrator::{ChatBackend, ChatSettings};
use serde::{Deserialize, Serialize};
use std::env::VarError;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_ANOMALY_THRESHOLD: &str = "DETECTIVE_ANOMALY_THRESHOLD";
pub const ENV_FORECAST_HORIZON: &str = "DETECTIVE_FORECAST_HORIZON";
pub const ENV_MAX_ATTEMPTS: &str = "DETECTIVE_MAX_ATTEMPTS";
pub const ENV_CACHE_CAPACITY: &str = "DETECTIVE_CACHE_CAPACITY";
pub const ENV_STORE_TIMEOUT_MS: &str = "DETECTIVE_STORE_TIMEOUT_MS";
pub const ENV_CATALOG: &str = "DETECTIVE_CATALOG";
pub const ENV_DB: &str = "DETECTIVE_DB";
pub const ENV_ORACLE: &str = "DETECTIVE_ORACLE";
pub const ENV_ORACLE_URL: &str = "DETECTIVE_ORACLE_URL";
pub const ENV_ORACLE_MODEL: &str = "DETECTIVE_ORACLE_MODEL";
pub const ENV_ORACLE_TIMEOUT_SECS: &str = "DETECTIVE_ORACLE_TIMEOUT_SECS";
pub const ENV_ORACLE_SQL: &str = "DETECTIVE_ORACLE_SQL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {name}={value:?} (expected {expected})")]
    InvalidValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("failed to read {name}: {source}")]
    Env {
        name: &'static str,
        #[source]
        source: VarError,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleBackend {
    #[default]
    Off,
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
}

impl std::str::FromStr for OracleBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "off" | "none" => Ok(OracleBackend::Off),
            "ollama" => Ok(OracleBackend::Ollama),
            "openai" => Ok(OracleBackend::OpenAi),
            other => Err(ConfigError::InvalidValue {
                name: ENV_ORACLE,
                value: other.to_string(),
                expected: "off, ollama or openai",
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub backend: OracleBackend,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: u64,
    /// Ask the oracle for SQL before falling back to the synthesizer.
    pub generate_sql: bool,
    /// Only ever read from the environment.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            backend: OracleBackend::Off,
            base_url: None,
            model: None,
            timeout_secs: 20,
            generate_sql: false,
            api_key: None,
        }
    }
}

impl OracleConfig {
    /// Client settings, or `None` when the oracle is off.
    pub fn chat_settings(&self) -> Option<ChatSettings> {
        let backend = match self.backend {
            OracleBackend::Off => return None,
            OracleBackend::Ollama => ChatBackend::Ollama,
            OracleBackend::OpenAi => ChatBackend::OpenAi,
        };
        Some(ChatSettings {
            backend,
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Relative change above which a step is an anomaly.
    pub anomaly_threshold: f64,
    pub forecast_horizon: usize,
    /// Execution attempts, first run included.
    pub max_attempts: usize,
    pub cache_capacity: usize,
    pub store_timeout_ms: u64,
    pub catalog_path: PathBuf,
    pub database_path: PathBuf,
    pub oracle: OracleConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold: 0.5,
            forecast_horizon: 3,
            max_attempts: 2,
            cache_capacity: 200,
            store_timeout_ms: 5000,
            catalog_path: PathBuf::from("data/repos.json"),
            database_path: PathBuf::from("data/metrics.sqlite"),
            oracle: OracleConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults, then `path` (if any), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let read = |name: &'static str| -> Result<Option<String>, ConfigError> {
            match lookup(name) {
                Ok(v) if v.trim().is_empty() => Ok(None),
                Ok(v) => Ok(Some(v.trim().to_string())),
                Err(VarError::NotPresent) => Ok(None),
                Err(source) => Err(ConfigError::Env { name, source }),
            }
        };

        if let Some(v) = read(ENV_ANOMALY_THRESHOLD)? {
            self.anomaly_threshold = v.parse::<f64>().map_err(|_| ConfigError::InvalidValue {
                name: ENV_ANOMALY_THRESHOLD,
                value: v.clone(),
                expected: "a positive number",
            })?;
        }
        if let Some(v) = read(ENV_FORECAST_HORIZON)? {
            self.forecast_horizon = parse_usize(ENV_FORECAST_HORIZON, &v)?;
        }
        if let Some(v) = read(ENV_MAX_ATTEMPTS)? {
            self.max_attempts = parse_usize(ENV_MAX_ATTEMPTS, &v)?;
        }
        if let Some(v) = read(ENV_CACHE_CAPACITY)? {
            self.cache_capacity = parse_usize(ENV_CACHE_CAPACITY, &v)?;
        }
        if let Some(v) = read(ENV_STORE_TIMEOUT_MS)? {
            self.store_timeout_ms = parse_u64(ENV_STORE_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = read(ENV_CATALOG)? {
            self.catalog_path = PathBuf::from(v);
        }
        if let Some(v) = read(ENV_DB)? {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = read(ENV_ORACLE)? {
            self.oracle.backend = v.parse()?;
        }
        if let Some(v) = read(ENV_ORACLE_URL)? {
            self.oracle.base_url = Some(v);
        }
        if let Some(v) = read(ENV_ORACLE_MODEL)? {
            self.oracle.model = Some(v);
        }
        if let Some(v) = read(ENV_ORACLE_TIMEOUT_SECS)? {
            self.oracle.timeout_secs = parse_u64(ENV_ORACLE_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = read(ENV_ORACLE_SQL)? {
            self.oracle.generate_sql = parse_bool(ENV_ORACLE_SQL, &v)?;
        }
        if let Some(v) = read(ENV_OPENAI_API_KEY)? {
            self.oracle.api_key = Some(v);
        }
        Ok(())
    }

    /// Reject impossible values and clamp the rest into range.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if !(self.anomaly_threshold.is_finite() && self.anomaly_threshold > 0.0) {
            return Err(ConfigError::InvalidValue {
                name: ENV_ANOMALY_THRESHOLD,
                value: self.anomaly_threshold.to_string(),
                expected: "a positive number",
            });
        }
        if self.oracle.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: ENV_ORACLE_TIMEOUT_SECS,
                value: "0".to_string(),
                expected: "at least 1 second",
            });
        }
        if self.oracle.backend == OracleBackend::OpenAi && self.oracle.api_key.is_none() {
            return Err(ConfigError::Invalid(format!(
                "the openai oracle needs {ENV_OPENAI_API_KEY}"
            )));
        }
        self.forecast_horizon = self.forecast_horizon.clamp(0, 24);
        self.max_attempts = self.max_attempts.clamp(1, 5);
        self.cache_capacity = self.cache_capacity.clamp(1, 10_000);
        self.store_timeout_ms = self.store_timeout_ms.clamp(1, 600_000);
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn parse_usize(name: &'static str, v: &str) -> Result<usize, ConfigError> {
    v.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
        name,
        value: v.to_string(),
        expected: "a non-negative integer",
    })
}

fn parse_u64(name: &'static str, v: &str) -> Result<u64, ConfigError> {
    v.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        name,
        value: v.to_string(),
        expected: "a non-negative integer",
    })
}

fn parse_bool(name: &'static str, v: &str) -> Result<bool, ConfigError> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: v.to_string(),
            expected: "a boolean",
        }),
    }
}

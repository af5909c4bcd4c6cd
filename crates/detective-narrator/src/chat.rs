//! Blocking HTTP chat client for Ollama and OpenAI-compatible servers.

use crate::oracle::{ChatMessage, NarrationRequest, Narrator, OracleError, QueryOracle, SqlRequest};
use crate::prompt::{narration_messages, sql_messages};
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatBackend {
    /// Native `/api/chat` endpoint.
    Ollama,
    /// `/chat/completions` with bearer auth.
    OpenAi,
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub backend: ChatBackend,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl ChatSettings {
    pub fn ollama() -> Self {
        Self {
            backend: ChatBackend::Ollama,
            base_url: None,
            model: None,
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn openai(api_key: &str) -> Self {
        Self {
            backend: ChatBackend::OpenAi,
            base_url: None,
            model: None,
            api_key: Some(api_key.to_string()),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct ChatOracle {
    client: reqwest::blocking::Client,
    backend: ChatBackend,
    url: String,
    model: String,
    api_key: Option<String>,
}

fn normalize_base_url(raw: Option<&str>, default: &str) -> String {
    let mut url = raw.map(str::trim).unwrap_or_default().to_string();
    if url.is_empty() {
        url = default.to_string();
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("http://{url}");
    }
    url.trim_end_matches('/').to_string()
}

impl ChatOracle {
    pub fn new(settings: ChatSettings) -> Result<Self, OracleError> {
        let (default_url, default_model, path) = match settings.backend {
            ChatBackend::Ollama => (DEFAULT_OLLAMA_URL, DEFAULT_OLLAMA_MODEL, "/api/chat"),
            ChatBackend::OpenAi => (DEFAULT_OPENAI_URL, DEFAULT_OPENAI_MODEL, "/chat/completions"),
        };
        if settings.backend == ChatBackend::OpenAi && settings.api_key.is_none() {
            return Err(OracleError::Api("OPENAI_API_KEY is not set".to_string()));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| OracleError::Network(format!("failed to build http client: {e}")))?;

        let base = normalize_base_url(settings.base_url.as_deref(), default_url);
        Ok(Self {
            client,
            backend: settings.backend,
            url: format!("{base}{path}"),
            model: settings
                .model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| default_model.to_string()),
            api_key: settings.api_key,
        })
    }

    pub fn describe(&self) -> String {
        match self.backend {
            ChatBackend::Ollama => format!("ollama({}, {})", self.url, self.model),
            ChatBackend::OpenAi => format!("openai({}, {})", self.url, self.model),
        }
    }

    /// One non-streaming chat round-trip; returns the assistant content.
    pub fn chat(&self, messages: &[ChatMessage]) -> Result<String, OracleError> {
        let messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let body = match self.backend {
            ChatBackend::Ollama => json!({
                "model": self.model,
                "stream": false,
                "messages": messages,
                "options": { "temperature": 0 }
            }),
            ChatBackend::OpenAi => json!({
                "model": self.model,
                "messages": messages,
                "temperature": 0
            }),
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!(oracle = %self.describe(), "sending chat request");
        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::Network(format!("failed to reach {}: {e}", self.url))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(OracleError::Api(format!("{status}: {text}")));
        }

        let data: serde_json::Value = response
            .json()
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        let content = match self.backend {
            ChatBackend::Ollama => data["message"]["content"].as_str(),
            ChatBackend::OpenAi => data["choices"][0]["message"]["content"].as_str(),
        };
        content
            .map(|s| s.to_string())
            .ok_or_else(|| OracleError::InvalidResponse("missing message content".to_string()))
    }
}

impl Narrator for ChatOracle {
    fn narrate(&self, request: &NarrationRequest) -> Result<String, OracleError> {
        self.chat(&narration_messages(request))
    }
}

impl QueryOracle for ChatOracle {
    fn generate_sql(&self, request: &SqlRequest) -> Result<String, OracleError> {
        self.chat(&sql_messages(request))
    }
}

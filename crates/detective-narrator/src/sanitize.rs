//! Cleanup of oracle-written narrative.
//!
//! The narrative passes an ordered chain of named filters. Each filter either
//! returns cleaned text or discards the whole narrative; an empty result is a
//! discard too. A discarded narrative means the caller uses its deterministic
//! report instead, so the oracle can never produce a blank answer.

use regex::Regex;
use std::sync::OnceLock;

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> Option<&'static Regex> {
            static RE: OnceLock<Option<Regex>> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).ok()).as_ref()
        }
    };
}

cached_regex!(code_fence, r"(?s)```.*?```");
cached_regex!(refusal_phrases, &refusal_pattern());

/// Markers of a chart configuration or an error envelope instead of prose.
pub const CHART_MARKERS: &[&str] = &[
    "\"axis\":",
    "\"series\":",
    "\"type\":",
    "\"xAxis\"",
    "\"yAxis\"",
    "\"success\":false",
    "\"success\": false",
];

/// Refusals, meta-commentary and stream artifacts, matched case-insensitively.
pub const REFUSAL_PHRASES: &[&str] = &[
    "As an AI language model",
    "I cannot",
    "I can't",
    "execute-success",
    "[DONE]",
    "智能问数小助手",
    "抱歉",
    "无法",
];

fn refusal_pattern() -> String {
    let alternatives: Vec<String> = REFUSAL_PHRASES.iter().map(|p| regex::escape(p)).collect();
    format!("(?i){}", alternatives.join("|"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrativeFilter {
    /// Remove fenced code blocks.
    CodeFence,
    /// Discard text carrying chart-config or error-envelope markers.
    ChartSignature,
    /// Discard a bare JSON document; trim bracket/quote/colon/comma remnants.
    BoundaryPunctuation,
    /// Remove known refusal and meta phrases.
    RefusalPhrases,
}

/// The fixed filter order.
pub const STANDARD: [NarrativeFilter; 4] = [
    NarrativeFilter::CodeFence,
    NarrativeFilter::ChartSignature,
    NarrativeFilter::BoundaryPunctuation,
    NarrativeFilter::RefusalPhrases,
];

fn is_remnant(c: char) -> bool {
    c.is_whitespace() || matches!(c, '[' | ']' | '{' | '}' | '"' | ':' | ',')
}

impl NarrativeFilter {
    pub fn name(&self) -> &'static str {
        match self {
            NarrativeFilter::CodeFence => "code_fence",
            NarrativeFilter::ChartSignature => "chart_signature",
            NarrativeFilter::BoundaryPunctuation => "boundary_punctuation",
            NarrativeFilter::RefusalPhrases => "refusal_phrases",
        }
    }

    /// `None` discards the narrative.
    pub fn apply(&self, text: &str) -> Option<String> {
        match self {
            NarrativeFilter::CodeFence => Some(match code_fence() {
                Some(re) => re.replace_all(text, "").into_owned(),
                None => text.to_string(),
            }),
            NarrativeFilter::ChartSignature => {
                if CHART_MARKERS.iter().any(|m| text.contains(m)) {
                    None
                } else {
                    Some(text.to_string())
                }
            }
            NarrativeFilter::BoundaryPunctuation => {
                let trimmed = text.trim();
                let is_json_document = (trimmed.starts_with('{') || trimmed.starts_with('['))
                    && serde_json::from_str::<serde_json::Value>(trimmed).is_ok();
                if is_json_document {
                    return None;
                }
                Some(trimmed.trim_matches(is_remnant).to_string())
            }
            NarrativeFilter::RefusalPhrases => {
                let stripped = match refusal_phrases() {
                    Some(re) => re.replace_all(text, "").into_owned(),
                    None => text.to_string(),
                };
                Some(stripped.trim_matches(is_remnant).to_string())
            }
        }
    }
}

/// Run `filters` in order; `None` when any filter discards or nothing remains.
pub fn sanitize_with(text: &str, filters: &[NarrativeFilter]) -> Option<String> {
    let mut current = text.to_string();
    for filter in filters {
        match filter.apply(&current) {
            Some(next) => current = next,
            None => {
                tracing::debug!(filter = filter.name(), "narrative discarded");
                return None;
            }
        }
    }
    let current = current.trim();
    (!current.is_empty()).then(|| current.to_string())
}

/// [`sanitize_with`] over the [`STANDARD`] chain.
pub fn sanitize(text: &str) -> Option<String> {
    sanitize_with(text, &STANDARD)
}

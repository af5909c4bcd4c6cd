//! Project identifiers and the fixed metric enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical project slug, e.g. `vuejs/core`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    /// Placeholder used when a result set carries no project column.
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased `/`, `-`, `_`, `.`-separated segments of the slug.
    ///
    /// `facebook/react` → `["facebook", "react"]`,
    /// `kubernetes/kube-state-metrics` → `["kubernetes", "kube", "state", "metrics"]`.
    pub fn segments(&self) -> Vec<String> {
        self.0
            .to_lowercase()
            .split(|c: char| matches!(c, '/' | '-' | '_' | '.'))
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The measured signals tracked per project and month.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Popularity count (stargazers gained).
    #[default]
    Stars,
    /// Activity count.
    Activity,
    /// Influence score.
    #[serde(rename = "openrank")]
    OpenRank,
    /// Contributor risk (bus factor).
    BusFactor,
    /// Issues opened.
    IssuesNew,
    /// Issues closed.
    IssuesClosed,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Stars,
        MetricKind::Activity,
        MetricKind::OpenRank,
        MetricKind::BusFactor,
        MetricKind::IssuesNew,
        MetricKind::IssuesClosed,
    ];

    /// Label stored in the `metric` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Stars => "stars",
            MetricKind::Activity => "activity",
            MetricKind::OpenRank => "openrank",
            MetricKind::BusFactor => "bus_factor",
            MetricKind::IssuesNew => "issues_new",
            MetricKind::IssuesClosed => "issues_closed",
        }
    }

    /// Human-readable name for narratives.
    pub fn display_name(&self) -> &'static str {
        match self {
            MetricKind::Stars => "star count",
            MetricKind::Activity => "activity",
            MetricKind::OpenRank => "OpenRank influence",
            MetricKind::BusFactor => "bus factor",
            MetricKind::IssuesNew => "new issues",
            MetricKind::IssuesClosed => "closed issues",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric `{0}` (expected one of: stars, activity, openrank, bus_factor, issues_new, issues_closed)")]
pub struct UnknownMetric(pub String);

impl FromStr for MetricKind {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        MetricKind::ALL
            .into_iter()
            .find(|m| m.as_str() == needle)
            .ok_or(UnknownMetric(needle))
    }
}

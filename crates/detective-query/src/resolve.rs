//! Free text → (projects, metric).
//!
//! This is a deterministic, catalog-driven matcher, not a language model. A
//! question like "compare vue and react stars" becomes
//! `{vuejs/core, facebook/react} × stars`.
//!
//! Matching, per catalog project, in strict priority order (first hit wins):
//! 1. the whole lowercased identifier occurs in the input;
//! 2. a non-ignored token equals one of the identifier's segments;
//! 3. a non-ignored token of ≥3 chars is a prefix of a segment.
//!
//! The prefix direction is token → segment only, so `react` reaches
//! `facebook/react` but never `preactjs/preact`.
//!
//! Generic words and metric keywords are on an ignore-list so "stars" or "issue"
//! never match a project segment. A project whose segment is itself an ignored
//! word cannot be reached through that token.

use detective_model::{MetricCatalog, MetricKind, ProjectId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::OnceLock;

/// Minimum token length for the prefix rule.
pub const MIN_PREFIX_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionFailure {
    #[error("no tracked project mentioned in {text:?}")]
    NoProject {
        text: String,
        /// Metric keyword found anyway (for diagnostics only).
        metric: Option<MetricKind>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    ExactIdentifier,
    Segment,
    Prefix,
    Alias,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectMatch {
    pub project: ProjectId,
    pub kind: MatchKind,
    /// Input token (or identifier) that triggered the match.
    pub via: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIntent {
    pub projects: BTreeSet<ProjectId>,
    pub metric: MetricKind,
    /// `false` when no metric keyword was present and the default applied.
    pub metric_explicit: bool,
    pub matches: Vec<ProjectMatch>,
}

// ============================================================================
// Vocabulary
// ============================================================================

/// Well-known shorthand, applied independently of the segment scan.
const ALIASES: &[(&str, &str)] = &[
    ("k8s", "kubernetes/kubernetes"),
    ("tf", "tensorflow/tensorflow"),
    ("ts", "microsoft/typescript"),
    ("vue3", "vuejs/core"),
];

const STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "any", "are", "as", "at", "be", "between", "by", "can", "change",
    "compare", "compared", "comparison", "data", "did", "do", "does", "for", "from", "github",
    "give", "growth", "has", "have", "how", "in", "is", "it", "its", "last", "me", "month",
    "monthly", "months", "more", "most", "much", "many", "of", "on", "or", "over", "past",
    "please", "project", "projects", "repo", "repos", "repository", "show", "tell", "than",
    "that", "the", "their", "this", "time", "to", "trend", "trends", "versus", "vs", "was",
    "were", "what", "whats", "which", "who", "why", "with", "year", "years",
];

/// One keyword family. Every group must be satisfied: a group is satisfied when
/// any of its words equals a token or any of its phrases occurs in the text.
struct MetricFamily {
    metric: MetricKind,
    groups: &'static [KeywordGroup],
}

struct KeywordGroup {
    words: &'static [&'static str],
    phrases: &'static [&'static str],
}

const ISSUE_GROUP: KeywordGroup = KeywordGroup {
    words: &["issue", "issues", "bug", "bugs", "ticket", "tickets"],
    phrases: &["议题", "缺陷"],
};

/// Priority order: risk before issue terms before the rest; first match wins.
const METRIC_FAMILIES: &[MetricFamily] = &[
    MetricFamily {
        metric: MetricKind::BusFactor,
        groups: &[KeywordGroup {
            words: &["bus", "risk", "risks", "risky", "busfactor"],
            phrases: &["风险", "巴士因子"],
        }],
    },
    MetricFamily {
        metric: MetricKind::IssuesClosed,
        groups: &[
            KeywordGroup {
                words: &["closed", "close", "closing", "resolved", "fixed"],
                phrases: &["关闭"],
            },
            ISSUE_GROUP,
        ],
    },
    MetricFamily {
        metric: MetricKind::IssuesNew,
        groups: &[ISSUE_GROUP],
    },
    MetricFamily {
        metric: MetricKind::OpenRank,
        groups: &[KeywordGroup {
            words: &["rank", "ranking", "openrank", "influence", "influential"],
            phrases: &["影响力"],
        }],
    },
    MetricFamily {
        metric: MetricKind::Activity,
        groups: &[KeywordGroup {
            words: &["activity", "active", "activities"],
            phrases: &["活跃"],
        }],
    },
    MetricFamily {
        metric: MetricKind::Stars,
        groups: &[KeywordGroup {
            words: &["star", "stars", "stargazers", "popularity", "popular"],
            phrases: &["星标"],
        }],
    },
];

/// Words that never match a project segment: stopwords plus every metric keyword.
fn ignore_list() -> &'static HashSet<&'static str> {
    static IGNORE: OnceLock<HashSet<&'static str>> = OnceLock::new();
    IGNORE.get_or_init(build_ignore_list)
}

fn build_ignore_list() -> HashSet<&'static str> {
    let mut set: HashSet<&'static str> = STOPWORDS.iter().copied().collect();
    for family in METRIC_FAMILIES {
        for group in family.groups {
            set.extend(group.words.iter().copied());
        }
    }
    // Common metric vocabulary that is not a family trigger on its own.
    set.extend(["factor", "new", "opened", "open", "count", "score", "value"]);
    set
}

/// `true` when the token can never match a project segment.
pub fn is_ignored(token: &str) -> bool {
    ignore_list().contains(token)
}

// ============================================================================
// Tokenization
// ============================================================================

/// Han ideographs. Project ids are ASCII slugs, so an ideograph always ends a
/// word: "vue的星标" tokenizes to `vue`. Chinese metric phrases are matched on
/// the raw text instead.
fn is_ideograph(c: char) -> bool {
    matches!(
        c,
        '\u{3400}'..='\u{4DBF}' | '\u{4E00}'..='\u{9FFF}' | '\u{F900}'..='\u{FAFF}'
    )
}

fn is_separator(c: char) -> bool {
    c.is_whitespace()
        || is_ideograph(c)
        || (c.is_ascii_punctuation())
        || matches!(
            c,
            '，' | '。' | '！' | '？' | '；' | '：' | '、' | '（' | '）' | '《' | '》' | '「' | '」'
                | '【' | '】' | '“' | '”' | '‘' | '’'
        )
}

/// Lowercase and split into words on whitespace, path separators, hyphens,
/// underscores, punctuation (ASCII and CJK) and Han ideographs.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(is_separator)
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve a question against a catalog snapshot.
pub fn resolve(text: &str, catalog: &MetricCatalog) -> Result<ResolvedIntent, ResolutionFailure> {
    let lowered = text.to_lowercase();
    let tokens = tokenize(text);
    let ignore = ignore_list();
    let candidates: Vec<&str> = tokens
        .iter()
        .map(|t| t.as_str())
        .filter(|t| !ignore.contains(*t))
        .collect();

    let mut found: BTreeMap<ProjectId, ProjectMatch> = BTreeMap::new();

    for project in catalog.projects() {
        if let Some(m) = match_project(project, &lowered, &candidates) {
            found.insert(project.clone(), m);
        }
    }

    for (alias, target) in ALIASES {
        if !tokens.iter().any(|t| t == alias) {
            continue;
        }
        let target = ProjectId::new(*target);
        if catalog.contains(&target) && !found.contains_key(&target) {
            found.insert(
                target.clone(),
                ProjectMatch {
                    project: target,
                    kind: MatchKind::Alias,
                    via: alias.to_string(),
                },
            );
        }
    }

    let metric = classify_metric(&lowered, &tokens);

    if found.is_empty() {
        return Err(ResolutionFailure::NoProject {
            text: text.to_string(),
            metric,
        });
    }

    let matches: Vec<ProjectMatch> = found.values().cloned().collect();
    tracing::debug!(
        catalog_version = catalog.version(),
        projects = ?matches.iter().map(|m| m.project.as_str()).collect::<Vec<_>>(),
        metric = ?metric,
        "resolved question"
    );

    Ok(ResolvedIntent {
        projects: found.into_keys().collect(),
        metric: metric.unwrap_or_default(),
        metric_explicit: metric.is_some(),
        matches,
    })
}

fn match_project(project: &ProjectId, lowered: &str, candidates: &[&str]) -> Option<ProjectMatch> {
    let id_lower = project.as_str().to_lowercase();

    // 1) Exact full identifier.
    if lowered.contains(&id_lower) {
        return Some(ProjectMatch {
            project: project.clone(),
            kind: MatchKind::ExactIdentifier,
            via: id_lower,
        });
    }

    let segments = project.segments();

    // 2) Exact segment.
    if let Some(token) = candidates
        .iter()
        .find(|t| segments.iter().any(|s| s == *t))
    {
        return Some(ProjectMatch {
            project: project.clone(),
            kind: MatchKind::Segment,
            via: token.to_string(),
        });
    }

    // 3) Token is a prefix of a segment.
    if let Some(token) = candidates.iter().find(|t| {
        t.chars().count() >= MIN_PREFIX_LEN && segments.iter().any(|s| s.starts_with(*t))
    }) {
        return Some(ProjectMatch {
            project: project.clone(),
            kind: MatchKind::Prefix,
            via: token.to_string(),
        });
    }

    None
}

/// First metric family (in priority order) whose groups are all satisfied.
pub fn classify_metric(lowered: &str, tokens: &[String]) -> Option<MetricKind> {
    let satisfied = |group: &KeywordGroup| {
        group.words.iter().any(|w| tokens.iter().any(|t| t == w))
            || group.phrases.iter().any(|p| lowered.contains(p))
    };
    METRIC_FAMILIES
        .iter()
        .find(|family| family.groups.iter().all(satisfied))
        .map(|family| family.metric)
}

//! Month-over-month spike/drop detection.

use crate::series::actual_series;
use detective_model::{MetricRow, ProjectId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relative change (as a fraction) above which a step is flagged.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Anomalies reported per answer, earliest first.
pub const MAX_ANOMALIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Spike,
    Drop,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Spike => f.write_str("SPIKE"),
            Direction::Drop => f.write_str("DROP"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub time_bucket: String,
    pub project_id: ProjectId,
    pub direction: Direction,
    /// `|change| * 100`.
    pub magnitude_pct: f64,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} {:.1}%",
            self.time_bucket, self.project_id, self.direction, self.magnitude_pct
        )
    }
}

/// Flag steps whose relative change exceeds `threshold`.
///
/// Each project is scanned on its own chronological series; a step from a zero
/// value is skipped. Results from all projects are merged by (bucket, project)
/// and only the first [`MAX_ANOMALIES`] are kept.
pub fn detect_anomalies(rows: &[MetricRow], threshold: f64) -> Vec<Anomaly> {
    let mut found = Vec::new();

    for (project, series) in actual_series(rows) {
        for pair in series.windows(2) {
            let (prev, curr) = (pair[0].value, pair[1].value);
            if prev == 0.0 {
                continue;
            }
            let change = (curr - prev) / prev;
            if change.abs() > threshold {
                found.push(Anomaly {
                    time_bucket: pair[1].time_bucket.clone(),
                    project_id: project.clone(),
                    direction: if change > 0.0 {
                        Direction::Spike
                    } else {
                        Direction::Drop
                    },
                    magnitude_pct: change.abs() * 100.0,
                });
            }
        }
    }

    found.sort_by(|a, b| {
        a.time_bucket
            .cmp(&b.time_bucket)
            .then_with(|| a.project_id.cmp(&b.project_id))
    });
    if found.len() > MAX_ANOMALIES {
        tracing::debug!(
            total = found.len(),
            kept = MAX_ANOMALIES,
            "truncating anomaly list"
        );
        found.truncate(MAX_ANOMALIES);
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn series(project: &str, values: &[f64]) -> Vec<MetricRow> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricRow::actual(project, &format!("2023-{:02}", i + 1), *v))
            .collect()
    }

    #[test]
    fn spike_of_160_percent() {
        let found = detect_anomalies(&series("vuejs/core", &[100.0, 100.0, 260.0]), 0.5);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].time_bucket, "2023-03");
        assert_eq!(found[0].direction, Direction::Spike);
        assert_relative_eq!(found[0].magnitude_pct, 160.0, epsilon = 1e-9);
        assert_eq!(found[0].to_string(), "2023-03 | vuejs/core | SPIKE 160.0%");
    }

    #[test]
    fn drop_is_flagged() {
        let found = detect_anomalies(&series("a/b", &[100.0, 40.0]), 0.5);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].direction, Direction::Drop);
        assert_relative_eq!(found[0].magnitude_pct, 60.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_previous_value_is_skipped() {
        let found = detect_anomalies(&series("a/b", &[0.0, 500.0, 500.0]), 0.5);
        assert!(found.is_empty());
    }

    #[test]
    fn at_most_three_earliest_first() {
        let found = detect_anomalies(
            &series("a/b", &[1.0, 10.0, 1.0, 10.0, 1.0, 10.0]),
            0.5,
        );
        assert_eq!(found.len(), MAX_ANOMALIES);
        let buckets: Vec<&str> = found.iter().map(|a| a.time_bucket.as_str()).collect();
        assert_eq!(buckets, vec!["2023-02", "2023-03", "2023-04"]);
    }

    #[test]
    fn projects_are_scanned_independently_and_merged_chronologically() {
        let mut rows = series("z/late", &[10.0, 10.0, 30.0]);
        rows.extend(series("a/early", &[10.0, 30.0]));
        // Interleave: a step across projects must never be compared.
        rows.swap(1, 3);
        let found = detect_anomalies(&rows, 0.5);
        let got: Vec<(&str, &str)> = found
            .iter()
            .map(|a| (a.time_bucket.as_str(), a.project_id.as_str()))
            .collect();
        assert_eq!(got, vec![("2023-02", "a/early"), ("2023-03", "z/late")]);
    }

    #[test]
    fn forecast_rows_are_ignored() {
        let mut rows = series("a/b", &[100.0, 110.0]);
        rows.push(MetricRow::forecast(
            ProjectId::new("a/b"),
            "2023-03".into(),
            1000.0,
        ));
        assert!(detect_anomalies(&rows, 0.5).is_empty());
    }

    #[test]
    fn direction_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Direction::Drop).unwrap(), "\"DROP\"");
    }
}

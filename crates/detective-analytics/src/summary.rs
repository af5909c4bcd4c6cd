//! Descriptive statistics for the deterministic fallback report.

use crate::series::actual_series;
use detective_model::{MetricRow, ProjectId};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub project_id: ProjectId,
    pub count: usize,
    pub start_bucket: String,
    pub end_bucket: String,
    pub start: f64,
    pub end: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// First bucket holding the maximum.
    pub peak_bucket: String,
    /// `None` when the series starts at zero.
    pub percent_change: Option<f64>,
}

/// One summary per project, in project order.
pub fn summarize(rows: &[MetricRow]) -> Vec<SeriesSummary> {
    actual_series(rows)
        .into_iter()
        .filter_map(|(project, series)| {
            let first = series.first()?;
            let last = series.last()?;

            let mut peak = first;
            let mut min = first.value;
            let mut total = 0.0;
            for row in &series {
                if row.value > peak.value {
                    peak = row;
                }
                min = min.min(row.value);
                total += row.value;
            }

            Some(SeriesSummary {
                project_id: project.clone(),
                count: series.len(),
                start_bucket: first.time_bucket.clone(),
                end_bucket: last.time_bucket.clone(),
                start: first.value,
                end: last.value,
                min,
                max: peak.value,
                mean: total / series.len() as f64,
                peak_bucket: peak.time_bucket.clone(),
                percent_change: (first.value != 0.0)
                    .then(|| (last.value - first.value) / first.value * 100.0),
            })
        })
        .collect()
}

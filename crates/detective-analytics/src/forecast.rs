//! Short-horizon linear extrapolation.
//!
//! Each project's actual series is fitted with ordinary least squares
//! `value = m·index + c` over its sorted points, then extended `horizon`
//! months past the last bucket. Projections are clamped at zero.

use crate::series::actual_series;
use detective_model::{add_months, MetricRow, ProjectId};

/// Months projected by default.
pub const DEFAULT_HORIZON: usize = 3;

/// Least-squares fit over `(index, value)` pairs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    /// `None` with fewer than two points.
    pub fn fit(values: &[f64]) -> Option<Self> {
        let n = values.len();
        if n < 2 {
            return None;
        }
        let nf = n as f64;
        let mean_x = (nf - 1.0) / 2.0;
        let mean_y = values.iter().sum::<f64>() / nf;

        let (mut sxy, mut sxx) = (0.0, 0.0);
        for (i, y) in values.iter().enumerate() {
            let dx = i as f64 - mean_x;
            sxy += dx * (y - mean_y);
            sxx += dx * dx;
        }
        let slope = sxy / sxx;
        Some(Self {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    pub fn at(&self, index: f64) -> f64 {
        self.slope * index + self.intercept
    }
}

/// Forecast rows for every project with at least two actual points.
pub fn forecast(rows: &[MetricRow], horizon: usize) -> Vec<MetricRow> {
    let mut out = Vec::new();
    for (project, series) in actual_series(rows) {
        let values: Vec<f64> = series.iter().map(|r| r.value).collect();
        let Some(last) = series.last() else {
            continue;
        };
        out.extend(forecast_series(project, &values, &last.time_bucket, horizon));
    }
    out
}

/// Extend one sorted series. Returns nothing when the series is too short or
/// its last bucket is not a `YYYY-MM` label.
pub fn forecast_series(
    project: &ProjectId,
    values: &[f64],
    last_bucket: &str,
    horizon: usize,
) -> Vec<MetricRow> {
    let Some(fit) = LinearFit::fit(values) else {
        return Vec::new();
    };

    let mut points = Vec::with_capacity(horizon);
    for step in 1..=horizon {
        let bucket = match add_months(last_bucket, step as u32) {
            Ok(bucket) => bucket,
            Err(err) => {
                tracing::debug!(project = %project, error = %err, "skipping forecast");
                return Vec::new();
            }
        };
        let index = (values.len() - 1 + step) as f64;
        points.push(MetricRow::forecast(
            project.clone(),
            bucket,
            fit.at(index).max(0.0),
        ));
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn two_points_extrapolate_across_year_end() {
        let rows = vec![
            MetricRow::actual("vuejs/core", "2023-11", 10.0),
            MetricRow::actual("vuejs/core", "2023-12", 20.0),
        ];
        let out = forecast(&rows, 3);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].time_bucket, "2024-01");
        assert_relative_eq!(out[0].value, 30.0, epsilon = 1e-9);
        assert_eq!(out[2].time_bucket, "2024-03");
        assert_relative_eq!(out[2].value, 50.0, epsilon = 1e-9);
        assert!(out.iter().all(|r| r.is_forecast));
    }

    #[test]
    fn declining_series_is_clamped_at_zero() {
        let rows = vec![
            MetricRow::actual("a/b", "2023-01", 30.0),
            MetricRow::actual("a/b", "2023-02", 10.0),
        ];
        let out = forecast(&rows, 3);
        assert_relative_eq!(out[0].value, 0.0);
        assert!(out.iter().all(|r| r.value >= 0.0));
    }

    #[test]
    fn short_or_malformed_series_yield_nothing() {
        assert!(forecast(&[MetricRow::actual("a/b", "2023-01", 1.0)], 3).is_empty());
        let rows = vec![
            MetricRow::actual("a/b", "2023-1", 1.0),
            MetricRow::actual("a/b", "2023-2", 2.0),
        ];
        assert!(forecast(&rows, 3).is_empty());
    }

    #[test]
    fn fit_matches_least_squares() {
        let fit = LinearFit::fit(&[1.0, 3.0, 2.0, 5.0]).unwrap();
        assert_relative_eq!(fit.slope, 1.1, epsilon = 1e-9);
        assert_relative_eq!(fit.intercept, 1.1, epsilon = 1e-9);
    }

    #[test]
    fn each_project_gets_its_own_forecast() {
        let rows = vec![
            MetricRow::actual("a/one", "2023-01", 1.0),
            MetricRow::actual("b/two", "2023-01", 100.0),
            MetricRow::actual("a/one", "2023-02", 2.0),
            MetricRow::actual("b/two", "2023-02", 100.0),
        ];
        let out = forecast(&rows, 1);
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out[0].value, 3.0, epsilon = 1e-9);
        assert_relative_eq!(out[1].value, 100.0, epsilon = 1e-9);
    }
}

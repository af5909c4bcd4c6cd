//! Property tests for the analytics routines.
//!
//! 1. Anomaly detection is idempotent and bounded
//! 2. Forecasts are never negative and continue the calendar
//! 3. Trend narrative has one line per project

use detective_analytics::*;
use detective_model::{add_months, MetricRow};
use proptest::prelude::*;

/// Consecutive monthly buckets from a random start.
fn series_strategy() -> impl Strategy<Value = Vec<MetricRow>> {
    (
        2015i32..2030,
        1u32..=12,
        prop::collection::vec(0.0f64..10_000.0, 0..24),
    )
        .prop_map(|(year, month, values)| {
            let start = format!("{year:04}-{month:02}");
            values
                .into_iter()
                .enumerate()
                .filter_map(|(i, v)| {
                    let bucket = add_months(&start, i as u32).ok()?;
                    Some(MetricRow::actual("org/project", &bucket, v))
                })
                .collect()
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn anomaly_detection_is_idempotent_and_bounded(
        rows in series_strategy(),
        threshold in 0.05f64..2.0,
    ) {
        let first = detect_anomalies(&rows, threshold);
        let second = detect_anomalies(&rows, threshold);
        prop_assert_eq!(&first, &second);
        prop_assert!(first.len() <= MAX_ANOMALIES);
        for a in &first {
            prop_assert!(a.magnitude_pct >= threshold * 100.0);
        }
    }

    #[test]
    fn forecast_is_non_negative_and_follows_last_bucket(
        rows in series_strategy(),
        horizon in 0usize..12,
    ) {
        let out = forecast(&rows, horizon);
        if rows.len() < 2 {
            prop_assert!(out.is_empty());
        } else {
            prop_assert_eq!(out.len(), horizon);
            let last = &rows[rows.len() - 1].time_bucket;
            for (i, row) in out.iter().enumerate() {
                prop_assert!(row.value >= 0.0);
                prop_assert!(row.is_forecast);
                prop_assert_eq!(&row.time_bucket, &add_months(last, i as u32 + 1).unwrap());
            }
        }
    }

    #[test]
    fn forecast_rows_never_change_anomalies(rows in series_strategy()) {
        let mut with_forecast = rows.clone();
        with_forecast.extend(forecast(&rows, DEFAULT_HORIZON));
        prop_assert_eq!(
            detect_anomalies(&rows, DEFAULT_THRESHOLD),
            detect_anomalies(&with_forecast, DEFAULT_THRESHOLD)
        );
    }

    #[test]
    fn trend_narrative_is_one_line_for_one_project(rows in series_strategy()) {
        prop_assert_eq!(trend_narrative(&rows).lines().count(), 1);
    }
}

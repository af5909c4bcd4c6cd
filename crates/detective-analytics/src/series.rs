//! Per-project grouping of actual observations.

use detective_model::{MetricRow, ProjectId};
use std::collections::BTreeMap;

/// Actual (non-forecast) rows grouped by project, each group sorted by bucket.
///
/// Sorting is stable, so rows sharing a bucket keep their input order.
pub fn actual_series(rows: &[MetricRow]) -> BTreeMap<&ProjectId, Vec<&MetricRow>> {
    let mut groups: BTreeMap<&ProjectId, Vec<&MetricRow>> = BTreeMap::new();
    for row in rows.iter().filter(|r| !r.is_forecast) {
        groups.entry(&row.project_id).or_default().push(row);
    }
    for series in groups.values_mut() {
        series.sort_by(|a, b| a.time_bucket.cmp(&b.time_bucket));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_sort_and_drop_forecasts() {
        let rows = vec![
            MetricRow::actual("b/two", "2023-02", 2.0),
            MetricRow::actual("a/one", "2023-03", 3.0),
            MetricRow::actual("a/one", "2023-01", 1.0),
            MetricRow::forecast(ProjectId::new("a/one"), "2023-04".into(), 4.0),
        ];
        let groups = actual_series(&rows);
        let keys: Vec<&str> = groups.keys().map(|p| p.as_str()).collect();
        assert_eq!(keys, vec!["a/one", "b/two"]);
        let a: Vec<&str> = groups[&ProjectId::new("a/one")]
            .iter()
            .map(|r| r.time_bucket.as_str())
            .collect();
        assert_eq!(a, vec!["2023-01", "2023-03"]);
    }
}

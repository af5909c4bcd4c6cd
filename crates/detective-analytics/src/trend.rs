//! Rule-based trend classification.

use crate::series::actual_series;
use detective_model::MetricRow;
use serde::Serialize;

/// Sentence used when a series has fewer than two actual points.
pub const INSUFFICIENT_DATA: &str = "There is not enough data to determine a trend.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendBand {
    StrongGrowth,
    ModerateGrowth,
    Stable,
    ModerateDecline,
    SevereDecline,
}

impl TrendBand {
    /// Band for the ratio `(last - first) / first`.
    pub fn classify(first: f64, last: f64) -> Self {
        if first == 0.0 {
            return if last > 0.0 {
                TrendBand::StrongGrowth
            } else {
                TrendBand::Stable
            };
        }
        let ratio = (last - first) / first;
        if ratio > 0.5 {
            TrendBand::StrongGrowth
        } else if ratio > 0.1 {
            TrendBand::ModerateGrowth
        } else if ratio < -0.5 {
            TrendBand::SevereDecline
        } else if ratio < -0.1 {
            TrendBand::ModerateDecline
        } else {
            TrendBand::Stable
        }
    }

    pub fn sentence(&self) -> &'static str {
        match self {
            TrendBand::StrongGrowth => "The series shows strong growth (more than +50% over the period).",
            TrendBand::ModerateGrowth => "The series shows moderate growth (+10% to +50% over the period).",
            TrendBand::Stable => "The series is broadly stable over the period.",
            TrendBand::ModerateDecline => "The series shows a moderate decline (-10% to -50% over the period).",
            TrendBand::SevereDecline => "The series shows a severe decline (more than -50% over the period).",
        }
    }
}

/// Band of one sorted series, `None` below two points.
pub fn series_band(values: &[f64]) -> Option<TrendBand> {
    match values {
        [first, .., last] => Some(TrendBand::classify(*first, *last)),
        _ => None,
    }
}

/// One trend sentence per project; prefixed by the project when several are present.
pub fn trend_narrative(rows: &[MetricRow]) -> String {
    let groups = actual_series(rows);
    if groups.is_empty() {
        return INSUFFICIENT_DATA.to_string();
    }

    let prefixed = groups.len() > 1;
    let lines: Vec<String> = groups
        .iter()
        .map(|(project, series)| {
            let values: Vec<f64> = series.iter().map(|r| r.value).collect();
            let sentence = series_band(&values)
                .map(|band| band.sentence())
                .unwrap_or(INSUFFICIENT_DATA);
            if prefixed {
                format!("{project}: {sentence}")
            } else {
                sentence.to_string()
            }
        })
        .collect();
    lines.join("\n")
}

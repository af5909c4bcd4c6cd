//! Quantitative findings over metric rows.
//!
//! All routines are pure functions of the rows they are given. Forecast rows
//! (`is_forecast = true`) are never treated as observations, and every
//! multi-project computation runs per project before results are merged.
//!
//! - [`detect_anomalies`]: month-over-month spikes and drops, earliest three.
//! - [`forecast`]: least-squares projection a few months ahead, never negative.
//! - [`trend_narrative`]: five-band classification of first vs. last value.
//! - [`summarize`]: descriptive statistics for reports.

pub mod anomaly;
pub mod forecast;
pub mod series;
pub mod summary;
pub mod trend;

pub use anomaly::{detect_anomalies, Anomaly, Direction, DEFAULT_THRESHOLD, MAX_ANOMALIES};
pub use forecast::{forecast, forecast_series, LinearFit, DEFAULT_HORIZON};
pub use series::actual_series;
pub use summary::{summarize, SeriesSummary};
pub use trend::{series_band, trend_narrative, TrendBand, INSUFFICIENT_DATA};

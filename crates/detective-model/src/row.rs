use crate::ProjectId;
use serde::{Deserialize, Serialize};

/// One monthly observation (or a synthetic forecast point).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub project_id: ProjectId,
    pub time_bucket: String,
    pub value: f64,
    #[serde(default)]
    pub is_forecast: bool,
}

impl MetricRow {
    pub fn actual(project_id: impl Into<ProjectId>, time_bucket: &str, value: f64) -> Self {
        Self {
            project_id: project_id.into(),
            time_bucket: time_bucket.to_string(),
            value,
            is_forecast: false,
        }
    }

    pub fn forecast(project_id: ProjectId, time_bucket: String, value: f64) -> Self {
        Self {
            project_id,
            time_bucket,
            value,
            is_forecast: true,
        }
    }
}

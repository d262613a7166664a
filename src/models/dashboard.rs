// Dashboard update handed to the display layer after every refresh cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ExtremePoint;

/// Latest value of one sensor, or a failure marker when this cycle could not read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReadingStatus {
    Ok { value: f64, display: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestReading {
    pub sensor_id: String,
    pub label: String,
    pub unit: String,
    #[serde(flatten)]
    pub status: ReadingStatus,
}

/// A number together with its rounded display string (e.g. "23.46 °C").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayValue {
    pub value: f64,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayExtreme {
    #[serde(flatten)]
    pub point: ExtremePoint,
    pub display: String,
}

/// Per-group rollup. `None` fields mean no data, which is not the same as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub name: String,
    pub label: String,
    pub unit: String,
    /// Average over `[now - 24h, now]`.
    pub current: Option<DisplayValue>,
    /// Average over yesterday, local time.
    pub previous_day: Option<DisplayValue>,
    pub max: Option<DisplayExtreme>,
    pub min: Option<DisplayExtreme>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardUpdate {
    pub timestamp: DateTime<Utc>,
    pub readings: Vec<LatestReading>,
    pub groups: Vec<GroupSummary>,
    pub retained_snapshots: usize,
}

impl DashboardUpdate {
    pub fn group(&self, name: &str) -> Option<&GroupSummary> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn reading(&self, sensor_id: &str) -> Option<&LatestReading> {
        self.readings.iter().find(|r| r.sensor_id == sensor_id)
    }
}

// Snapshot: one timestamped set of sensor readings collected in a single cycle.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One successful reading; always embedded in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub sensor_id: String,
    pub value: f64,
}

/// Readings collected in one cycle. A sensor missing from `values` failed to answer
/// in that cycle; it is never stored as zero.
///
/// Decoding is lenient so that older blobs stay readable: unknown fields are ignored,
/// a missing or `null` `values` is an empty map, and non-numeric values are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_values")]
    pub values: BTreeMap<String, f64>,
}

impl Snapshot {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
        }
    }

    pub fn from_readings(
        timestamp: DateTime<Utc>,
        readings: impl IntoIterator<Item = SensorReading>,
    ) -> Self {
        Self {
            timestamp,
            values: readings
                .into_iter()
                .map(|r| (r.sensor_id, r.value))
                .collect(),
        }
    }

    pub fn with_value(mut self, sensor_id: impl Into<String>, value: f64) -> Self {
        self.values.insert(sensor_id.into(), value);
        self
    }

    pub fn value(&self, sensor_id: &str) -> Option<f64> {
        self.values.get(sensor_id).copied()
    }

    pub fn readings(&self) -> impl Iterator<Item = SensorReading> + '_ {
        self.values.iter().map(|(id, v)| SensorReading {
            sensor_id: id.clone(),
            value: *v,
        })
    }
}

fn lenient_values<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(id, v)| v.as_f64().map(|n| (id, n)))
        .collect())
}

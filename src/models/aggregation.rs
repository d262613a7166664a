// Derived values: per-sensor window averages and group extrema. Never persisted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean of each sensor's present values inside a window. A sensor with no value in
/// any selected snapshot has no key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateResult(BTreeMap<String, f64>);

impl AggregateResult {
    pub fn get(&self, sensor_id: &str) -> Option<f64> {
        self.0.get(sensor_id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for AggregateResult {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A single reading picked out of the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtremePoint {
    pub sensor_id: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Highest and lowest reading of a group's sensors over a span of the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupExtrema {
    pub max: ExtremePoint,
    pub min: ExtremePoint,
}

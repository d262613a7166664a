// Sensor collection: one request per configured sensor, all issued concurrently.
// A failing sensor is logged and left out of the snapshot; the batch always completes.

mod http;

pub use http::HttpSensorSource;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::instrument;

use crate::models::{SensorEndpoint, SensorReading, Snapshot};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SensorFetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("response body is not a JSON object")]
    InvalidBody,
    #[error("response has no field '{0}'")]
    MissingField(String),
    #[error("field '{0}' is not a number")]
    NotNumeric(String),
}

/// Transport port: fetch one endpoint's JSON response.
#[async_trait]
pub trait SensorSource: Send + Sync {
    async fn fetch(&self, endpoint: &SensorEndpoint) -> Result<serde_json::Value, SensorFetchError>;
}

/// Pulls the reading out of a sensor response.
pub fn extract_reading(body: &serde_json::Value, field: &str) -> Result<f64, SensorFetchError> {
    let object = body.as_object().ok_or(SensorFetchError::InvalidBody)?;
    let value = object
        .get(field)
        .filter(|v| !v.is_null())
        .ok_or_else(|| SensorFetchError::MissingField(field.to_string()))?;
    value
        .as_f64()
        .ok_or_else(|| SensorFetchError::NotNumeric(field.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorFailure {
    pub sensor_id: String,
    pub error: SensorFetchError,
}

/// One cycle's collection: the snapshot plus what failed, for diagnostics and display.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectOutcome {
    pub snapshot: Snapshot,
    pub failures: Vec<SensorFailure>,
}

impl CollectOutcome {
    pub fn failure(&self, sensor_id: &str) -> Option<&SensorFetchError> {
        self.failures
            .iter()
            .find(|f| f.sensor_id == sensor_id)
            .map(|f| &f.error)
    }
}

pub struct SensorRepo {
    source: Arc<dyn SensorSource>,
    endpoints: BTreeMap<String, SensorEndpoint>,
}

impl SensorRepo {
    pub fn new(source: Arc<dyn SensorSource>, endpoints: BTreeMap<String, SensorEndpoint>) -> Self {
        Self { source, endpoints }
    }

    pub async fn collect(&self) -> CollectOutcome {
        self.collect_at(Utc::now()).await
    }

    /// Fetches every sensor concurrently and waits for all of them. The snapshot is
    /// stamped with `started_at`. No retries.
    #[instrument(skip(self), fields(repo = "sensor", operation = "collect", sensors = self.endpoints.len()))]
    pub async fn collect_at(&self, started_at: DateTime<Utc>) -> CollectOutcome {
        let fetches = self.endpoints.iter().map(|(id, endpoint)| async move {
            let result = self
                .source
                .fetch(endpoint)
                .await
                .and_then(|body| extract_reading(&body, &endpoint.field));
            (id, result)
        });

        let mut readings = Vec::with_capacity(self.endpoints.len());
        let mut failures = Vec::new();
        for (id, result) in join_all(fetches).await {
            match result {
                Ok(value) => readings.push(SensorReading {
                    sensor_id: id.clone(),
                    value,
                }),
                Err(error) => {
                    tracing::warn!(sensor = %id, error = %error, "sensor read failed");
                    failures.push(SensorFailure {
                        sensor_id: id.clone(),
                        error,
                    });
                }
            }
        }

        CollectOutcome {
            snapshot: Snapshot::from_readings(started_at, readings),
            failures,
        }
    }
}

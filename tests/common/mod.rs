// Shared test helpers
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use soilmon::config::AppConfig;
use soilmon::history_repo::{BlobStore, StorageError};
use soilmon::models::{SensorEndpoint, Snapshot};
use soilmon::sensor_repo::{SensorFetchError, SensorSource};

pub const TEST_CONFIG: &str = r#"
[server]
port = 8081
host = "127.0.0.1"

[storage]
path = "data/test.db"

[sensors.soil2n]
url = "http://sensors.test/soil2n"
label = "Field 2 north"

[sensors.soil5n]
url = "http://sensors.test/soil5n"

[sensors.soil10e]
url = "http://sensors.test/soil10e"
field = "celsius"

[[groups]]
name = "main"
label = "Main field"
sensors = ["soil2n", "soil5n"]

[[groups]]
name = "nursery"
sensors = ["soil10e"]
"#;

pub fn test_config() -> AppConfig {
    AppConfig::load_from_str(TEST_CONFIG).unwrap()
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

/// `base_time() + minutes`.
pub fn at(minutes: i64) -> DateTime<Utc> {
    base_time() + TimeDelta::minutes(minutes)
}

pub fn snapshot(timestamp: DateTime<Utc>, values: &[(&str, f64)]) -> Snapshot {
    values
        .iter()
        .fold(Snapshot::new(timestamp), |s, (id, v)| s.with_value(*id, *v))
}

pub fn url(sensor_id: &str) -> String {
    format!("http://sensors.test/{}", sensor_id)
}

pub fn endpoint(sensor_id: &str) -> SensorEndpoint {
    SensorEndpoint {
        url: url(sensor_id),
        field: "temperature".into(),
    }
}

/// Canned sensor responses keyed by URL. Unknown URLs fail with a transport error.
#[derive(Default)]
pub struct MockSource {
    responses: HashMap<String, Result<serde_json::Value, SensorFetchError>>,
    delays: HashMap<String, Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reading(mut self, sensor_id: &str, field: &str, value: f64) -> Self {
        let mut body = serde_json::Map::new();
        body.insert(field.to_string(), serde_json::Value::from(value));
        self.responses
            .insert(url(sensor_id), Ok(serde_json::Value::Object(body)));
        self
    }

    pub fn failing(mut self, sensor_id: &str, error: SensorFetchError) -> Self {
        self.responses.insert(url(sensor_id), Err(error));
        self
    }

    pub fn body(mut self, sensor_id: &str, body: serde_json::Value) -> Self {
        self.responses.insert(url(sensor_id), Ok(body));
        self
    }

    pub fn delayed(mut self, sensor_id: &str, delay: Duration) -> Self {
        self.delays.insert(url(sensor_id), delay);
        self
    }
}

#[async_trait]
impl SensorSource for MockSource {
    async fn fetch(&self, endpoint: &SensorEndpoint) -> Result<serde_json::Value, SensorFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&endpoint.url) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.responses
            .get(&endpoint.url)
            .cloned()
            .unwrap_or_else(|| Err(SensorFetchError::Transport("connection refused".into())))
    }
}

/// Store whose reads and writes always fail.
pub struct FailingStore;

#[async_trait]
impl BlobStore for FailingStore {
    async fn load(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Err(StorageError::Io(std::io::Error::other("disk unavailable")))
    }

    async fn save(&self, _key: &str, _value: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::other("disk unavailable")))
    }
}

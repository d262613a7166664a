use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::history_repo::{
    DEFAULT_MAX_AGE_HOURS, DEFAULT_MAX_ENTRIES, DEFAULT_STORAGE_KEY, RetentionPolicy,
};
use crate::models::{SensorEndpoint, SensorGroup};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    pub sensors: BTreeMap<String, SensorConfig>,
    #[serde(default)]
    pub groups: Vec<SensorGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding the log blob.
    pub path: String,
    #[serde(default = "default_storage_key")]
    pub key: String,
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_window_hours() -> u32 {
    DEFAULT_MAX_AGE_HOURS
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            max_entries: default_max_entries(),
        }
    }
}

impl RetentionConfig {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.window_hours, self.max_entries)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Refresh period; ticks land on wall-clock minutes that are multiples of it.
    #[serde(default = "default_period_minutes")]
    pub period_minutes: u32,
    /// Run one cycle at startup, before the first aligned tick.
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

fn default_period_minutes() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            period_minutes: default_period_minutes(),
            run_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Decimal places for averages and extrema.
    #[serde(default = "default_decimals")]
    pub decimals: usize,
    /// Span of the log drawn by the chart and scanned for group extrema.
    #[serde(default = "default_chart_hours")]
    pub chart_hours: u32,
    /// Max dashboard updates buffered for slow /ws/dashboard clients.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_decimals() -> usize {
    2
}

fn default_chart_hours() -> u32 {
    24
}

fn default_broadcast_capacity() -> usize {
    16
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            decimals: default_decimals(),
            chart_hours: default_chart_hours(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    #[serde(flatten)]
    pub endpoint: SensorEndpoint,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_unit")]
    pub unit: String,
}

fn default_unit() -> String {
    "°C".into()
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn endpoints(&self) -> BTreeMap<String, SensorEndpoint> {
        self.sensors
            .iter()
            .map(|(id, s)| (id.clone(), s.endpoint.clone()))
            .collect()
    }

    pub fn sensor_label<'a>(&'a self, sensor_id: &'a str) -> &'a str {
        self.sensors
            .get(sensor_id)
            .and_then(|s| s.label.as_deref())
            .unwrap_or(sensor_id)
    }

    /// Unit shown for a group: that of its first sensor.
    pub fn group_unit(&self, group: &SensorGroup) -> &str {
        group
            .sensors
            .first()
            .and_then(|id| self.sensors.get(id))
            .map(|s| s.unit.as_str())
            .unwrap_or("")
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.storage.path.is_empty(),
            "storage.path must be non-empty"
        );
        anyhow::ensure!(!self.storage.key.is_empty(), "storage.key must be non-empty");
        anyhow::ensure!(
            self.retention.window_hours > 0,
            "retention.window_hours must be > 0, got {}",
            self.retention.window_hours
        );
        anyhow::ensure!(
            self.retention.max_entries > 0,
            "retention.max_entries must be > 0, got {}",
            self.retention.max_entries
        );
        anyhow::ensure!(
            self.schedule.period_minutes > 0 && 60 % self.schedule.period_minutes == 0,
            "schedule.period_minutes must divide 60, got {}",
            self.schedule.period_minutes
        );
        anyhow::ensure!(
            self.collector.request_timeout_secs > 0,
            "collector.request_timeout_secs must be > 0, got {}",
            self.collector.request_timeout_secs
        );
        anyhow::ensure!(
            self.display.decimals <= 6,
            "display.decimals must be <= 6, got {}",
            self.display.decimals
        );
        anyhow::ensure!(
            self.display.chart_hours > 0 && self.display.chart_hours <= self.retention.window_hours,
            "display.chart_hours must be between 1 and retention.window_hours ({}), got {}",
            self.retention.window_hours,
            self.display.chart_hours
        );
        anyhow::ensure!(
            self.display.broadcast_capacity > 0,
            "display.broadcast_capacity must be > 0, got {}",
            self.display.broadcast_capacity
        );
        anyhow::ensure!(
            !self.sensors.is_empty(),
            "sensors must configure at least one sensor"
        );
        for (id, sensor) in &self.sensors {
            anyhow::ensure!(
                !sensor.endpoint.url.is_empty(),
                "sensors.{}.url must be non-empty",
                id
            );
            anyhow::ensure!(
                !sensor.endpoint.field.is_empty(),
                "sensors.{}.field must be non-empty",
                id
            );
        }

        let mut names = HashSet::new();
        for group in &self.groups {
            anyhow::ensure!(!group.name.is_empty(), "groups.name must be non-empty");
            anyhow::ensure!(
                names.insert(group.name.as_str()),
                "groups.name '{}' is duplicated",
                group.name
            );
            anyhow::ensure!(
                !group.sensors.is_empty(),
                "groups.{}.sensors must be non-empty",
                group.name
            );
            let mut members = HashSet::new();
            for id in &group.sensors {
                anyhow::ensure!(
                    self.sensors.contains_key(id),
                    "groups.{}.sensors references unknown sensor '{}'",
                    group.name,
                    id
                );
                anyhow::ensure!(
                    members.insert(id.as_str()),
                    "groups.{}.sensors lists '{}' twice",
                    group.name,
                    id
                );
            }
        }
        Ok(())
    }
}

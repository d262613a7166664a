// Static sensor configuration records.

use serde::{Deserialize, Serialize};

fn default_field() -> String {
    "temperature".into()
}

/// Where to read one sensor: a URL answering with a JSON object, and the name of
/// the numeric field holding the reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEndpoint {
    pub url: String,
    #[serde(default = "default_field")]
    pub field: String,
}

/// Named, fixed subset of sensor ids averaged together for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorGroup {
    pub name: String,
    #[serde(default)]
    pub label: String,
    pub sensors: Vec<String>,
}

impl SensorGroup {
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

// HTTP transport for sensor endpoints (reqwest).

use std::time::Duration;

use async_trait::async_trait;

use super::{SensorFetchError, SensorSource};
use crate::models::SensorEndpoint;

pub struct HttpSensorSource {
    client: reqwest::Client,
}

impl HttpSensorSource {
    pub fn new(request_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SensorSource for HttpSensorSource {
    async fn fetch(&self, endpoint: &SensorEndpoint) -> Result<serde_json::Value, SensorFetchError> {
        // reqwest errors carry the URL, which holds the access token; keep it out of logs.
        let resp = self
            .client
            .get(&endpoint.url)
            .send()
            .await
            .map_err(|e| SensorFetchError::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SensorFetchError::Status(status.as_u16()));
        }
        resp.json::<serde_json::Value>()
            .await
            .map_err(|_| SensorFetchError::InvalidBody)
    }
}

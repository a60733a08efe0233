use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{ActuatorDriver, DriverResponse};
use crate::error::{PnaError, Result};
use crate::types::{DeviceClass, ParameterSet};

/// Talks to the actuator bridge over HTTP.
///
/// Each invocation is a `POST {base_url}/{device}/{operation}` with the
/// resolved parameters as a flat JSON object. The bridge answers with
/// `{"status": "ok" | "sent" | "error", "data"?, "message"?}`.
pub struct HttpDriver {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDriver {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PnaError::Io(std::io::Error::other(e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, device: DeviceClass, operation: &str) -> String {
        format!("{}/{}/{}", self.base_url, device, operation)
    }
}

#[async_trait]
impl ActuatorDriver for HttpDriver {
    async fn invoke(
        &self,
        device: DeviceClass,
        operation: &str,
        params: &ParameterSet,
    ) -> Result<DriverResponse> {
        let url = self.url(device, operation);
        debug!(%url, params = %params.summary(), "posting to actuator bridge");

        let resp = self
            .client
            .post(&url)
            .json(params)
            .send()
            .await
            .map_err(|e| PnaError::actuator(device, operation, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let hint = body.chars().take(200).collect::<String>();
            return Err(PnaError::actuator(
                device,
                operation,
                format!("bridge returned HTTP {status}: {hint}"),
            ));
        }

        let reply: DriverResponse = resp
            .json()
            .await
            .map_err(|e| PnaError::actuator(device, operation, format!("bad reply: {e}")))?;
        reply.into_result(device, operation)
    }
}

//! Request/response boundary to the physical actuators.
//!
//! Every device operation, primitive or not, ends up as a single
//! `invoke(device, operation, params)` call on an [`ActuatorDriver`]. The
//! core never looks below this boundary: how the bridge reaches the serial
//! port or the ESP32 is its own business.
//!
//! Two drivers ship with the crate:
//! - [`HttpDriver`] posts JSON to the actuator bridge service.
//! - [`SimulatedDriver`] answers in-process with configurable latency and
//!   failures; it backs `--simulate` and the test suites.

pub mod http;
pub mod sim;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::DriverConfig;
use crate::error::{PnaError, Result};
use crate::types::{DeviceClass, ParameterSet};

pub use http::HttpDriver;
pub use sim::{SimCall, SimulatedDriver};

/// Reply from an actuator bridge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DriverResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "message")]
    pub error: Option<String>,
}

impl DriverResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".into(),
            ..Default::default()
        }
    }

    pub fn with_data(data: serde_json::Value) -> Self {
        Self {
            status: "ok".into(),
            data: Some(data),
            error: None,
        }
    }

    /// Bridges answer `ok` for completed moves and `sent` for fire-and-forget
    /// commands; both count as success.
    pub fn is_success(&self) -> bool {
        matches!(self.status.as_str(), "ok" | "sent")
    }

    /// Convert a non-success reply into an `ActuatorError`.
    pub fn into_result(self, device: DeviceClass, operation: &str) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let message = self
            .error
            .clone()
            .unwrap_or_else(|| format!("bridge reported status '{}'", self.status));
        Err(PnaError::actuator(device, operation, message))
    }
}

#[async_trait]
pub trait ActuatorDriver: Send + Sync {
    async fn invoke(
        &self,
        device: DeviceClass,
        operation: &str,
        params: &ParameterSet,
    ) -> Result<DriverResponse>;
}

/// Build the driver selected in the project config.
pub fn from_config(cfg: &DriverConfig) -> Result<Arc<dyn ActuatorDriver>> {
    match cfg {
        DriverConfig::Simulated { latency_ms } => Ok(Arc::new(
            SimulatedDriver::new().with_default_latency(std::time::Duration::from_millis(
                *latency_ms,
            )),
        )),
        DriverConfig::Http {
            base_url,
            timeout_secs,
        } => Ok(Arc::new(HttpDriver::new(
            base_url,
            std::time::Duration::from_secs(*timeout_secs),
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_counts_as_success() {
        let r = DriverResponse {
            status: "sent".into(),
            ..Default::default()
        };
        assert!(r.into_result(DeviceClass::Arm, "goto").is_ok());
    }

    #[test]
    fn error_status_becomes_actuator_error() {
        let r: DriverResponse =
            serde_json::from_str(r#"{"status": "error", "message": "not connected"}"#).unwrap();
        let err = r.into_result(DeviceClass::Gripper, "close").unwrap_err();
        match err {
            PnaError::ActuatorError {
                device, message, ..
            } => {
                assert_eq!(device, "gripper");
                assert_eq!(message, "not connected");
            }
            other => panic!("expected ActuatorError, got {other:?}"),
        }
    }
}

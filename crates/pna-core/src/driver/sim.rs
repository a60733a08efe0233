use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use super::{ActuatorDriver, DriverResponse};
use crate::error::{PnaError, Result};
use crate::types::{DeviceClass, OperationKey, ParameterSet};

/// One invocation seen by the simulator.
#[derive(Debug, Clone)]
pub struct SimCall {
    /// Position in the overall call stream, counting from 0.
    pub seq: u64,
    pub key: OperationKey,
    pub params: ParameterSet,
    pub started_at: Instant,
    pub finished_at: Option<Instant>,
}

/// In-process stand-in for the actuator bridge.
///
/// Every call sleeps for its configured latency and then succeeds, unless a
/// failure was scripted for that key. The call log keeps start/finish
/// instants so tests can check concurrency and ordering; it holds the most
/// recent [`CALL_LOG_CAPACITY`] calls so `serve --simulate` stays bounded.
pub struct SimulatedDriver {
    default_latency: Duration,
    latency: HashMap<OperationKey, Duration>,
    fail_after: HashMap<OperationKey, (Duration, String)>,
    log_capacity: usize,
    calls: Mutex<VecDeque<SimCall>>,
}

pub const CALL_LOG_CAPACITY: usize = 1024;

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self {
            default_latency: Duration::ZERO,
            latency: HashMap::new(),
            fail_after: HashMap::new(),
            log_capacity: CALL_LOG_CAPACITY,
            calls: Mutex::new(VecDeque::new()),
        }
    }
}

impl SimulatedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` calls in the log (at least one).
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity.max(1);
        self
    }

    pub fn with_default_latency(mut self, latency: Duration) -> Self {
        self.default_latency = latency;
        self
    }

    pub fn with_latency(
        mut self,
        device: DeviceClass,
        operation: &str,
        latency: Duration,
    ) -> Self {
        self.latency
            .insert(OperationKey::new(device, operation), latency);
        self
    }

    /// Make `device.operation` fail with `message` after `after` has elapsed.
    pub fn failing(
        mut self,
        device: DeviceClass,
        operation: &str,
        after: Duration,
        message: impl Into<String>,
    ) -> Self {
        self.fail_after.insert(
            OperationKey::new(device, operation),
            (after, message.into()),
        );
        self
    }

    pub fn calls(&self) -> Vec<SimCall> {
        self.calls.lock().iter().cloned().collect()
    }

    pub fn call_keys(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.key.to_string()).collect()
    }
}

#[async_trait]
impl ActuatorDriver for SimulatedDriver {
    async fn invoke(
        &self,
        device: DeviceClass,
        operation: &str,
        params: &ParameterSet,
    ) -> Result<DriverResponse> {
        let key = OperationKey::new(device, operation);
        let seq = {
            let mut calls = self.calls.lock();
            let seq = calls.back().map_or(0, |c| c.seq + 1);
            if calls.len() >= self.log_capacity {
                calls.pop_front();
            }
            calls.push_back(SimCall {
                seq,
                key: key.clone(),
                params: params.clone(),
                started_at: Instant::now(),
                finished_at: None,
            });
            seq
        };
        info!(device = %device, operation, params = %params.summary(), "simulated actuator call");

        let outcome = if let Some((after, message)) = self.fail_after.get(&key) {
            tokio::time::sleep(*after).await;
            Err(PnaError::actuator(device, operation, message.clone()))
        } else {
            let latency = self
                .latency
                .get(&key)
                .copied()
                .unwrap_or(self.default_latency);
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            Ok(DriverResponse::with_data(serde_json::json!({
                "device": device.as_str(),
                "operation": operation,
            })))
        };

        if let Some(call) = self.calls.lock().iter_mut().rev().find(|c| c.seq == seq) {
            call.finished_at = Some(Instant::now());
        }
        outcome
    }
}

//! Operation registry: the static table behind every dispatch.
//!
//! Maps `(DeviceClass, operation)` to a handler and the operation's default
//! parameter template. Built once at startup and shared as
//! `Arc<OperationRegistry>`; nothing mutates it afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::composite::{ScrewDirection, ScrewMotion};
use crate::driver::{ActuatorDriver, DriverResponse};
use crate::error::{PnaError, Result};
use crate::types::{DeviceClass, OperationKey, ParamValue, ParameterSet};

// ---------------------------------------------------------------------------
// Handler seam
// ---------------------------------------------------------------------------

/// What a handler gets to work with: the registry (for composites that fan
/// out to other operations) and the actuator driver.
#[derive(Clone)]
pub struct DispatchContext {
    pub registry: Arc<OperationRegistry>,
    pub driver: Arc<dyn ActuatorDriver>,
}

#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn call(
        &self,
        ctx: &DispatchContext,
        key: &OperationKey,
        params: ParameterSet,
    ) -> Result<DriverResponse>;

    fn is_composite(&self) -> bool {
        false
    }
}

/// Primitive operation: one request to the actuator bridge.
pub struct Forward;

#[async_trait]
impl OperationHandler for Forward {
    async fn call(
        &self,
        ctx: &DispatchContext,
        key: &OperationKey,
        params: ParameterSet,
    ) -> Result<DriverResponse> {
        ctx.driver.invoke(key.device, &key.operation, &params).await
    }
}

// ---------------------------------------------------------------------------
// OperationRegistry
// ---------------------------------------------------------------------------

pub struct OperationEntry {
    pub handler: Arc<dyn OperationHandler>,
    pub defaults: ParameterSet,
}

/// Serializable view of one registered operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationInfo {
    pub device: DeviceClass,
    pub operation: String,
    pub composite: bool,
    pub defaults: ParameterSet,
}

#[derive(Default)]
pub struct OperationRegistry {
    entries: HashMap<OperationKey, OperationEntry>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        device: DeviceClass,
        operation: impl Into<String>,
        handler: Arc<dyn OperationHandler>,
        defaults: ParameterSet,
    ) -> Result<()> {
        let key = OperationKey::new(device, operation);
        if self.entries.contains_key(&key) {
            return Err(PnaError::DuplicateOperation {
                device: key.device.to_string(),
                operation: key.operation,
            });
        }
        self.entries.insert(key, OperationEntry { handler, defaults });
        Ok(())
    }

    pub fn lookup(&self, device: DeviceClass, operation: &str) -> Result<&OperationEntry> {
        self.entries
            .get(&OperationKey::new(device, operation))
            .ok_or_else(|| PnaError::UnknownOperation {
                device: device.to_string(),
                operation: operation.to_string(),
            })
    }

    /// Merge `supplied` over the operation's template. Bounds checking is the
    /// handler's job, not ours.
    pub fn resolve_params(
        &self,
        device: DeviceClass,
        operation: &str,
        supplied: &ParameterSet,
    ) -> Result<ParameterSet> {
        let entry = self.lookup(device, operation)?;
        Ok(supplied.merged_over(&entry.defaults))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All registered operations, sorted by device then name.
    pub fn operations(&self) -> Vec<OperationInfo> {
        let mut out: Vec<OperationInfo> = self
            .entries
            .iter()
            .map(|(k, e)| OperationInfo {
                device: k.device,
                operation: k.operation.clone(),
                composite: e.handler.is_composite(),
                defaults: e.defaults.clone(),
            })
            .collect();
        out.sort_by(|a, b| (a.device, &a.operation).cmp(&(b.device, &b.operation)));
        out
    }

    /// The built-in operation catalogue for the cell's four device classes.
    pub fn standard() -> Result<Self> {
        let mut reg = Self::new();
        let fwd: Arc<dyn OperationHandler> = Arc::new(Forward);

        let axes = |speed: i64| {
            ParameterSet::new()
                .with("x", 0)
                .with("y", 0)
                .with("z", 0)
                .with("a", 0)
                .with("speed", speed)
        };
        reg.register(DeviceClass::Rig, "goto", fwd.clone(), axes(2000))?;
        reg.register(DeviceClass::Rig, "step", fwd.clone(), axes(1000))?;
        reg.register(
            DeviceClass::Rig,
            "unlock",
            fwd.clone(),
            ParameterSet::new().with("time_s", 5),
        )?;
        reg.register(
            DeviceClass::Rig,
            "attach",
            fwd.clone(),
            ParameterSet::new().with("tool", ""),
        )?;
        reg.register(
            DeviceClass::Rig,
            "detach",
            fwd.clone(),
            ParameterSet::new().with("holder", ""),
        )?;

        let joints = || {
            (1..=6)
                .map(|i| (format!("j{i}"), ParamValue::Int(0)))
                .collect::<ParameterSet>()
                .with("speed", 50)
        };
        reg.register(DeviceClass::Arm, "goto", fwd.clone(), joints())?;
        reg.register(DeviceClass::Arm, "step", fwd.clone(), joints())?;

        let timed = || ParameterSet::new().with("time_s", 1).with("speed", 1000);
        reg.register(DeviceClass::Gripper, "open", fwd.clone(), timed())?;
        reg.register(DeviceClass::Gripper, "close", fwd.clone(), timed())?;
        reg.register(
            DeviceClass::Gripper,
            "goto",
            fwd.clone(),
            ParameterSet::new()
                .with("position", 1000)
                .with("load_limit", 100)
                .with("speed", 1000),
        )?;
        reg.register(
            DeviceClass::Gripper,
            "setSpeed",
            fwd.clone(),
            ParameterSet::new().with("speed", 1000),
        )?;
        reg.register(DeviceClass::Gripper, "speedUp", fwd.clone(), ParameterSet::new())?;
        reg.register(DeviceClass::Gripper, "speedDown", fwd.clone(), ParameterSet::new())?;

        let spin = || ParameterSet::new().with("duration", 0.5).with("speed", 100);
        reg.register(DeviceClass::Screwdriver, "cw", fwd.clone(), spin())?;
        reg.register(DeviceClass::Screwdriver, "ccw", fwd.clone(), spin())?;
        reg.register(DeviceClass::Screwdriver, "stop", fwd, ParameterSet::new())?;

        let thread = || {
            ParameterSet::new()
                .with("threadPitch", 0.5)
                .with("depth", 5)
                .with("rotPs", 1)
        };
        reg.register(
            DeviceClass::Screwdriver,
            "screwIn",
            Arc::new(ScrewMotion::new(ScrewDirection::In)),
            thread(),
        )?;
        reg.register(
            DeviceClass::Screwdriver,
            "screwOut",
            Arc::new(ScrewMotion::new(ScrewDirection::Out)),
            thread(),
        )?;

        Ok(reg)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

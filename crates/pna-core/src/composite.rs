//! Composite operations: several primitives issued together, joined as one.
//!
//! The screwdriver's `screwIn`/`screwOut` turn the spindle while the rig
//! feeds the head along Z at the matching rate, producing a helical path.
//! Both halves must start together; the composite is done only when both
//! are. A failure in one half does not stop the other, since the hardware
//! may already be moving.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::driver::DriverResponse;
use crate::error::{PnaError, Result};
use crate::registry::{DispatchContext, OperationHandler};
use crate::types::{DeviceClass, OperationKey, ParameterSet};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Derived motion for a threaded fastener.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrewGeometry {
    /// Spindle turns needed to travel `depth`.
    pub rotations: f64,
    /// Seconds the spindle runs at the requested rotational speed.
    pub duration: f64,
    /// Z feed rate in mm/min that keeps pace with the thread.
    pub linear_speed: f64,
}

impl ScrewGeometry {
    pub fn derive(thread_pitch: f64, depth: f64, rot_ps: f64) -> Result<Self> {
        if !thread_pitch.is_finite() || !depth.is_finite() || !rot_ps.is_finite() {
            return Err(PnaError::InvalidGeometry(
                "thread pitch, depth and rotational speed must be finite".into(),
            ));
        }
        if thread_pitch <= 0.0 {
            return Err(PnaError::InvalidGeometry(format!(
                "thread pitch must be positive, got {thread_pitch}"
            )));
        }
        if rot_ps <= 0.0 {
            return Err(PnaError::InvalidGeometry(format!(
                "rotational speed must be positive, got {rot_ps}"
            )));
        }
        let rotations = depth / thread_pitch;
        Ok(Self {
            rotations,
            duration: rotations / rot_ps,
            linear_speed: thread_pitch * rot_ps * 60.0,
        })
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// One leg of a composite.
#[derive(Debug, Clone)]
pub struct SubInvocation {
    pub device: DeviceClass,
    pub operation: String,
    pub params: ParameterSet,
}

impl SubInvocation {
    pub fn new(device: DeviceClass, operation: impl Into<String>, params: ParameterSet) -> Self {
        Self {
            device,
            operation: operation.into(),
            params,
        }
    }
}

/// Issue every sub-invocation at once and wait for all of them.
///
/// All keys are resolved before anything is issued, so a bad key never
/// leaves half a composite running. Each leg runs as its own task; dropping
/// the returned future detaches the legs rather than aborting them. The
/// first error in completion order is returned once every leg has finished.
pub async fn run_composite(ctx: &DispatchContext, subs: Vec<SubInvocation>) -> Result<()> {
    let mut legs = Vec::with_capacity(subs.len());
    for sub in subs {
        let entry = ctx.registry.lookup(sub.device, &sub.operation)?;
        let params = sub.params.merged_over(&entry.defaults);
        legs.push((
            OperationKey::new(sub.device, sub.operation),
            Arc::clone(&entry.handler),
            params,
        ));
    }

    // Spawn back-to-back, no await in between.
    let mut pending = FuturesUnordered::new();
    for (key, handler, params) in legs {
        let leg_ctx = ctx.clone();
        let leg_key = key.clone();
        let handle =
            tokio::spawn(async move { handler.call(&leg_ctx, &leg_key, params).await });
        pending.push(async move { (key, handle.await) });
    }

    let mut first_err: Option<PnaError> = None;
    while let Some((key, joined)) = pending.next().await {
        let outcome = match joined {
            Ok(r) => r.map(|_| ()),
            Err(e) => Err(PnaError::actuator(
                key.device,
                key.operation.clone(),
                format!("sub-operation task failed: {e}"),
            )),
        };
        if let Err(e) = outcome {
            warn!(leg = %key, error = %e, "composite leg failed");
            if first_err.is_none() {
                first_err = Some(e);
            }
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// ScrewMotion handler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrewDirection {
    In,
    Out,
}

/// Handler for `screwdriver.screwIn` / `screwdriver.screwOut`.
pub struct ScrewMotion {
    direction: ScrewDirection,
}

impl ScrewMotion {
    pub fn new(direction: ScrewDirection) -> Self {
        Self { direction }
    }

    /// The two legs for a given geometry: spindle rotation and Z feed.
    pub fn legs(&self, geometry: &ScrewGeometry, depth: f64, rot_ps: f64) -> Vec<SubInvocation> {
        let (spin, z) = match self.direction {
            ScrewDirection::In => ("cw", -depth),
            ScrewDirection::Out => ("ccw", depth),
        };
        vec![
            SubInvocation::new(
                DeviceClass::Screwdriver,
                spin,
                ParameterSet::new()
                    .with("duration", geometry.duration)
                    .with("speed", rot_ps),
            ),
            SubInvocation::new(
                DeviceClass::Rig,
                "step",
                ParameterSet::new()
                    .with("x", 0)
                    .with("y", 0)
                    .with("z", z)
                    .with("a", 0)
                    .with("speed", geometry.linear_speed),
            ),
        ]
    }
}

fn required(params: &ParameterSet, key: &str) -> Result<f64> {
    params
        .get_f64(key)
        .ok_or_else(|| PnaError::InvalidGeometry(format!("missing or non-numeric '{key}'")))
}

#[async_trait]
impl OperationHandler for ScrewMotion {
    async fn call(
        &self,
        ctx: &DispatchContext,
        key: &OperationKey,
        params: ParameterSet,
    ) -> Result<DriverResponse> {
        let pitch = required(&params, "threadPitch")?;
        let depth = required(&params, "depth")?;
        let rot_ps = required(&params, "rotPs")?;
        let geometry = ScrewGeometry::derive(pitch, depth, rot_ps)?;

        info!(
            op = %key,
            rotations = geometry.rotations,
            duration = geometry.duration,
            linear_speed = geometry.linear_speed,
            "running screw motion"
        );
        run_composite(ctx, self.legs(&geometry, depth, rot_ps)).await?;
        Ok(DriverResponse::with_data(serde_json::to_value(geometry)?))
    }

    fn is_composite(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! The recording interceptor that sits between every caller and the registry.
//!
//! Callers (operator actions, the job runner, macro replay) only ever go
//! through [`Dispatcher::dispatch`]. It resolves the key, merges parameters,
//! appends a record if a macro is being captured and only then invokes the
//! handler. A macro therefore logs what was commanded, not what succeeded:
//! the record stays even if the handler fails.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::driver::{ActuatorDriver, DriverResponse};
use crate::error::Result;
use crate::recorder::{InvocationRecord, MacroRecorder};
use crate::registry::{DispatchContext, OperationRegistry};
use crate::types::{DeviceClass, OperationKey, ParameterSet};

/// Outcome of replaying a macro.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub total: usize,
    pub completed: usize,
    /// Sequence id and message of the invocation that stopped the replay.
    pub failed_at: Option<(u64, String)>,
}

#[derive(Clone)]
pub struct Dispatcher {
    ctx: DispatchContext,
    recorder: MacroRecorder,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<OperationRegistry>,
        driver: Arc<dyn ActuatorDriver>,
        recorder: MacroRecorder,
    ) -> Self {
        Self {
            ctx: DispatchContext { registry, driver },
            recorder,
        }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.ctx.registry
    }

    pub fn recorder(&self) -> &MacroRecorder {
        &self.recorder
    }

    pub async fn dispatch(
        &self,
        device: DeviceClass,
        operation: &str,
        params: &ParameterSet,
    ) -> Result<DriverResponse> {
        let registry = &self.ctx.registry;
        let handler = Arc::clone(&registry.lookup(device, operation)?.handler);
        let resolved = registry.resolve_params(device, operation, params)?;

        let seq = self.recorder.add(device, operation, &resolved);
        info!(
            device = %device,
            operation,
            recorded = seq.is_some(),
            params = %resolved.summary(),
            "dispatch"
        );

        let key = OperationKey::new(device, operation);
        let result = handler.call(&self.ctx, &key, resolved).await;
        if let Err(e) = &result {
            warn!(op = %key, error = %e, "dispatch failed");
        }
        result
    }

    /// Dispatch a loaded macro step by step, stopping at the first failure.
    pub async fn replay(&self, records: &[InvocationRecord]) -> ReplayReport {
        let mut report = ReplayReport {
            total: records.len(),
            completed: 0,
            failed_at: None,
        };
        for rec in records {
            match self
                .dispatch(rec.device_class, &rec.operation, &rec.params)
                .await
            {
                Ok(_) => report.completed += 1,
                Err(e) => {
                    report.failed_at = Some((rec.sequence_id, e.to_string()));
                    break;
                }
            }
        }
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

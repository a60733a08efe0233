use axum::extract::{Path, State};
use axum::Json;
use pna_core::driver::DriverResponse;
use pna_core::registry::OperationInfo;
use pna_core::types::{DeviceClass, ParameterSet};

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/operations — the registered catalogue with default templates.
pub async fn list_operations(State(app): State<AppState>) -> Json<Vec<OperationInfo>> {
    Json(app.dispatcher.registry().operations())
}

/// POST /api/dispatch/{device}/{operation} — one operator action.
///
/// The body is the (possibly partial) parameter set; it is merged over the
/// operation's template before the call.
pub async fn dispatch(
    State(app): State<AppState>,
    Path((device, operation)): Path<(String, String)>,
    Json(params): Json<ParameterSet>,
) -> Result<Json<DriverResponse>, AppError> {
    let device: DeviceClass = device.parse()?;
    let reply = app.dispatcher.dispatch(device, &operation, &params).await?;
    Ok(Json(reply))
}

use axum::extract::State;
use axum::Json;
use pna_core::recorder::{RecorderStatus, StopOutcome};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct MacroPathBody {
    /// Macro name (stored under the macros dir) or a root-relative path.
    #[serde(default)]
    pub path: Option<String>,
}

fn default_macro_name() -> String {
    format!("macro-{}", chrono::Local::now().format("%Y%m%d-%H%M%S"))
}

/// GET /api/recorder — session state and what has been captured so far.
pub async fn get_recorder(State(app): State<AppState>) -> Json<serde_json::Value> {
    let recorder = app.dispatcher.recorder();
    Json(serde_json::json!({
        "status": recorder.status(),
        "records": recorder.snapshot(),
    }))
}

/// POST /api/recorder/start — begin capturing every dispatch.
pub async fn start_recording(
    State(app): State<AppState>,
    Json(body): Json<MacroPathBody>,
) -> Result<Json<RecorderStatus>, AppError> {
    let name = body.path.unwrap_or_else(default_macro_name);
    let dest = app.macro_path(&name);
    let recorder = app.dispatcher.recorder().clone();
    let status = tokio::task::spawn_blocking(move || {
        recorder.start(&dest)?;
        Ok::<_, pna_core::PnaError>(recorder.status())
    })
    .await
    .map_err(AppError::join)??;
    Ok(Json(status))
}

/// POST /api/recorder/stop — end the session and write the macro file.
pub async fn stop_recording(State(app): State<AppState>) -> Result<Json<StopOutcome>, AppError> {
    let recorder = app.dispatcher.recorder().clone();
    let outcome = tokio::task::spawn_blocking(move || recorder.stop())
        .await
        .map_err(AppError::join)?;
    Ok(Json(outcome))
}

/// POST /api/recorder/clear — drop captured records, keep the session state.
pub async fn clear_recording(State(app): State<AppState>) -> Json<RecorderStatus> {
    let recorder = app.dispatcher.recorder();
    recorder.clear();
    Json(recorder.status())
}

/// POST /api/recorder/save — write the current capture without stopping.
pub async fn save_recording(
    State(app): State<AppState>,
    Json(body): Json<MacroPathBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Some(name) = body.path else {
        return Err(AppError::bad_request("path is required"));
    };
    let dest = app.macro_path(&name);
    let recorder = app.dispatcher.recorder().clone();
    let result = tokio::task::spawn_blocking(move || {
        let count = recorder.save_to(&dest)?;
        Ok::<_, pna_core::PnaError>(serde_json::json!({
            "saved_to": dest,
            "count": count,
        }))
    })
    .await
    .map_err(AppError::join)??;
    Ok(Json(result))
}

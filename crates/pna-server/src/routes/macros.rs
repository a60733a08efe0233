use axum::extract::State;
use axum::Json;
use pna_core::dispatch::ReplayReport;
use pna_core::macro_file;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct MacroFileBody {
    pub path: String,
}

/// POST /api/macros/load — append a macro's steps to the job queue.
pub async fn load_into_queue(
    State(app): State<AppState>,
    Json(body): Json<MacroFileBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let path = app.macro_path(&body.path);
    let db = app.runner.db().clone();
    let result = tokio::task::spawn_blocking(move || {
        let records = macro_file::load(&path)?;
        let jobs = db.import(&records)?;
        tracing::info!(path = %path.display(), count = jobs.len(), "macro loaded into queue");
        Ok::<_, pna_core::PnaError>(serde_json::json!({
            "imported": jobs.len(),
            "jobs": jobs,
        }))
    })
    .await
    .map_err(AppError::join)??;
    Ok(Json(result))
}

/// POST /api/macros/replay — dispatch a macro's steps directly, in order.
pub async fn replay(
    State(app): State<AppState>,
    Json(body): Json<MacroFileBody>,
) -> Result<Json<ReplayReport>, AppError> {
    let path = app.macro_path(&body.path);
    let records = tokio::task::spawn_blocking(move || macro_file::load(&path))
        .await
        .map_err(AppError::join)??;
    Ok(Json(app.dispatcher.replay(&records).await))
}

/// GET /api/macros — macro files in the macros dir.
pub async fn list_macros(State(app): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let dir = app.macros_dir();
    let names = tokio::task::spawn_blocking(move || macro_file::list(&dir))
        .await
        .map_err(AppError::join)??;
    Ok(Json(names))
}

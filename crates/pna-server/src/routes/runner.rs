use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

async fn snapshot(app: &AppState) -> Result<serde_json::Value, AppError> {
    let progress = app.runner.progress().await?;
    Ok(serde_json::json!({
        "state": app.runner.state(),
        "progress": progress,
        "ratio": progress.ratio(),
    }))
}

/// GET /api/runner — queue state and progress.
pub async fn get_runner(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(snapshot(&app).await?))
}

/// POST /api/runner/step — run the next `ToDo` job once.
pub async fn step(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let job = app.runner.step().await?;
    let mut body = snapshot(&app).await?;
    body["job"] = serde_json::to_value(job)?;
    Ok(Json(body))
}

/// POST /api/runner/run — start draining the queue in the background.
pub async fn run(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let started = app.runner.run();
    let mut body = snapshot(&app).await?;
    body["started"] = serde_json::json!(started);
    Ok(Json(body))
}

/// POST /api/runner/stop
pub async fn stop(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    app.runner.stop();
    Ok(Json(snapshot(&app).await?))
}

/// POST /api/runner/reset — every job back to `ToDo`.
pub async fn reset(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let changed = app.runner.reset().await?;
    let mut body = snapshot(&app).await?;
    body["reset"] = serde_json::json!(changed);
    Ok(Json(body))
}

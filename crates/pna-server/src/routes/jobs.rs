use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use pna_core::queue::{Job, JobPage, JobUpdate};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct ListQuery {
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET /api/jobs?filter&offset&limit — paged job table.
pub async fn list_jobs(
    State(app): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<JobPage>, AppError> {
    let db = app.runner.db().clone();
    let page = tokio::task::spawn_blocking(move || db.list(q.filter.as_deref(), q.offset, q.limit))
        .await
        .map_err(AppError::join)??;
    Ok(Json(page))
}

/// POST /api/jobs — append a blank job.
pub async fn create_job(
    State(app): State<AppState>,
) -> Result<(StatusCode, Json<Job>), AppError> {
    let db = app.runner.db().clone();
    let job = tokio::task::spawn_blocking(move || db.create())
        .await
        .map_err(AppError::join)??;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/jobs/{id}
pub async fn get_job(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Job>, AppError> {
    let db = app.runner.db().clone();
    let job = tokio::task::spawn_blocking(move || db.get(id))
        .await
        .map_err(AppError::join)??;
    Ok(Json(job))
}

/// PUT /api/jobs/{id} — edit device, operation, params or status.
pub async fn update_job(
    State(app): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<JobUpdate>,
) -> Result<Json<Job>, AppError> {
    let db = app.runner.db().clone();
    let dispatcher = app.dispatcher.clone();
    let job = tokio::task::spawn_blocking(move || {
        let mut job = db.get(id)?;
        body.apply_with_template(&mut job, dispatcher.registry());
        db.update(&job)
    })
    .await
    .map_err(AppError::join)??;
    Ok(Json(job))
}

/// DELETE /api/jobs/{id}
pub async fn delete_job(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    let db = app.runner.db().clone();
    tokio::task::spawn_blocking(move || db.delete(id))
        .await
        .map_err(AppError::join)??;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/jobs/{id}/run — run one job now, whatever its status.
pub async fn run_job(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Job>, AppError> {
    let job = app.runner.run_one(id).await?;
    Ok(Json(job))
}

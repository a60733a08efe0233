pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and by the integration tests.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Events (SSE)
        .route("/api/events", get(routes::events::sse_events))
        // Operations
        .route("/api/operations", get(routes::operations::list_operations))
        .route(
            "/api/dispatch/{device}/{operation}",
            post(routes::operations::dispatch),
        )
        // Recorder
        .route("/api/recorder", get(routes::recorder::get_recorder))
        .route(
            "/api/recorder/start",
            post(routes::recorder::start_recording),
        )
        .route("/api/recorder/stop", post(routes::recorder::stop_recording))
        .route(
            "/api/recorder/clear",
            post(routes::recorder::clear_recording),
        )
        .route("/api/recorder/save", post(routes::recorder::save_recording))
        // Jobs
        .route(
            "/api/jobs",
            get(routes::jobs::list_jobs).post(routes::jobs::create_job),
        )
        .route(
            "/api/jobs/{id}",
            get(routes::jobs::get_job)
                .put(routes::jobs::update_job)
                .delete(routes::jobs::delete_job),
        )
        .route("/api/jobs/{id}/run", post(routes::jobs::run_job))
        // Runner
        .route("/api/runner", get(routes::runner::get_runner))
        .route("/api/runner/step", post(routes::runner::step))
        .route("/api/runner/run", post(routes::runner::run))
        .route("/api/runner/stop", post(routes::runner::stop))
        .route("/api/runner/reset", post(routes::runner::reset))
        // Macros
        .route("/api/macros", get(routes::macros::list_macros))
        .route("/api/macros/load", post(routes::macros::load_into_queue))
        .route("/api/macros/replay", post(routes::macros::replay))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the control server on `0.0.0.0:{port}`.
pub async fn serve(app_state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(app_state, listener).await
}

/// Start the control server on a pre-bound listener.
///
/// Lets the caller read the actual port first when binding to port 0.
pub async fn serve_on(
    app_state: AppState,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let runner = app_state.runner.clone();
    let app = build_router(app_state);

    tracing::info!("pna control server listening on http://localhost:{actual_port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down; stopping queue");
            runner.stop();
        })
        .await?;
    Ok(())
}

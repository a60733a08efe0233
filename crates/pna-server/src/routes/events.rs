use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use pna_core::queue::RunnerEvent;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::state::AppState;

fn event_name(ev: &RunnerEvent) -> &'static str {
    match ev {
        RunnerEvent::StateChanged { .. } => "state_changed",
        RunnerEvent::JobStarted { .. } => "job_started",
        RunnerEvent::JobFinished { .. } => "job_finished",
    }
}

/// GET /api/events — SSE stream of runner events.
///
/// A subscriber that falls behind skips the lagged events rather than
/// closing the stream.
pub async fn sse_events(State(app): State<AppState>) -> impl axum::response::IntoResponse {
    let rx = app.runner.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| {
        let ev = msg.ok()?;
        Event::default()
            .event(event_name(&ev))
            .json_data(&ev)
            .ok()
            .map(Ok::<Event, Infallible>)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

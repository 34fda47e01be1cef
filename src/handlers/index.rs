use axum::{extract::State, http::header, response::IntoResponse};
use std::sync::Arc;

use crate::probe::ProbeState;
use crate::AppState;

// ─── GET / ───────────────────────────────────────────────────────

/// Plain-text landing page describing what is being probed.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let target = &state.target;
    let probe = match state.probe.state() {
        ProbeState::Sampling => "sampling",
        ProbeState::Stopped => "stopped",
    };

    let body = format!(
        "fs-latency-exporter {}\n\n\
         target:     {}\n\
         size:       {} bytes ({} blocks of {} bytes)\n\
         io mode:    {}\n\
         probe:      {}\n\n\
         metrics:    /metrics\n",
        env!("CARGO_PKG_VERSION"),
        target.path.display(),
        target.len,
        target.len / target.block_size,
        target.block_size,
        target.mode,
        probe,
    );

    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body)
}

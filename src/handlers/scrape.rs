use axum::{extract::State, http::header, response::IntoResponse};
use std::sync::Arc;

use crate::metrics::exposition::CONTENT_TYPE;
use crate::AppState;

// ─── GET /metrics ────────────────────────────────────────────────

/// Current cumulative snapshot in the Prometheus text format.
/// Only takes the registry lock long enough to copy the counters.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], state.metrics.render())
}

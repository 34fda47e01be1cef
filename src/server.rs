use axum::{middleware as axum_mw, routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::ConfigError;
use crate::handlers;
use crate::middleware::timing;
use crate::AppState;

/// Builds the `Router`: the scrape endpoint, a landing page and a 404 fallback.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index::index))
        .route("/metrics", get(handlers::scrape::get_metrics))
        .fallback(handlers::not_found)
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn(timing::timing_middleware))
        .layer(CorsLayer::permissive())
}

/// Binds the metrics listener. Failure here is fatal at startup.
pub async fn bind(addr: &str) -> Result<TcpListener, ConfigError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ConfigError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Serves scrapes on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Serving Prometheus metrics on http://{}/metrics", addr);
    }

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

pub mod index;
pub mod scrape;

use axum::http::StatusCode;

/// Fallback for every unknown path.
pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found\n")
}

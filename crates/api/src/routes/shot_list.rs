use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::pipeline;
use crate::state::AppState;

/// Pipeline routes mounted at `/shot-lists`.
///
/// `generate` and `assemble` run for as long as their batch or render
/// takes and carry no request timeout; the rest are bounded by `timeout`.
pub fn router(timeout: Duration) -> Router<AppState> {
    let bounded = Router::new()
        .route("/{id}/confirm", post(pipeline::confirm))
        .route("/{id}/reset", post(pipeline::reset))
        .route("/{id}/phase", get(pipeline::phase))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ));

    Router::new()
        .route("/{id}/generate", post(pipeline::generate))
        .route("/{id}/assemble", post(pipeline::assemble))
        .merge(bounded)
}

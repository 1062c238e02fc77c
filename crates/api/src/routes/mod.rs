pub mod health;
pub mod shot_list;

use std::time::Duration;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /shot-lists/{id}/generate      run a generation phase (POST)
/// /shot-lists/{id}/confirm       confirm a phase gate (POST)
/// /shot-lists/{id}/reset         rewind to an earlier phase (POST)
/// /shot-lists/{id}/phase         current phase (GET)
/// /shot-lists/{id}/assemble      final cut as video/mp4 (POST)
/// ```
///
/// `timeout` bounds every route except `generate` and `assemble`.
pub fn api_routes(timeout: Duration) -> Router<AppState> {
    Router::new().nest("/shot-lists", shot_list::router(timeout))
}

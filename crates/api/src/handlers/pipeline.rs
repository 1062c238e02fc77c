//! Handlers for the phased generation pipeline.
//!
//! Routes:
//! - `POST /shot-lists/{id}/generate`  run one generation operation
//! - `POST /shot-lists/{id}/confirm`   confirm a phase gate
//! - `POST /shot-lists/{id}/reset`     rewind to an earlier phase
//! - `GET  /shot-lists/{id}/phase`     current derived phase
//! - `POST /shot-lists/{id}/assemble`  assemble clips into one video

use std::future::Future;

use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use storyreel_core::assembly::ClipSpec;
use storyreel_core::phase::{Gate, Phase};
use storyreel_core::types::DbId;
use storyreel_pipeline::generation::SceneResult;
use storyreel_pipeline::gate::ConfirmOutcome;
use storyreel_pipeline::reset::ResetTarget;
use storyreel_pipeline::GenerateRequest;

use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::response::DataResponse;
use crate::state::AppState;

/// Response header carrying the assembled video's duration.
pub const DURATION_HEADER: &str = "x-duration-seconds";
/// Response header carrying the number of assembled clips.
pub const CLIP_COUNT_HEADER: &str = "x-clip-count";

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub gate: Gate,
    pub video_style: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub reset_to: ResetTarget,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub phase: Phase,
}

#[derive(Debug, Serialize)]
pub struct PhaseResponse {
    pub phase: Phase,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssembleRequest {
    /// Defaults to the shot list's completed videos in scene order.
    pub clips: Option<Vec<ClipSpec>>,
    pub music_url: Option<String>,
    pub volume: Option<f32>,
}

/// Run `work` on its own task. A dropped request does not cancel it.
async fn detached<T, E>(work: impl Future<Output = Result<T, E>> + Send + 'static) -> AppResult<T>
where
    T: Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| AppError::InternalError(format!("pipeline task failed: {e}")))?
        .map_err(Into::into)
}

/// POST /api/v1/shot-lists/{id}/generate
///
/// Returns one result per scene attempted. Scene failures are reported in
/// the list, not as an error status. The batch runs to completion even if
/// the client goes away.
pub async fn generate(
    State(state): State<AppState>,
    Path(shot_list_id): Path<DbId>,
    AppJson(input): AppJson<GenerateRequest>,
) -> AppResult<Json<DataResponse<Vec<SceneResult>>>> {
    let pipeline = state.pipeline.clone();
    let results = detached(async move { pipeline.generate(shot_list_id, input).await }).await?;
    Ok(Json(DataResponse { data: results }))
}

/// POST /api/v1/shot-lists/{id}/confirm
pub async fn confirm(
    State(state): State<AppState>,
    Path(shot_list_id): Path<DbId>,
    AppJson(input): AppJson<ConfirmRequest>,
) -> AppResult<Json<DataResponse<ConfirmOutcome>>> {
    let outcome = state
        .pipeline
        .confirm(shot_list_id, input.gate, input.video_style.as_deref())
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /api/v1/shot-lists/{id}/reset
pub async fn reset(
    State(state): State<AppState>,
    Path(shot_list_id): Path<DbId>,
    AppJson(input): AppJson<ResetRequest>,
) -> AppResult<Json<DataResponse<ResetResponse>>> {
    let outcome = state.pipeline.reset(shot_list_id, input.reset_to).await?;
    Ok(Json(DataResponse {
        data: ResetResponse {
            success: true,
            phase: outcome.phase,
        },
    }))
}

/// GET /api/v1/shot-lists/{id}/phase
pub async fn phase(
    State(state): State<AppState>,
    Path(shot_list_id): Path<DbId>,
) -> AppResult<Json<DataResponse<PhaseResponse>>> {
    let phase = state.pipeline.phase(shot_list_id).await?;
    Ok(Json(DataResponse {
        data: PhaseResponse { phase },
    }))
}

/// POST /api/v1/shot-lists/{id}/assemble
///
/// Responds with the final cut as a `video/mp4` body.
pub async fn assemble(
    State(state): State<AppState>,
    Path(shot_list_id): Path<DbId>,
    AppJson(input): AppJson<AssembleRequest>,
) -> AppResult<Response> {
    let pipeline = state.pipeline.clone();
    let output = detached(async move {
        pipeline
            .assemble_shot_list(shot_list_id, input.clips, input.music_url, input.volume)
            .await
    })
    .await?;

    let mut response = output.bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(output.content_type));
    if let Ok(duration) = HeaderValue::from_str(&format!("{:.3}", output.duration_secs)) {
        headers.insert(DURATION_HEADER, duration);
    }
    headers.insert(CLIP_COUNT_HEADER, HeaderValue::from(output.clip_count));
    Ok(response)
}

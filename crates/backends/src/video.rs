//! Video generation backend seam, its HTTP implementation and the bounded
//! poll loop for long-running operations.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use storyreel_core::generation::{DEFAULT_VIDEO_POLL_INTERVAL, DEFAULT_VIDEO_POLL_MAX_ATTEMPTS};

use crate::error::{body_text, is_retryable_status, BackendError};
use crate::image::GenerationOutcome;

/// Handle of an accepted video operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub operation_id: String,
}

/// Where a finished video can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoPayload {
    Bytes(Vec<u8>),
    Uri(String),
}

/// State of a video operation as of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    Done(VideoPayload),
    Failed(String),
}

/// An image-to-video model driven as submit/poll/download.
#[async_trait]
pub trait VideoBackend: Send + Sync {
    /// Identifier recorded in asset metadata.
    fn model_id(&self) -> &str;

    async fn submit(
        &self,
        prompt: &str,
        seed_image: &[u8],
        duration_secs: f64,
    ) -> Result<GenerationOutcome<Submission>, BackendError>;

    async fn poll(&self, submission: &Submission) -> Result<PollStatus, BackendError>;

    async fn download(&self, uri: &str) -> Result<Vec<u8>, BackendError>;
}

// ---------------------------------------------------------------------------
// Poll loop
// ---------------------------------------------------------------------------

/// Fixed-interval polling bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_VIDEO_POLL_INTERVAL,
            max_attempts: DEFAULT_VIDEO_POLL_MAX_ATTEMPTS,
        }
    }
}

/// Poll `submission` until it finishes, fails, or `max_attempts` polls
/// have been spent.
///
/// Exhaustion is reported as [`GenerationOutcome::Rejected`] so that it is
/// not retried. A poll that errors in transport counts as an attempt and
/// polling continues.
pub async fn await_video(
    backend: &dyn VideoBackend,
    submission: &Submission,
    config: &PollConfig,
) -> GenerationOutcome<VideoPayload> {
    let max_attempts = config.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match backend.poll(submission).await {
            Ok(PollStatus::Done(payload)) => {
                tracing::debug!(operation_id = %submission.operation_id, attempt, "Video ready");
                return GenerationOutcome::Generated(payload);
            }
            Ok(PollStatus::Failed(reason)) => {
                return GenerationOutcome::Rejected(reason);
            }
            Ok(PollStatus::Pending) => {}
            Err(e) => {
                tracing::warn!(
                    operation_id = %submission.operation_id,
                    attempt,
                    error = %e,
                    "Video poll failed",
                );
            }
        }
        if attempt < max_attempts {
            tokio::time::sleep(config.interval).await;
        }
    }

    GenerationOutcome::Rejected(format!(
        "video generation timed out after {max_attempts} polls"
    ))
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    operation_id: String,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    status: String,
    video_uri: Option<String>,
    error: Option<String>,
}

/// HTTP client for a video generation service.
///
/// - `POST {base_url}/v1/videos` (multipart `prompt`, `duration_seconds`,
///   `image`) returns `{"operation_id": ...}`.
/// - `GET {base_url}/v1/videos/{operation_id}` returns
///   `{"status": "pending"|"running"|"succeeded"|"failed", "video_uri"?, "error"?}`.
pub struct HttpVideoBackend {
    client: reqwest::Client,
    base_url: String,
    model_id: String,
}

impl HttpVideoBackend {
    pub fn new(base_url: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, model_id)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model_id: model_id.into(),
        }
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Api {
                status: status.as_u16(),
                body: body_text(response).await,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl VideoBackend for HttpVideoBackend {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn submit(
        &self,
        prompt: &str,
        seed_image: &[u8],
        duration_secs: f64,
    ) -> Result<GenerationOutcome<Submission>, BackendError> {
        let form = Form::new()
            .text("prompt", prompt.to_string())
            .text("model", self.model_id.clone())
            .text("duration_seconds", duration_secs.to_string())
            .part("image", Part::bytes(seed_image.to_vec()).file_name("seed"));

        let response = self
            .client
            .post(format!("{}/v1/videos", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() && !is_retryable_status(status) {
            let body = body_text(response).await;
            return Ok(GenerationOutcome::Rejected(format!(
                "video backend refused the request ({status}): {body}"
            )));
        }
        let response = Self::ensure_success(response).await?;
        let body: SubmitResponse = response.json().await?;
        Ok(GenerationOutcome::Generated(Submission {
            operation_id: body.operation_id,
        }))
    }

    async fn poll(&self, submission: &Submission) -> Result<PollStatus, BackendError> {
        let response = self
            .client
            .get(format!("{}/v1/videos/{}", self.base_url, submission.operation_id))
            .send()
            .await?;
        let op: OperationResponse = Self::ensure_success(response).await?.json().await?;

        match op.status.as_str() {
            "pending" | "running" => Ok(PollStatus::Pending),
            "succeeded" => match op.video_uri {
                Some(uri) => Ok(PollStatus::Done(VideoPayload::Uri(uri))),
                None => Err(BackendError::InvalidResponse(
                    "succeeded operation carries no video_uri".to_string(),
                )),
            },
            "failed" => Ok(PollStatus::Failed(
                op.error.unwrap_or_else(|| "video generation failed".to_string()),
            )),
            other => Err(BackendError::InvalidResponse(format!(
                "unknown operation status '{other}'"
            ))),
        }
    }

    async fn download(&self, uri: &str) -> Result<Vec<u8>, BackendError> {
        let response = self.client.get(uri).send().await?;
        let bytes = Self::ensure_success(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

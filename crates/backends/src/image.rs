//! Image generation backend seam and its HTTP implementation.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::error::{body_text, is_retryable_status, BackendError};

/// Result of a call that reached the backend.
///
/// `Rejected` is a definitive answer (bad prompt, content policy, timeout)
/// and is never retried; transient trouble is reported as `Err` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome<T> {
    Generated(T),
    Rejected(String),
}

/// A text(+reference)-to-image model.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Identifier recorded in asset metadata.
    fn model_id(&self) -> &str;

    /// Generate one image. `reference` carries the anchor image bytes used
    /// for visual consistency; `None` for the anchor itself.
    async fn generate(
        &self,
        prompt: &str,
        reference: Option<&[u8]>,
    ) -> Result<GenerationOutcome<Vec<u8>>, BackendError>;
}

/// HTTP client for an image generation service.
///
/// `POST {base_url}/v1/images` with a multipart form (`prompt`, optional
/// `reference` file); the response body is the encoded image.
pub struct HttpImageBackend {
    client: reqwest::Client,
    base_url: String,
    model_id: String,
}

impl HttpImageBackend {
    pub fn new(base_url: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, model_id)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
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
}

#[async_trait]
impl ImageBackend for HttpImageBackend {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(
        &self,
        prompt: &str,
        reference: Option<&[u8]>,
    ) -> Result<GenerationOutcome<Vec<u8>>, BackendError> {
        let mut form = Form::new()
            .text("prompt", prompt.to_string())
            .text("model", self.model_id.clone());
        if let Some(bytes) = reference {
            form = form.part("reference", Part::bytes(bytes.to_vec()).file_name("reference"));
        }

        let response = self
            .client
            .post(format!("{}/v1/images", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if is_retryable_status(status) {
            return Err(BackendError::Api {
                status: status.as_u16(),
                body: body_text(response).await,
            });
        }
        if !status.is_success() {
            let body = body_text(response).await;
            return Ok(GenerationOutcome::Rejected(format!(
                "image backend refused the request ({status}): {body}"
            )));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(GenerationOutcome::Rejected(
                "image backend returned no image data".to_string(),
            ));
        }
        Ok(GenerationOutcome::Generated(bytes.to_vec()))
    }
}

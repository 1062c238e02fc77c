//! Errors from the generation backend clients.

/// A transient backend failure. Returned as `Err` so that
/// [`RetryPolicy`](crate::retry::RetryPolicy) retries it; permanent
/// rejections travel as [`GenerationOutcome::Rejected`](crate::image::GenerationOutcome)
/// instead.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a retryable status (5xx or 429).
    #[error("Backend API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The backend answered 2xx with a body we could not use.
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

/// Whether an HTTP status is worth retrying.
pub fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

/// Read a response body for error reporting.
pub(crate) async fn body_text(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::UNPROCESSABLE_ENTITY));
    }
}

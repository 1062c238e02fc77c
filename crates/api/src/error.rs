use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use storyreel_core::error::CoreError;
use storyreel_db::store::StoreError;
use storyreel_pipeline::assembly::AssemblyError;
use storyreel_pipeline::{AssembleError, PipelineError};

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce consistent JSON error responses
/// of the form `{ "error", "code" }`. Phase gate failures add the gate and
/// the scenes still missing an asset.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A reference or seed image could not be read back from storage.
    #[error("{0}")]
    ReferenceUnavailable(String),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Core(e) => Self::Core(e),
            PipelineError::Store(e) => Self::Store(e),
            PipelineError::ReferenceUnavailable(msg) => Self::ReferenceUnavailable(msg),
        }
    }
}

impl From<AssembleError> for AppError {
    fn from(err: AssembleError) -> Self {
        match err {
            AssembleError::Pipeline(e) => e.into(),
            AssembleError::Assembly(e) => Self::Assembly(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut extra = None;
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::PhaseInvariant {
                    gate,
                    reason,
                    incomplete,
                } => {
                    extra = Some(json!({ "gate": gate, "incomplete": incomplete }));
                    (StatusCode::CONFLICT, "PHASE_INVARIANT", reason.clone())
                }
            },

            AppError::Store(StoreError::NotFound { entity, id }) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{entity} with id {id} not found"),
            ),
            AppError::Store(StoreError::Database(err)) => classify_sqlx_error(err),
            AppError::Store(err @ StoreError::GateOutOfOrder { gate, .. }) => {
                extra = Some(json!({ "gate": gate, "incomplete": [] }));
                (StatusCode::CONFLICT, "PHASE_INVARIANT", err.to_string())
            }

            AppError::ReferenceUnavailable(msg) => {
                (StatusCode::BAD_GATEWAY, "REFERENCE_UNAVAILABLE", msg.clone())
            }

            AppError::Assembly(err) => match err {
                AssemblyError::NoClips
                | AssemblyError::InvalidClips(_)
                | AssemblyError::InvalidVolume(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
                }
                AssemblyError::Load(_)
                | AssemblyError::Fetch { .. }
                | AssemblyError::Stage { .. } => {
                    (StatusCode::BAD_GATEWAY, "ASSEMBLY_FAILED", err.to_string())
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let (Some(obj), Some(serde_json::Value::Object(fields))) = (body.as_object_mut(), extra) {
            obj.extend(fields);
        }

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}

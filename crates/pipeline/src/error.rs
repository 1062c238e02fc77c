use storyreel_core::error::CoreError;
use storyreel_db::store::StoreError;

/// Errors that abort a pipeline operation before or instead of producing
/// per-scene results.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A shared reference or seed image could not be read back.
    #[error("Reference image unavailable: {0}")]
    ReferenceUnavailable(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

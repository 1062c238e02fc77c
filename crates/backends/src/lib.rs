//! Clients for the external services the pipeline depends on.
//!
//! - [`image::ImageBackend`] / [`video::VideoBackend`]: black-box generation
//!   models, with reqwest-based HTTP implementations.
//! - [`storage::ObjectStore`]: durable storage returning public URLs.
//! - [`retry::RetryPolicy`]: exponential backoff around any fallible call.

pub mod error;
pub mod image;
pub mod retry;
pub mod storage;
pub mod video;

pub use error::BackendError;
pub use image::{GenerationOutcome, HttpImageBackend, ImageBackend};
pub use retry::RetryPolicy;
pub use storage::{LocalObjectStore, ObjectStore, StorageError};
pub use video::{await_video, HttpVideoBackend, PollConfig, PollStatus, Submission, VideoBackend, VideoPayload};

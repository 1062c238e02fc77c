//! The phased generation pipeline and the final-cut assembly engine.
//!
//! - [`generation::GenerationOrchestrator`]: runs the four generation
//!   operations (anchor image, remaining images, anchor video, remaining
//!   videos) against the configured backends.
//! - [`gate`]: user confirmations that advance the workflow.
//! - [`reset`]: declarative rewinds to an earlier phase.
//! - [`assembly::AssemblyEngine`]: concatenates finished clips and mixes
//!   an optional background track.
//! - [`service::PipelineService`]: the facade the HTTP layer talks to.

pub mod assembly;
pub mod error;
pub mod gate;
pub mod generation;
pub mod reset;
pub mod service;
pub mod snapshot;

pub use error::{PipelineError, PipelineResult};
pub use service::{AssembleError, GenerateRequest, PipelineService};

//! Final-cut assembly: fetch clips, concatenate, optionally mix a
//! background track, export.

pub mod engine;
pub mod media;

pub use engine::{AssemblyEngine, AssemblyError, AssemblyOutput, AssemblyRequest, ProgressFn};
pub use media::{FfmpegEngine, FfmpegLoader, MediaEngine, MediaError, MediaLoader};

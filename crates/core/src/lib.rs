//! Domain logic shared by every storyreel crate.
//!
//! Everything here is free of I/O except [`ffmpeg`], which shells out to
//! the `ffmpeg`/`ffprobe` binaries.

pub mod assembly;
pub mod error;
pub mod ffmpeg;
pub mod generation;
pub mod phase;
pub mod storage;
pub mod types;

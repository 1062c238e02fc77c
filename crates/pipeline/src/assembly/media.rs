//! The media engine seam and its ffmpeg implementation.
//!
//! An engine owns a private working directory of named slots. Assembly
//! writes inputs into slots, asks the engine to transform them into other
//! slots, and reads the result back.

use std::path::PathBuf;

use async_trait::async_trait;
use storyreel_core::ffmpeg::{
    concat_args, ffmpeg_version, has_audio, mix_args, music_only_args, parse_duration,
    probe_media, run_ffmpeg, FfmpegError,
};

/// Errors from a [`MediaEngine`] or its loader.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error(transparent)]
    Ffmpeg(#[from] FfmpegError),

    #[error("Media I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Slot '{0}' does not exist")]
    MissingSlot(String),
}

/// Slot-based media processing.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn write_slot(&self, slot: &str, bytes: &[u8]) -> Result<(), MediaError>;

    async fn read_slot(&self, slot: &str) -> Result<Vec<u8>, MediaError>;

    async fn remove_slot(&self, slot: &str) -> Result<(), MediaError>;

    /// Concatenate the clips listed in `manifest_slot` without re-encoding.
    async fn concat(&self, manifest_slot: &str, output_slot: &str) -> Result<(), MediaError>;

    /// Mix `music_slot` at `music_volume` under the video's own audio. The
    /// result is as long as the shorter input.
    async fn mix(
        &self,
        video_slot: &str,
        music_slot: &str,
        music_volume: f32,
        output_slot: &str,
    ) -> Result<(), MediaError>;

    async fn duration_secs(&self, slot: &str) -> Result<f64, MediaError>;

    /// Release everything the engine holds.
    async fn shutdown(&self) -> Result<(), MediaError>;
}

/// Creates the engine on first use.
#[async_trait]
pub trait MediaLoader: Send + Sync {
    async fn load(&self) -> Result<Box<dyn MediaEngine>, MediaError>;
}

// ---------------------------------------------------------------------------
// ffmpeg
// ---------------------------------------------------------------------------

/// Loads an [`FfmpegEngine`] in a fresh directory under `work_root`.
pub struct FfmpegLoader {
    work_root: PathBuf,
}

impl FfmpegLoader {
    pub fn new(work_root: impl Into<PathBuf>) -> Self {
        Self {
            work_root: work_root.into(),
        }
    }
}

#[async_trait]
impl MediaLoader for FfmpegLoader {
    async fn load(&self) -> Result<Box<dyn MediaEngine>, MediaError> {
        let version = ffmpeg_version().await?;
        let work_dir = self
            .work_root
            .join(format!("assembly-{}", uuid::Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&work_dir).await?;
        tracing::info!(version = %version, work_dir = %work_dir.display(), "Media engine loaded");
        Ok(Box::new(FfmpegEngine { work_dir }))
    }
}

/// Runs `ffmpeg`/`ffprobe` inside a private working directory.
pub struct FfmpegEngine {
    work_dir: PathBuf,
}

impl FfmpegEngine {
    fn slot_path(&self, slot: &str) -> PathBuf {
        self.work_dir.join(slot)
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn write_slot(&self, slot: &str, bytes: &[u8]) -> Result<(), MediaError> {
        tokio::fs::write(self.slot_path(slot), bytes).await?;
        Ok(())
    }

    async fn read_slot(&self, slot: &str) -> Result<Vec<u8>, MediaError> {
        match tokio::fs::read(self.slot_path(slot)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MediaError::MissingSlot(slot.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_slot(&self, slot: &str) -> Result<(), MediaError> {
        match tokio::fs::remove_file(self.slot_path(slot)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MediaError::MissingSlot(slot.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn concat(&self, manifest_slot: &str, output_slot: &str) -> Result<(), MediaError> {
        run_ffmpeg(&self.work_dir, &concat_args(manifest_slot, output_slot)).await?;
        Ok(())
    }

    async fn mix(
        &self,
        video_slot: &str,
        music_slot: &str,
        music_volume: f32,
        output_slot: &str,
    ) -> Result<(), MediaError> {
        let probe = probe_media(&self.slot_path(video_slot)).await?;
        let args = if has_audio(&probe) {
            mix_args(video_slot, music_slot, music_volume, output_slot)
        } else {
            music_only_args(video_slot, music_slot, music_volume, output_slot)
        };
        run_ffmpeg(&self.work_dir, &args).await?;
        Ok(())
    }

    async fn duration_secs(&self, slot: &str) -> Result<f64, MediaError> {
        let probe = probe_media(&self.slot_path(slot)).await?;
        Ok(parse_duration(&probe))
    }

    async fn shutdown(&self) -> Result<(), MediaError> {
        match tokio::fs::remove_dir_all(&self.work_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

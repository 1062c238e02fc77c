//! Final-cut assembly stages, progress reporting and input validation.
//!
//! The assembly pipeline itself lives in `storyreel-pipeline`; this module
//! holds the pure pieces it is built from.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Background track volume when the caller does not supply one.
pub const DEFAULT_MUSIC_VOLUME: f32 = 0.3;
/// The narration/video track is always mixed at unity gain.
pub const NARRATION_VOLUME: f32 = 1.0;

/// Working slot holding the concat manifest.
pub const MANIFEST_SLOT: &str = "concat.txt";
/// Working slot holding the concatenated track.
pub const CONCAT_SLOT: &str = "concat.mp4";
/// Working slot holding the background track.
pub const MUSIC_SLOT: &str = "music.audio";
/// Working slot holding the mixed output.
pub const MIXED_SLOT: &str = "mixed.mp4";

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Stage reported to progress listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssemblyStage {
    Loading,
    Fetching,
    Processing,
    Encoding,
    Complete,
}

impl AssemblyStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Fetching => "fetching",
            Self::Processing => "processing",
            Self::Encoding => "encoding",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for AssemblyStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyProgress {
    pub stage: AssemblyStage,
    /// 0-100.
    pub progress: u8,
    pub message: String,
}

impl AssemblyProgress {
    pub fn new(stage: AssemblyStage, progress: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.min(100),
            message: message.into(),
        }
    }
}

/// Percentage reported after fetching clip `index` (0-based) of `total`.
pub fn fetch_progress(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (((index + 1) as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

// ---------------------------------------------------------------------------
// Clips
// ---------------------------------------------------------------------------

/// One clip to assemble, located by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipSpec {
    /// Position in the final cut; clips are assembled in ascending order.
    pub order: i32,
    pub url: String,
}

/// Sort clips into assembly order, rejecting empty input, blank URLs and
/// duplicate order values.
pub fn order_clips(mut clips: Vec<ClipSpec>) -> Result<Vec<ClipSpec>, CoreError> {
    if clips.is_empty() {
        return Err(CoreError::Validation("At least one clip is required".into()));
    }
    if let Some(clip) = clips.iter().find(|c| c.url.trim().is_empty()) {
        return Err(CoreError::Validation(format!(
            "Clip with order {} has an empty url",
            clip.order
        )));
    }
    clips.sort_by_key(|c| c.order);
    if let Some(pair) = clips.windows(2).find(|w| w[0].order == w[1].order) {
        return Err(CoreError::Validation(format!(
            "Duplicate clip order {}",
            pair[0].order
        )));
    }
    Ok(clips)
}

/// Name of the numbered working slot for the clip at `position` (0-based).
pub fn clip_slot_name(position: usize) -> String {
    format!("clip_{position:03}.mp4")
}

/// Validate a background-track volume is in `[0.0, 1.0]`.
pub fn validate_volume(volume: f32) -> Result<(), CoreError> {
    if (0.0..=1.0).contains(&volume) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Music volume must be between 0.0 and 1.0, got {volume}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Workflow phase derivation and phase-gate preconditions.
//!
//! The current phase is never stored. It is recomputed from a read-only
//! [`PhaseSnapshot`] every time it is needed, so it cannot drift from the
//! scene and asset records it is derived from.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Order index of the reference anchor scene.
pub const ANCHOR_ORDER_INDEX: i32 = 1;

/// Project step written by the final hand-off out of this pipeline.
pub const HANDOFF_STEP: i32 = 5;

// ---------------------------------------------------------------------------
// Phases and gates
// ---------------------------------------------------------------------------

/// Workflow phase, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Phase A: generate and confirm the anchor image.
    FirstImage,
    /// Phase B: generate every other image from the anchor.
    RemainingImages,
    /// Phase C: generate the first video and lock the video style.
    FirstVideo,
    /// Phase D: generate every other video in the locked style.
    RemainingVideos,
    Complete,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstImage => "first_image",
            Self::RemainingImages => "remaining_images",
            Self::FirstVideo => "first_video",
            Self::RemainingVideos => "remaining_videos",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-confirmed checkpoint between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    FirstImage,
    AllImages,
    FirstVideo,
    AllVideos,
}

impl Gate {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstImage => "first_image",
            Self::AllImages => "all_images",
            Self::FirstVideo => "first_video",
            Self::AllVideos => "all_videos",
        }
    }

    /// The gate that must already be passed before this one may be.
    pub fn requires(self) -> Option<Gate> {
        match self {
            Self::FirstImage => None,
            Self::AllImages => Some(Self::FirstImage),
            Self::FirstVideo => Some(Self::AllImages),
            Self::AllVideos => Some(Self::FirstVideo),
        }
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Per-scene completion state as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneProgress {
    pub scene_id: DbId,
    pub order_index: i32,
    /// The scene has an image asset with status `complete`.
    pub image_complete: bool,
    /// The scene has a video asset with status `complete`.
    pub video_complete: bool,
}

/// Confirmation timestamps persisted on the shot list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmationGates {
    pub first_image_confirmed_at: Option<Timestamp>,
    pub all_images_confirmed_at: Option<Timestamp>,
    pub first_video_confirmed_at: Option<Timestamp>,
    pub all_videos_confirmed_at: Option<Timestamp>,
}

impl ConfirmationGates {
    pub fn confirmed_at(&self, gate: Gate) -> Option<Timestamp> {
        match gate {
            Gate::FirstImage => self.first_image_confirmed_at,
            Gate::AllImages => self.all_images_confirmed_at,
            Gate::FirstVideo => self.first_video_confirmed_at,
            Gate::AllVideos => self.all_videos_confirmed_at,
        }
    }

    pub fn is_confirmed(&self, gate: Gate) -> bool {
        self.confirmed_at(gate).is_some()
    }
}

/// Read-only view of one shot list's records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseSnapshot {
    pub scenes: Vec<SceneProgress>,
    /// `None` when the shot list does not exist yet.
    pub gates: Option<ConfirmationGates>,
}

impl PhaseSnapshot {
    /// The reference anchor scene (`order_index = 1`), if present.
    pub fn anchor(&self) -> Option<&SceneProgress> {
        self.scenes
            .iter()
            .find(|s| s.order_index == ANCHOR_ORDER_INDEX)
    }

    /// Order indices of scenes without a complete image, ascending.
    pub fn incomplete_images(&self) -> Vec<i32> {
        self.incomplete_by(|s| s.image_complete)
    }

    /// Order indices of scenes without a complete video, ascending.
    pub fn incomplete_videos(&self) -> Vec<i32> {
        self.incomplete_by(|s| s.video_complete)
    }

    fn incomplete_by(&self, done: impl Fn(&SceneProgress) -> bool) -> Vec<i32> {
        let mut missing: Vec<i32> = self
            .scenes
            .iter()
            .filter(|s| !done(s))
            .map(|s| s.order_index)
            .collect();
        missing.sort_unstable();
        missing
    }

    fn gate_passed(&self, gate: Gate) -> bool {
        self.gates
            .as_ref()
            .map(|g| g.is_confirmed(gate))
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Derive the current phase. First matching rule wins.
pub fn resolve_phase(snapshot: &PhaseSnapshot) -> Phase {
    if snapshot.scenes.is_empty() || snapshot.gates.is_none() {
        return Phase::FirstImage;
    }

    let anchor_image = snapshot.anchor().map(|s| s.image_complete).unwrap_or(false);
    if !anchor_image || !snapshot.gate_passed(Gate::FirstImage) {
        return Phase::FirstImage;
    }

    let all_images = snapshot.scenes.iter().all(|s| s.image_complete);
    if !all_images || !snapshot.gate_passed(Gate::AllImages) {
        return Phase::RemainingImages;
    }

    let anchor_video = snapshot.anchor().map(|s| s.video_complete).unwrap_or(false);
    if !anchor_video || !snapshot.gate_passed(Gate::FirstVideo) {
        return Phase::FirstVideo;
    }

    let all_videos = snapshot.scenes.iter().all(|s| s.video_complete);
    if !all_videos || !snapshot.gate_passed(Gate::AllVideos) {
        return Phase::RemainingVideos;
    }

    Phase::Complete
}

/// Check that `gate` may be confirmed against `snapshot`.
///
/// Gates are acquired strictly in order: a gate whose predecessor is
/// unconfirmed is rejected even if its own completion predicate holds.
pub fn check_gate(
    snapshot: &PhaseSnapshot,
    gate: Gate,
    video_style: Option<&str>,
) -> Result<(), CoreError> {
    if snapshot.gates.is_none() {
        return Err(CoreError::Validation(
            "Shot list has no scenes to confirm".to_string(),
        ));
    }

    if let Some(required) = gate.requires() {
        if !snapshot.gate_passed(required) {
            return Err(CoreError::PhaseInvariant {
                gate: gate.as_str(),
                reason: format!("'{required}' must be confirmed first"),
                incomplete: Vec::new(),
            });
        }
    }

    match gate {
        Gate::FirstImage => {
            if !snapshot.anchor().map(|s| s.image_complete).unwrap_or(false) {
                return Err(CoreError::PhaseInvariant {
                    gate: gate.as_str(),
                    reason: "scene 1 has no complete image".to_string(),
                    incomplete: vec![ANCHOR_ORDER_INDEX],
                });
            }
        }
        Gate::AllImages => {
            let incomplete = snapshot.incomplete_images();
            if !incomplete.is_empty() {
                return Err(CoreError::PhaseInvariant {
                    gate: gate.as_str(),
                    reason: format!("{} scene(s) have no complete image", incomplete.len()),
                    incomplete,
                });
            }
        }
        Gate::FirstVideo => {
            if video_style.map(str::trim).unwrap_or("").is_empty() {
                return Err(CoreError::Validation(
                    "video_style is required to confirm the first video".to_string(),
                ));
            }
            if !snapshot.anchor().map(|s| s.video_complete).unwrap_or(false) {
                return Err(CoreError::PhaseInvariant {
                    gate: gate.as_str(),
                    reason: "scene 1 has no complete video".to_string(),
                    incomplete: vec![ANCHOR_ORDER_INDEX],
                });
            }
        }
        Gate::AllVideos => {
            let incomplete = snapshot.incomplete_videos();
            if !incomplete.is_empty() {
                return Err(CoreError::PhaseInvariant {
                    gate: gate.as_str(),
                    reason: format!("{} scene(s) have no complete video", incomplete.len()),
                    incomplete,
                });
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

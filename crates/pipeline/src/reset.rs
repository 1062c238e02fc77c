//! Declarative rewinds to an earlier phase.
//!
//! Each target maps to one [`ResetPlan`] row: the assets to purge, the
//! scene statuses to restore and the shot-list fields to clear. The store
//! applies a plan as one unit.

use serde::{Deserialize, Serialize};
use storyreel_core::error::CoreError;
use storyreel_core::phase::{resolve_phase, Phase};
use storyreel_core::types::DbId;
use storyreel_db::models::scene::SceneScope;
use storyreel_db::models::shot_list::ShotListField;
use storyreel_db::models::status::{AssetType, SceneStatus};
use storyreel_db::store::{AssetPurge, RecordStore, ResetPlan, ResetSummary};
use storyreel_events::{event_types, EventBus, PipelineEvent};

use crate::error::PipelineResult;
use crate::snapshot::load_snapshot;

/// Phase a shot list can be rewound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetTarget {
    FirstImage,
    FirstVideo,
}

impl ResetTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstImage => "first_image",
            Self::FirstVideo => "first_video",
        }
    }

    /// The row of the reset table for this target.
    pub fn plan(self) -> &'static ResetPlan {
        match self {
            Self::FirstImage => &FIRST_IMAGE_PLAN,
            Self::FirstVideo => &FIRST_VIDEO_PLAN,
        }
    }
}

impl std::fmt::Display for ResetTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResetTarget {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_image" => Ok(Self::FirstImage),
            "first_video" => Ok(Self::FirstVideo),
            other => Err(CoreError::Validation(format!(
                "Unknown reset target '{other}', expected first_image or first_video"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Reset table
// ---------------------------------------------------------------------------

/// Back to phase A: only the anchor image survives.
const FIRST_IMAGE_PLAN: ResetPlan = ResetPlan {
    purge: &[
        AssetPurge {
            asset_type: AssetType::Image,
            scope: SceneScope::AfterAnchor,
        },
        AssetPurge {
            asset_type: AssetType::Video,
            scope: SceneScope::All,
        },
    ],
    status_scope: SceneScope::AfterAnchor,
    status: SceneStatus::Pending,
    clear: &[
        ShotListField::FirstImageConfirmedAt,
        ShotListField::AllImagesConfirmedAt,
        ShotListField::FirstVideoConfirmedAt,
        ShotListField::AllVideosConfirmedAt,
        ShotListField::VideoStyle,
    ],
};

/// Back to phase C: every image survives, every video goes.
const FIRST_VIDEO_PLAN: ResetPlan = ResetPlan {
    purge: &[AssetPurge {
        asset_type: AssetType::Video,
        scope: SceneScope::All,
    }],
    status_scope: SceneScope::All,
    status: SceneStatus::ImageComplete,
    clear: &[
        ShotListField::FirstVideoConfirmedAt,
        ShotListField::AllVideosConfirmedAt,
        ShotListField::VideoStyle,
    ],
};

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Result of a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetOutcome {
    pub phase: Phase,
    #[serde(skip)]
    pub summary: ResetSummary,
}

/// Rewind a shot list to `target`, returning the phase it resolves to
/// afterwards.
pub async fn reset(
    store: &dyn RecordStore,
    events: &EventBus,
    shot_list_id: DbId,
    target: ResetTarget,
) -> PipelineResult<ResetOutcome> {
    let plan = target.plan();
    tracing::info!(shot_list_id, target = %target, "Resetting shot list");

    let summary = store.apply_reset(shot_list_id, plan).await?;
    tracing::info!(
        shot_list_id,
        target = %target,
        assets_deleted = summary.assets_deleted,
        scenes_reset = summary.scenes_reset,
        "Shot list reset",
    );

    let phase = resolve_phase(&load_snapshot(store, shot_list_id).await?);
    events.publish(
        PipelineEvent::new(event_types::PHASE_RESET)
            .with_shot_list(shot_list_id)
            .with_payload(serde_json::json!({
                "target": target.as_str(),
                "phase": phase.as_str(),
                "assets_deleted": summary.assets_deleted,
            })),
    );
    Ok(ResetOutcome { phase, summary })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_image_rewinds_everything_after_the_anchor() {
        let plan = ResetTarget::FirstImage.plan();
        assert!(plan.purge.contains(&AssetPurge {
            asset_type: AssetType::Image,
            scope: SceneScope::AfterAnchor,
        }));
        assert!(plan.purge.contains(&AssetPurge {
            asset_type: AssetType::Video,
            scope: SceneScope::All,
        }));
        assert_eq!(plan.status_scope, SceneScope::AfterAnchor);
        assert_eq!(plan.status, SceneStatus::Pending);
        assert_eq!(plan.clear.len(), 5);
        assert!(plan.clear.contains(&ShotListField::VideoStyle));
    }

    #[test]
    fn first_video_keeps_images() {
        let plan = ResetTarget::FirstVideo.plan();
        assert!(plan.purge.iter().all(|p| p.asset_type == AssetType::Video));
        assert_eq!(plan.status_scope, SceneScope::All);
        assert_eq!(plan.status, SceneStatus::ImageComplete);
        assert!(!plan.clear.contains(&ShotListField::FirstImageConfirmedAt));
        assert!(!plan.clear.contains(&ShotListField::AllImagesConfirmedAt));
        assert!(plan.clear.contains(&ShotListField::FirstVideoConfirmedAt));
        assert!(plan.clear.contains(&ShotListField::VideoStyle));
    }

    #[test]
    fn parses_targets() {
        assert_eq!("first_video".parse::<ResetTarget>().unwrap(), ResetTarget::FirstVideo);
        assert!("remaining_images".parse::<ResetTarget>().is_err());
    }
}

//! Shot list model: confirmation gates and the locked video style.

use serde::Serialize;
use sqlx::FromRow;
use storyreel_core::phase::{ConfirmationGates, Gate};
use storyreel_core::types::{DbId, Timestamp};

/// A row from the `shot_lists` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ShotList {
    pub id: DbId,
    pub project_id: DbId,
    /// Set only when the first video is confirmed.
    pub video_style: Option<String>,
    pub first_image_confirmed_at: Option<Timestamp>,
    pub all_images_confirmed_at: Option<Timestamp>,
    pub first_video_confirmed_at: Option<Timestamp>,
    /// Written together with the project step-5 hand-off.
    pub all_videos_confirmed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ShotList {
    pub fn gates(&self) -> ConfirmationGates {
        ConfirmationGates {
            first_image_confirmed_at: self.first_image_confirmed_at,
            all_images_confirmed_at: self.all_images_confirmed_at,
            first_video_confirmed_at: self.first_video_confirmed_at,
            all_videos_confirmed_at: self.all_videos_confirmed_at,
        }
    }

    /// The confirmed video style, if one has been locked in.
    pub fn locked_video_style(&self) -> Option<&str> {
        self.first_video_confirmed_at?;
        self.video_style
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A nullable shot-list column that a reset may clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShotListField {
    FirstImageConfirmedAt,
    AllImagesConfirmedAt,
    FirstVideoConfirmedAt,
    AllVideosConfirmedAt,
    VideoStyle,
}

impl ShotListField {
    pub fn column(self) -> &'static str {
        match self {
            Self::FirstImageConfirmedAt => "first_image_confirmed_at",
            Self::AllImagesConfirmedAt => "all_images_confirmed_at",
            Self::FirstVideoConfirmedAt => "first_video_confirmed_at",
            Self::AllVideosConfirmedAt => "all_videos_confirmed_at",
            Self::VideoStyle => "video_style",
        }
    }

    /// The timestamp column recording `gate`.
    pub fn for_gate(gate: Gate) -> Self {
        match gate {
            Gate::FirstImage => Self::FirstImageConfirmedAt,
            Gate::AllImages => Self::AllImagesConfirmedAt,
            Gate::FirstVideo => Self::FirstVideoConfirmedAt,
            Gate::AllVideos => Self::AllVideosConfirmedAt,
        }
    }
}

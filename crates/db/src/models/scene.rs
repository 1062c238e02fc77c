//! Scene entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use storyreel_core::phase::ANCHOR_ORDER_INDEX;
use storyreel_core::types::{DbId, Timestamp};

use crate::models::status::{SceneStatus, StatusId};

/// A row from the `scenes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Scene {
    pub id: DbId,
    pub shot_list_id: DbId,
    /// 1-based, unique and contiguous within the shot list.
    pub order_index: i32,
    pub image_prompt: String,
    pub video_prompt: String,
    pub duration_seconds: Option<f64>,
    pub status_id: StatusId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Scene {
    pub fn status(&self) -> Option<SceneStatus> {
        SceneStatus::from_id(self.status_id)
    }

    /// Whether this is the reference anchor scene.
    pub fn is_anchor(&self) -> bool {
        self.order_index == ANCHOR_ORDER_INDEX
    }
}

/// DTO for creating a new scene. Status always starts as `pending`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateScene {
    pub order_index: i32,
    pub image_prompt: String,
    pub video_prompt: String,
    pub duration_seconds: Option<f64>,
}

/// Which scenes of a shot list a bulk operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneScope {
    /// Every scene.
    All,
    /// Every scene after the reference anchor (`order_index > 1`).
    AfterAnchor,
}

impl SceneScope {
    /// Smallest `order_index` covered by the scope.
    pub fn min_order_index(self) -> i32 {
        match self {
            Self::All => ANCHOR_ORDER_INDEX,
            Self::AfterAnchor => ANCHOR_ORDER_INDEX + 1,
        }
    }

    pub fn contains(self, order_index: i32) -> bool {
        order_index >= self.min_order_index()
    }
}

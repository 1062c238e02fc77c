//! The record store seam used by the pipeline.
//!
//! Everything the orchestrator reads or writes goes through [`RecordStore`].
//! Production uses [`PgRecordStore`]; tests and database-less runs use
//! [`MemoryStore`].

mod memory;
mod pg;

use async_trait::async_trait;
use storyreel_core::phase::Gate;
use storyreel_core::types::{DbId, Timestamp};

use crate::models::asset::{Asset, UpsertAsset};
use crate::models::project::Project;
use crate::models::scene::{Scene, SceneScope};
use crate::models::shot_list::{ShotList, ShotListField};
use crate::models::status::{AssetType, SceneStatus};

pub use memory::MemoryStore;
pub use pg::PgRecordStore;

/// Errors raised by a [`RecordStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// The gate's predecessor was not confirmed at write time.
    #[error("Gate '{gate}' requires '{requires}' to be confirmed first")]
    GateOutOfOrder { gate: Gate, requires: Gate },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Assets of one type to delete from the scenes in `scope`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetPurge {
    pub asset_type: AssetType,
    pub scope: SceneScope,
}

/// Everything a phase reset deletes, rewinds and clears. Applied atomically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetPlan {
    pub purge: &'static [AssetPurge],
    pub status_scope: SceneScope,
    pub status: SceneStatus,
    pub clear: &'static [ShotListField],
}

/// Row counts touched by [`RecordStore::apply_reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetSummary {
    pub assets_deleted: u64,
    pub scenes_reset: u64,
}

/// Persistence operations the generation pipeline depends on.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_project(&self, id: DbId) -> StoreResult<Option<Project>>;

    async fn find_shot_list(&self, id: DbId) -> StoreResult<Option<ShotList>>;

    /// Scenes of a shot list ordered by `order_index`.
    async fn list_scenes(&self, shot_list_id: DbId) -> StoreResult<Vec<Scene>>;

    /// Every asset attached to the shot list's scenes.
    async fn list_assets(&self, shot_list_id: DbId) -> StoreResult<Vec<Asset>>;

    /// Stamp `gate` as confirmed, optionally locking the video style.
    ///
    /// Fails with [`StoreError::GateOutOfOrder`] unless the gate's
    /// predecessor is confirmed when the write lands.
    async fn confirm_gate(
        &self,
        shot_list_id: DbId,
        gate: Gate,
        at: Timestamp,
        video_style: Option<&str>,
    ) -> StoreResult<ShotList>;

    /// Stamp the final gate and move the owning project to `step` together.
    /// Guarded like [`RecordStore::confirm_gate`].
    async fn confirm_handoff(
        &self,
        shot_list_id: DbId,
        project_id: DbId,
        at: Timestamp,
        step: i32,
    ) -> StoreResult<ShotList>;

    async fn set_scene_status(&self, scene_id: DbId, status: SceneStatus) -> StoreResult<()>;

    /// Insert or overwrite the asset for `(scene_id, asset_type)`.
    async fn upsert_asset(&self, input: &UpsertAsset) -> StoreResult<Asset>;

    async fn apply_reset(&self, shot_list_id: DbId, plan: &ResetPlan) -> StoreResult<ResetSummary>;
}

//! Loading shot-list records and projecting them onto a [`PhaseSnapshot`].

use storyreel_core::error::CoreError;
use storyreel_core::phase::{resolve_phase, Phase, PhaseSnapshot, SceneProgress};
use storyreel_core::types::DbId;
use storyreel_db::models::asset::Asset;
use storyreel_db::models::scene::Scene;
use storyreel_db::models::shot_list::ShotList;
use storyreel_db::models::status::AssetType;
use storyreel_db::store::RecordStore;

use crate::error::PipelineResult;

/// Project raw records onto the resolver's view. A scene counts as having
/// an image (video) only if it owns a `complete` asset of that type.
pub fn build_snapshot(
    scenes: &[Scene],
    assets: &[Asset],
    shot_list: Option<&ShotList>,
) -> PhaseSnapshot {
    let has_complete = |scene_id: DbId, asset_type: AssetType| {
        assets
            .iter()
            .any(|a| a.scene_id == scene_id && a.is(asset_type) && a.is_complete())
    };
    PhaseSnapshot {
        scenes: scenes
            .iter()
            .map(|s| SceneProgress {
                scene_id: s.id,
                order_index: s.order_index,
                image_complete: has_complete(s.id, AssetType::Image),
                video_complete: has_complete(s.id, AssetType::Video),
            })
            .collect(),
        gates: shot_list.map(ShotList::gates),
    }
}

/// Everything the pipeline reads about one shot list.
#[derive(Debug, Clone)]
pub struct ShotListRecords {
    pub shot_list: ShotList,
    /// Ordered by `order_index`.
    pub scenes: Vec<Scene>,
    pub assets: Vec<Asset>,
}

impl ShotListRecords {
    /// Load a shot list with its scenes and assets.
    pub async fn load(store: &dyn RecordStore, shot_list_id: DbId) -> PipelineResult<Self> {
        let shot_list = store
            .find_shot_list(shot_list_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "ShotList",
                id: shot_list_id,
            })?;
        let scenes = store.list_scenes(shot_list_id).await?;
        let assets = store.list_assets(shot_list_id).await?;
        Ok(Self {
            shot_list,
            scenes,
            assets,
        })
    }

    pub fn snapshot(&self) -> PhaseSnapshot {
        build_snapshot(&self.scenes, &self.assets, Some(&self.shot_list))
    }

    pub fn phase(&self) -> Phase {
        resolve_phase(&self.snapshot())
    }

    /// The reference anchor scene.
    pub fn anchor(&self) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.is_anchor())
    }

    /// The scene's `complete` asset of `asset_type`, if any.
    pub fn complete_asset(&self, scene_id: DbId, asset_type: AssetType) -> Option<&Asset> {
        self.assets
            .iter()
            .find(|a| a.scene_id == scene_id && a.is(asset_type) && a.is_complete())
    }
}

/// Snapshot for `shot_list_id`. A missing shot list yields an empty
/// snapshot, which resolves to the first phase.
pub async fn load_snapshot(store: &dyn RecordStore, shot_list_id: DbId) -> PipelineResult<PhaseSnapshot> {
    let Some(shot_list) = store.find_shot_list(shot_list_id).await? else {
        return Ok(PhaseSnapshot::default());
    };
    let scenes = store.list_scenes(shot_list_id).await?;
    let assets = store.list_assets(shot_list_id).await?;
    Ok(build_snapshot(&scenes, &assets, Some(&shot_list)))
}

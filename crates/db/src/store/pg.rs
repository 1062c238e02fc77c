//! PostgreSQL-backed [`RecordStore`].

use async_trait::async_trait;
use storyreel_core::phase::Gate;
use storyreel_core::types::{DbId, Timestamp};

use crate::models::asset::{Asset, UpsertAsset};
use crate::models::project::Project;
use crate::models::scene::Scene;
use crate::models::shot_list::ShotList;
use crate::models::status::SceneStatus;
use crate::repositories::{AssetRepo, ProjectRepo, SceneRepo, ShotListRepo};
use crate::store::{RecordStore, ResetPlan, ResetSummary, StoreError, StoreResult};
use crate::DbPool;

/// Record store over the zero-sized repositories.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: DbPool,
}

impl PgRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn shot_list_not_found(id: DbId) -> StoreError {
    StoreError::NotFound {
        entity: "ShotList",
        id,
    }
}

impl PgRecordStore {
    /// Explain a gate write that matched no row.
    async fn unmatched_gate(&self, id: DbId, gate: Gate) -> StoreError {
        match (ShotListRepo::find_by_id(&self.pool, id).await, gate.requires()) {
            (Ok(Some(_)), Some(requires)) => StoreError::GateOutOfOrder { gate, requires },
            (Err(e), _) => e.into(),
            _ => shot_list_not_found(id),
        }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn find_project(&self, id: DbId) -> StoreResult<Option<Project>> {
        Ok(ProjectRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_shot_list(&self, id: DbId) -> StoreResult<Option<ShotList>> {
        Ok(ShotListRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_scenes(&self, shot_list_id: DbId) -> StoreResult<Vec<Scene>> {
        Ok(SceneRepo::list_by_shot_list(&self.pool, shot_list_id).await?)
    }

    async fn list_assets(&self, shot_list_id: DbId) -> StoreResult<Vec<Asset>> {
        Ok(AssetRepo::list_by_shot_list(&self.pool, shot_list_id).await?)
    }

    async fn confirm_gate(
        &self,
        shot_list_id: DbId,
        gate: Gate,
        at: Timestamp,
        video_style: Option<&str>,
    ) -> StoreResult<ShotList> {
        match ShotListRepo::confirm(&self.pool, shot_list_id, gate, at, video_style).await? {
            Some(shot_list) => Ok(shot_list),
            None => Err(self.unmatched_gate(shot_list_id, gate).await),
        }
    }

    async fn confirm_handoff(
        &self,
        shot_list_id: DbId,
        project_id: DbId,
        at: Timestamp,
        step: i32,
    ) -> StoreResult<ShotList> {
        match ShotListRepo::confirm_handoff(&self.pool, shot_list_id, project_id, at, step).await? {
            Some(shot_list) => Ok(shot_list),
            None => Err(self.unmatched_gate(shot_list_id, Gate::AllVideos).await),
        }
    }

    async fn set_scene_status(&self, scene_id: DbId, status: SceneStatus) -> StoreResult<()> {
        if SceneRepo::update_status(&self.pool, scene_id, status).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                entity: "Scene",
                id: scene_id,
            })
        }
    }

    async fn upsert_asset(&self, input: &UpsertAsset) -> StoreResult<Asset> {
        Ok(AssetRepo::upsert(&self.pool, input).await?)
    }

    async fn apply_reset(&self, shot_list_id: DbId, plan: &ResetPlan) -> StoreResult<ResetSummary> {
        let mut tx = self.pool.begin().await?;
        let mut summary = ResetSummary::default();

        for purge in plan.purge {
            summary.assets_deleted +=
                AssetRepo::delete_in_scope(&mut *tx, shot_list_id, purge.asset_type, purge.scope)
                    .await?;
        }
        summary.scenes_reset =
            SceneRepo::update_status_in_scope(&mut *tx, shot_list_id, plan.status_scope, plan.status)
                .await?;
        if !ShotListRepo::clear_fields(&mut *tx, shot_list_id, plan.clear).await? {
            // Dropping the transaction rolls the deletes back.
            return Err(shot_list_not_found(shot_list_id));
        }

        tx.commit().await?;
        tracing::debug!(
            shot_list_id,
            assets_deleted = summary.assets_deleted,
            scenes_reset = summary.scenes_reset,
            "Reset applied",
        );
        Ok(summary)
    }
}

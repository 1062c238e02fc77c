//! In-process [`RecordStore`] used by tests and by the API when no
//! `DATABASE_URL` is configured.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use storyreel_core::phase::{Gate, ANCHOR_ORDER_INDEX};
use storyreel_core::types::{DbId, Timestamp};
use tokio::sync::RwLock;

use crate::models::asset::{Asset, UpsertAsset};
use crate::models::project::Project;
use crate::models::scene::{CreateScene, Scene};
use crate::models::shot_list::{ShotList, ShotListField};
use crate::models::status::SceneStatus;
use crate::store::{RecordStore, ResetPlan, ResetSummary, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    next_id: DbId,
    projects: BTreeMap<DbId, Project>,
    shot_lists: BTreeMap<DbId, ShotList>,
    scenes: BTreeMap<DbId, Scene>,
    assets: BTreeMap<DbId, Asset>,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn scene_ids_of(&self, shot_list_id: DbId) -> Vec<DbId> {
        self.scenes
            .values()
            .filter(|s| s.shot_list_id == shot_list_id)
            .map(|s| s.id)
            .collect()
    }

    fn shot_list_mut(&mut self, id: DbId) -> StoreResult<&mut ShotList> {
        self.shot_lists.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "ShotList",
            id,
        })
    }
}

/// A [`RecordStore`] holding every table in memory behind one lock, so each
/// operation is atomic with respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a project at wizard step `current_step`.
    pub async fn insert_project(&self, name: &str, current_step: i32) -> Project {
        let mut t = self.tables.write().await;
        let now = Utc::now();
        let project = Project {
            id: t.next_id(),
            name: name.to_string(),
            current_step,
            created_at: now,
            updated_at: now,
        };
        t.projects.insert(project.id, project.clone());
        project
    }

    /// Seed an empty shot list owned by `project_id`.
    pub async fn insert_shot_list(&self, project_id: DbId) -> ShotList {
        let mut t = self.tables.write().await;
        let now = Utc::now();
        let shot_list = ShotList {
            id: t.next_id(),
            project_id,
            video_style: None,
            first_image_confirmed_at: None,
            all_images_confirmed_at: None,
            first_video_confirmed_at: None,
            all_videos_confirmed_at: None,
            created_at: now,
            updated_at: now,
        };
        t.shot_lists.insert(shot_list.id, shot_list.clone());
        shot_list
    }

    /// Seed `pending` scenes into a shot list.
    pub async fn insert_scenes(&self, shot_list_id: DbId, scenes: Vec<CreateScene>) -> Vec<Scene> {
        let mut t = self.tables.write().await;
        let now = Utc::now();
        scenes
            .into_iter()
            .map(|input| {
                let scene = Scene {
                    id: t.next_id(),
                    shot_list_id,
                    order_index: input.order_index,
                    image_prompt: input.image_prompt,
                    video_prompt: input.video_prompt,
                    duration_seconds: input.duration_seconds,
                    status_id: SceneStatus::Pending.id(),
                    created_at: now,
                    updated_at: now,
                };
                t.scenes.insert(scene.id, scene.clone());
                scene
            })
            .collect()
    }

    /// Seed a shot list with `count` scenes numbered from the anchor.
    pub async fn seed_shot_list(&self, count: i32) -> (Project, ShotList, Vec<Scene>) {
        let project = self.insert_project("Seeded project", 4).await;
        let shot_list = self.insert_shot_list(project.id).await;
        let scenes = (0..count)
            .map(|i| {
                let order_index = ANCHOR_ORDER_INDEX + i;
                CreateScene {
                    order_index,
                    image_prompt: format!("Scene {order_index} still"),
                    video_prompt: format!("Scene {order_index} motion"),
                    duration_seconds: Some(5.0),
                }
            })
            .collect();
        let scenes = self.insert_scenes(shot_list.id, scenes).await;
        (project, shot_list, scenes)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_project(&self, id: DbId) -> StoreResult<Option<Project>> {
        Ok(self.tables.read().await.projects.get(&id).cloned())
    }

    async fn find_shot_list(&self, id: DbId) -> StoreResult<Option<ShotList>> {
        Ok(self.tables.read().await.shot_lists.get(&id).cloned())
    }

    async fn list_scenes(&self, shot_list_id: DbId) -> StoreResult<Vec<Scene>> {
        let t = self.tables.read().await;
        let mut scenes: Vec<Scene> = t
            .scenes
            .values()
            .filter(|s| s.shot_list_id == shot_list_id)
            .cloned()
            .collect();
        scenes.sort_by_key(|s| s.order_index);
        Ok(scenes)
    }

    async fn list_assets(&self, shot_list_id: DbId) -> StoreResult<Vec<Asset>> {
        let t = self.tables.read().await;
        let scene_ids = t.scene_ids_of(shot_list_id);
        Ok(t.assets
            .values()
            .filter(|a| scene_ids.contains(&a.scene_id))
            .cloned()
            .collect())
    }

    async fn confirm_gate(
        &self,
        shot_list_id: DbId,
        gate: Gate,
        at: Timestamp,
        video_style: Option<&str>,
    ) -> StoreResult<ShotList> {
        let mut t = self.tables.write().await;
        let shot_list = t.shot_list_mut(shot_list_id)?;
        ensure_predecessor(shot_list, gate)?;
        match gate {
            Gate::FirstImage => shot_list.first_image_confirmed_at = Some(at),
            Gate::AllImages => shot_list.all_images_confirmed_at = Some(at),
            Gate::FirstVideo => shot_list.first_video_confirmed_at = Some(at),
            Gate::AllVideos => shot_list.all_videos_confirmed_at = Some(at),
        }
        if let Some(style) = video_style {
            shot_list.video_style = Some(style.to_string());
        }
        shot_list.updated_at = Utc::now();
        Ok(shot_list.clone())
    }

    async fn confirm_handoff(
        &self,
        shot_list_id: DbId,
        project_id: DbId,
        at: Timestamp,
        step: i32,
    ) -> StoreResult<ShotList> {
        let mut t = self.tables.write().await;
        ensure_predecessor(t.shot_list_mut(shot_list_id)?, Gate::AllVideos)?;
        let project = t.projects.get_mut(&project_id).ok_or(StoreError::NotFound {
            entity: "Project",
            id: project_id,
        })?;
        project.current_step = step;
        project.updated_at = Utc::now();
        let shot_list = t.shot_list_mut(shot_list_id)?;
        shot_list.all_videos_confirmed_at = Some(at);
        shot_list.updated_at = Utc::now();
        Ok(shot_list.clone())
    }

    async fn set_scene_status(&self, scene_id: DbId, status: SceneStatus) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let scene = t.scenes.get_mut(&scene_id).ok_or(StoreError::NotFound {
            entity: "Scene",
            id: scene_id,
        })?;
        scene.status_id = status.id();
        scene.updated_at = Utc::now();
        Ok(())
    }

    async fn upsert_asset(&self, input: &UpsertAsset) -> StoreResult<Asset> {
        let mut t = self.tables.write().await;
        if !t.scenes.contains_key(&input.scene_id) {
            return Err(StoreError::NotFound {
                entity: "Scene",
                id: input.scene_id,
            });
        }
        let now = Utc::now();
        let existing = t
            .assets
            .values()
            .find(|a| a.scene_id == input.scene_id && a.is(input.asset_type))
            .map(|a| (a.id, a.created_at));
        let (id, created_at) = match existing {
            Some(found) => found,
            None => (t.next_id(), now),
        };
        let asset = Asset {
            id,
            scene_id: input.scene_id,
            asset_type_id: input.asset_type.id(),
            status_id: input.status.id(),
            storage_url: input.storage_url.clone(),
            content_type: input.content_type.clone(),
            prompt: input.prompt.clone(),
            model_id: input.model_id.clone(),
            phase: input.phase.clone(),
            created_at,
            updated_at: now,
        };
        t.assets.insert(id, asset.clone());
        Ok(asset)
    }

    async fn apply_reset(&self, shot_list_id: DbId, plan: &ResetPlan) -> StoreResult<ResetSummary> {
        let mut t = self.tables.write().await;
        t.shot_list_mut(shot_list_id)?;

        let order_of: BTreeMap<DbId, i32> = t
            .scenes
            .values()
            .filter(|s| s.shot_list_id == shot_list_id)
            .map(|s| (s.id, s.order_index))
            .collect();
        let mut summary = ResetSummary::default();

        for purge in plan.purge {
            let before = t.assets.len();
            t.assets.retain(|_, a| {
                let in_scope = order_of
                    .get(&a.scene_id)
                    .is_some_and(|order| purge.scope.contains(*order));
                !(in_scope && a.is(purge.asset_type))
            });
            summary.assets_deleted += (before - t.assets.len()) as u64;
        }

        let now = Utc::now();
        for scene in t.scenes.values_mut() {
            if scene.shot_list_id == shot_list_id && plan.status_scope.contains(scene.order_index) {
                scene.status_id = plan.status.id();
                scene.updated_at = now;
                summary.scenes_reset += 1;
            }
        }

        let shot_list = t.shot_list_mut(shot_list_id)?;
        for field in plan.clear {
            match field {
                ShotListField::FirstImageConfirmedAt => shot_list.first_image_confirmed_at = None,
                ShotListField::AllImagesConfirmedAt => shot_list.all_images_confirmed_at = None,
                ShotListField::FirstVideoConfirmedAt => shot_list.first_video_confirmed_at = None,
                ShotListField::AllVideosConfirmedAt => shot_list.all_videos_confirmed_at = None,
                ShotListField::VideoStyle => shot_list.video_style = None,
            }
        }
        shot_list.updated_at = now;

        Ok(summary)
    }
}

fn ensure_predecessor(shot_list: &ShotList, gate: Gate) -> StoreResult<()> {
    match gate.requires() {
        Some(requires) if !shot_list.gates().is_confirmed(requires) => {
            Err(StoreError::GateOutOfOrder { gate, requires })
        }
        _ => Ok(()),
    }
}

//! The facade the HTTP layer talks to.

use std::sync::Arc;

use serde::Deserialize;
use storyreel_core::assembly::{AssemblyProgress, ClipSpec};
use storyreel_core::error::CoreError;
use storyreel_core::phase::{resolve_phase, Gate, Phase};
use storyreel_core::types::DbId;
use storyreel_db::models::status::AssetType;
use storyreel_db::store::RecordStore;
use storyreel_events::{event_types, EventBus, PipelineEvent};

use crate::assembly::{AssemblyEngine, AssemblyError, AssemblyOutput, AssemblyRequest};
use crate::error::PipelineResult;
use crate::gate::{self, ConfirmOutcome};
use crate::generation::{GenerationOrchestrator, PromptOverrides, SceneResult};
use crate::reset::{self, ResetOutcome, ResetTarget};
use crate::snapshot::{load_snapshot, ShotListRecords};

/// One generation call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    pub phase: Option<Phase>,
    /// Restricts a remaining-images/videos batch to one scene.
    pub scene_id: Option<DbId>,
    /// Prompt override for the anchor operations.
    pub prompt: Option<String>,
    /// Per-scene prompt overrides for the batch operations.
    #[serde(default)]
    pub prompts: PromptOverrides,
    pub video_style: Option<String>,
}

/// Failure of [`PipelineService::assemble_shot_list`].
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error(transparent)]
    Pipeline(#[from] crate::error::PipelineError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

/// Ties the orchestrator, gates, resets and assembly to one store.
pub struct PipelineService {
    store: Arc<dyn RecordStore>,
    orchestrator: GenerationOrchestrator,
    assembly: AssemblyEngine,
    events: Arc<EventBus>,
}

impl PipelineService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        orchestrator: GenerationOrchestrator,
        assembly: AssemblyEngine,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            assembly,
            events,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Run the generation operation named by `request.phase`.
    pub async fn generate(
        &self,
        shot_list_id: DbId,
        request: GenerateRequest,
    ) -> PipelineResult<Vec<SceneResult>> {
        let Some(phase) = request.phase else {
            return Err(CoreError::Validation("phase is required".to_string()).into());
        };
        match phase {
            Phase::FirstImage => {
                let result = self
                    .orchestrator
                    .generate_first_image(shot_list_id, request.prompt.as_deref())
                    .await?;
                Ok(vec![result])
            }
            Phase::RemainingImages => {
                self.orchestrator
                    .generate_remaining_images(shot_list_id, request.scene_id, &request.prompts)
                    .await
            }
            Phase::FirstVideo => {
                let result = self
                    .orchestrator
                    .generate_first_video(
                        shot_list_id,
                        request.video_style.as_deref(),
                        request.prompt.as_deref(),
                    )
                    .await?;
                Ok(vec![result])
            }
            Phase::RemainingVideos => {
                self.orchestrator
                    .generate_remaining_videos(shot_list_id, request.scene_id, &request.prompts)
                    .await
            }
            Phase::Complete => Err(CoreError::Validation(
                "nothing to generate in the complete phase".to_string(),
            )
            .into()),
        }
    }

    pub async fn confirm(
        &self,
        shot_list_id: DbId,
        gate: Gate,
        video_style: Option<&str>,
    ) -> PipelineResult<ConfirmOutcome> {
        gate::confirm(self.store.as_ref(), &self.events, shot_list_id, gate, video_style).await
    }

    pub async fn reset(&self, shot_list_id: DbId, target: ResetTarget) -> PipelineResult<ResetOutcome> {
        reset::reset(self.store.as_ref(), &self.events, shot_list_id, target).await
    }

    /// The phase a shot list is in right now.
    pub async fn phase(&self, shot_list_id: DbId) -> PipelineResult<Phase> {
        // An unknown id is NotFound, not phase A.
        self.store
            .find_shot_list(shot_list_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "ShotList",
                id: shot_list_id,
            })?;
        Ok(resolve_phase(&load_snapshot(self.store.as_ref(), shot_list_id).await?))
    }

    /// Assemble a shot list's clips into one video.
    ///
    /// Without explicit `clips`, every completed video asset is used in
    /// scene order. Progress is republished as `assembly.progress` events.
    pub async fn assemble_shot_list(
        &self,
        shot_list_id: DbId,
        clips: Option<Vec<ClipSpec>>,
        music_url: Option<String>,
        music_volume: Option<f32>,
    ) -> Result<AssemblyOutput, AssembleError> {
        let clips = match clips {
            Some(clips) => clips,
            None => self.completed_clips(shot_list_id).await?,
        };

        let events = Arc::clone(&self.events);
        let on_progress = move |progress: AssemblyProgress| {
            events.publish(
                PipelineEvent::new(event_types::ASSEMBLY_PROGRESS)
                    .with_shot_list(shot_list_id)
                    .with_payload(serde_json::json!(progress)),
            );
        };

        let output = self
            .assembly
            .assemble(
                AssemblyRequest {
                    clips,
                    music_url,
                    music_volume,
                },
                &on_progress,
            )
            .await?;
        Ok(output)
    }

    /// Tear down the assembly engine.
    pub async fn shutdown(&self) {
        self.assembly.shutdown().await;
    }

    async fn completed_clips(&self, shot_list_id: DbId) -> PipelineResult<Vec<ClipSpec>> {
        let records = ShotListRecords::load(self.store.as_ref(), shot_list_id).await?;
        Ok(records
            .scenes
            .iter()
            .filter_map(|scene| {
                let url = records
                    .complete_asset(scene.id, AssetType::Video)?
                    .storage_url
                    .clone()?;
                Some(ClipSpec {
                    order: scene.order_index,
                    url,
                })
            })
            .collect())
    }
}

//! The four generation operations.
//!
//! Batches run scene by scene. A scene that fails (rejected by a backend,
//! retries exhausted, upload failure, missing seed) is marked `failed` and
//! reported in its [`SceneResult`]; the batch moves on. A record-store
//! error while settling one scene is a failure of that scene too. Only
//! precondition failures and the initial record load abort an operation.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use storyreel_backends::{
    await_video, GenerationOutcome, ImageBackend, ObjectStore, PollConfig, RetryPolicy,
    VideoBackend, VideoPayload,
};
use storyreel_core::error::CoreError;
use storyreel_core::generation::{
    clip_duration_secs, compose_video_prompt, effective_prompt, validate_video_style,
};
use storyreel_core::phase::{Gate, Phase, ANCHOR_ORDER_INDEX};
use storyreel_core::storage::{
    asset_object_path, detect_image_format, ImageFormat, KIND_IMAGE, KIND_VIDEO,
    VIDEO_CONTENT_TYPE,
};
use storyreel_core::types::DbId;
use storyreel_db::models::asset::UpsertAsset;
use storyreel_db::models::scene::{Scene, SceneScope};
use storyreel_db::models::status::{AssetStatus, AssetType, SceneStatus};
use storyreel_db::store::RecordStore;
use storyreel_events::{event_types, EventBus, PipelineEvent};

use crate::error::{PipelineError, PipelineResult};
use crate::snapshot::ShotListRecords;

/// Per-call prompt replacements, keyed by scene id.
pub type PromptOverrides = HashMap<DbId, String>;

/// Public URLs produced for a scene.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SceneUrls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

/// Outcome of generating one scene's asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneResult {
    pub scene_id: DbId,
    pub order_index: i32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<SceneUrls>,
}

impl SceneResult {
    fn succeeded(scene: &Scene, asset_type: AssetType, url: String) -> Self {
        let urls = match asset_type {
            AssetType::Image => SceneUrls {
                image_url: Some(url),
                video_url: None,
            },
            AssetType::Video => SceneUrls {
                image_url: None,
                video_url: Some(url),
            },
        };
        Self {
            scene_id: scene.id,
            order_index: scene.order_index,
            success: true,
            error: None,
            urls: Some(urls),
        }
    }

    fn failed(scene: &Scene, error: String) -> Self {
        Self {
            scene_id: scene.id,
            order_index: scene.order_index,
            success: false,
            error: Some(error),
            urls: None,
        }
    }
}

/// The external services generation talks to.
#[derive(Clone)]
pub struct Backends {
    pub image: Arc<dyn ImageBackend>,
    pub video: Arc<dyn VideoBackend>,
    pub objects: Arc<dyn ObjectStore>,
}

/// A stored object ready to be recorded as an asset.
struct StoredMedia {
    url: String,
    content_type: String,
}

/// Runs generation operations against one record store.
pub struct GenerationOrchestrator {
    store: Arc<dyn RecordStore>,
    backends: Backends,
    events: Arc<EventBus>,
    retry: RetryPolicy,
    poll: PollConfig,
}

impl GenerationOrchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        backends: Backends,
        events: Arc<EventBus>,
        retry: RetryPolicy,
        poll: PollConfig,
    ) -> Self {
        Self {
            store,
            backends,
            events,
            retry,
            poll,
        }
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Phase A: generate scene 1's image without any reference.
    pub async fn generate_first_image(
        &self,
        shot_list_id: DbId,
        prompt: Option<&str>,
    ) -> PipelineResult<SceneResult> {
        let records = ShotListRecords::load(self.store.as_ref(), shot_list_id).await?;
        let anchor = anchor_scene(&records)?;
        tracing::info!(shot_list_id, scene_id = anchor.id, "Generating anchor image");

        let prompt = effective_prompt(prompt, &anchor.image_prompt);
        Ok(self
            .image_for_scene(shot_list_id, anchor, prompt, None, Phase::FirstImage)
            .await)
    }

    /// Phase B: generate every other scene's image (or just `target`)
    /// using the confirmed anchor image as shared reference.
    pub async fn generate_remaining_images(
        &self,
        shot_list_id: DbId,
        target: Option<DbId>,
        overrides: &PromptOverrides,
    ) -> PipelineResult<Vec<SceneResult>> {
        let records = ShotListRecords::load(self.store.as_ref(), shot_list_id).await?;
        let anchor_image = records
            .anchor()
            .and_then(|a| records.complete_asset(a.id, AssetType::Image));
        let Some(anchor_image) = anchor_image else {
            return Err(CoreError::PhaseInvariant {
                gate: Gate::FirstImage.as_str(),
                reason: "scene 1 has no complete image".to_string(),
                incomplete: vec![ANCHOR_ORDER_INDEX],
            }
            .into());
        };
        if !records.shot_list.gates().is_confirmed(Gate::FirstImage) {
            return Err(CoreError::PhaseInvariant {
                gate: Gate::FirstImage.as_str(),
                reason: "the scene 1 image must be confirmed first".to_string(),
                incomplete: Vec::new(),
            }
            .into());
        }

        let targets = select_targets(&records, target)?;
        let reference = match anchor_image.storage_url.as_deref() {
            Some(url) => self.fetch_bytes(url).await.map_err(|e| {
                PipelineError::ReferenceUnavailable(format!("first image missing: {e}"))
            })?,
            None => {
                return Err(PipelineError::ReferenceUnavailable(
                    "first image missing: no storage url".to_string(),
                ))
            }
        };

        tracing::info!(shot_list_id, scenes = targets.len(), "Generating remaining images");
        let mut results = Vec::with_capacity(targets.len());
        for scene in &targets {
            let prompt = effective_prompt(
                overrides.get(&scene.id).map(String::as_str),
                &scene.image_prompt,
            );
            let result = self
                .image_for_scene(shot_list_id, scene, prompt, Some(&reference), Phase::RemainingImages)
                .await;
            results.push(result);
        }
        Ok(results)
    }

    /// Phase C: generate scene 1's video seeded with its image, in the
    /// caller's candidate `video_style`.
    pub async fn generate_first_video(
        &self,
        shot_list_id: DbId,
        video_style: Option<&str>,
        prompt: Option<&str>,
    ) -> PipelineResult<SceneResult> {
        let style = validate_video_style(video_style)?;
        let records = ShotListRecords::load(self.store.as_ref(), shot_list_id).await?;
        let anchor = anchor_scene(&records)?;
        let Some(anchor_image) = records.complete_asset(anchor.id, AssetType::Image) else {
            return Err(CoreError::PhaseInvariant {
                gate: Gate::FirstImage.as_str(),
                reason: "scene 1 has no complete image".to_string(),
                incomplete: vec![ANCHOR_ORDER_INDEX],
            }
            .into());
        };

        let seed = match anchor_image.storage_url.as_deref() {
            Some(url) => self.fetch_bytes(url).await.map_err(|e| {
                PipelineError::ReferenceUnavailable(format!("first image missing: {e}"))
            })?,
            None => {
                return Err(PipelineError::ReferenceUnavailable(
                    "first image missing: no storage url".to_string(),
                ))
            }
        };

        let scene_prompt = effective_prompt(prompt, &anchor.video_prompt).unwrap_or_default();
        let prompt = compose_video_prompt(&style, &scene_prompt);
        tracing::info!(shot_list_id, scene_id = anchor.id, "Generating anchor video");
        Ok(self
            .video_for_scene(shot_list_id, anchor, &prompt, &seed, Phase::FirstVideo)
            .await)
    }

    /// Phase D: generate every other scene's video (or just `target`),
    /// each seeded with its own image, in the confirmed video style.
    pub async fn generate_remaining_videos(
        &self,
        shot_list_id: DbId,
        target: Option<DbId>,
        overrides: &PromptOverrides,
    ) -> PipelineResult<Vec<SceneResult>> {
        let records = ShotListRecords::load(self.store.as_ref(), shot_list_id).await?;
        let Some(style) = records.shot_list.locked_video_style() else {
            return Err(CoreError::PhaseInvariant {
                gate: Gate::FirstVideo.as_str(),
                reason: "the first video and its style must be confirmed first".to_string(),
                incomplete: Vec::new(),
            }
            .into());
        };

        let targets = select_targets(&records, target)?;
        tracing::info!(shot_list_id, scenes = targets.len(), "Generating remaining videos");

        let mut results = Vec::with_capacity(targets.len());
        for scene in &targets {
            let image_url = records
                .complete_asset(scene.id, AssetType::Image)
                .and_then(|a| a.storage_url.as_deref());
            let Some(image_url) = image_url else {
                let result = self
                    .fail_scene(
                        shot_list_id,
                        scene,
                        Phase::RemainingVideos,
                        "scene has no complete image".to_string(),
                    )
                    .await;
                results.push(result);
                continue;
            };
            let seed = match self.fetch_bytes(image_url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    let result = self
                        .fail_scene(
                            shot_list_id,
                            scene,
                            Phase::RemainingVideos,
                            format!("seed image unavailable: {e}"),
                        )
                        .await;
                    results.push(result);
                    continue;
                }
            };

            let scene_prompt = effective_prompt(
                overrides.get(&scene.id).map(String::as_str),
                &scene.video_prompt,
            )
            .unwrap_or_default();
            let prompt = compose_video_prompt(style, &scene_prompt);
            let result = self
                .video_for_scene(shot_list_id, scene, &prompt, &seed, Phase::RemainingVideos)
                .await;
            results.push(result);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Per-scene steps
    // -----------------------------------------------------------------------

    async fn image_for_scene(
        &self,
        shot_list_id: DbId,
        scene: &Scene,
        prompt: Option<String>,
        reference: Option<&[u8]>,
        phase: Phase,
    ) -> SceneResult {
        let Some(prompt) = prompt else {
            return self
                .fail_scene(shot_list_id, scene, phase, "scene has no image prompt".to_string())
                .await;
        };
        let result = self
            .try_image_for_scene(shot_list_id, scene, &prompt, reference, phase)
            .await;
        self.settle(shot_list_id, scene, phase, result).await
    }

    async fn try_image_for_scene(
        &self,
        shot_list_id: DbId,
        scene: &Scene,
        prompt: &str,
        reference: Option<&[u8]>,
        phase: Phase,
    ) -> PipelineResult<SceneResult> {
        self.store
            .set_scene_status(scene.id, SceneStatus::Generating)
            .await?;

        let outcome = self
            .render_image(shot_list_id, scene, prompt, reference)
            .await;
        let model_id = self.backends.image.model_id().to_string();
        self.finish_scene(shot_list_id, scene, AssetType::Image, outcome, prompt, &model_id, phase)
            .await
    }

    async fn video_for_scene(
        &self,
        shot_list_id: DbId,
        scene: &Scene,
        prompt: &str,
        seed: &[u8],
        phase: Phase,
    ) -> SceneResult {
        let result = self
            .try_video_for_scene(shot_list_id, scene, prompt, seed, phase)
            .await;
        self.settle(shot_list_id, scene, phase, result).await
    }

    async fn try_video_for_scene(
        &self,
        shot_list_id: DbId,
        scene: &Scene,
        prompt: &str,
        seed: &[u8],
        phase: Phase,
    ) -> PipelineResult<SceneResult> {
        self.store
            .set_scene_status(scene.id, SceneStatus::Generating)
            .await?;

        let outcome = self.render_video(shot_list_id, scene, prompt, seed).await;
        let model_id = self.backends.video.model_id().to_string();
        self.finish_scene(shot_list_id, scene, AssetType::Video, outcome, prompt, &model_id, phase)
            .await
    }

    async fn render_image(
        &self,
        shot_list_id: DbId,
        scene: &Scene,
        prompt: &str,
        reference: Option<&[u8]>,
    ) -> Result<StoredMedia, String> {
        let outcome = self
            .retry
            .run("image generation", || {
                self.backends.image.generate(prompt, reference)
            })
            .await
            .map_err(|e| format!("image generation failed: {e}"))?;
        let bytes = match outcome {
            GenerationOutcome::Generated(bytes) => bytes,
            GenerationOutcome::Rejected(reason) => return Err(reason),
        };

        let format = detect_image_format(&bytes).unwrap_or(ImageFormat::Png);
        let path = asset_object_path(shot_list_id, scene.order_index, KIND_IMAGE, format.extension());
        self.upload(&path, bytes, format.content_type()).await
    }

    async fn render_video(
        &self,
        shot_list_id: DbId,
        scene: &Scene,
        prompt: &str,
        seed: &[u8],
    ) -> Result<StoredMedia, String> {
        let duration = clip_duration_secs(scene.duration_seconds);
        let submitted = self
            .retry
            .run("video submission", || {
                self.backends.video.submit(prompt, seed, duration)
            })
            .await
            .map_err(|e| format!("video submission failed: {e}"))?;
        let submission = match submitted {
            GenerationOutcome::Generated(submission) => submission,
            GenerationOutcome::Rejected(reason) => return Err(reason),
        };

        let payload = match await_video(self.backends.video.as_ref(), &submission, &self.poll).await {
            GenerationOutcome::Generated(payload) => payload,
            GenerationOutcome::Rejected(reason) => return Err(reason),
        };
        let bytes = match payload {
            VideoPayload::Bytes(bytes) => bytes,
            VideoPayload::Uri(uri) => self
                .retry
                .run("video download", || self.backends.video.download(&uri))
                .await
                .map_err(|e| format!("video download failed: {e}"))?,
        };
        if bytes.is_empty() {
            return Err("video backend returned no data".to_string());
        }

        let path = asset_object_path(shot_list_id, scene.order_index, KIND_VIDEO, "mp4");
        self.upload(&path, bytes, VIDEO_CONTENT_TYPE).await
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredMedia, String> {
        let url = self
            .retry
            .run("upload", || {
                self.backends.objects.upload(path, bytes.clone(), content_type)
            })
            .await
            .map_err(|e| format!("upload failed: {e}"))?;
        Ok(StoredMedia {
            url,
            content_type: content_type.to_string(),
        })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, storyreel_backends::StorageError> {
        self.retry
            .run("reference fetch", || self.backends.objects.fetch(url))
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish_scene(
        &self,
        shot_list_id: DbId,
        scene: &Scene,
        asset_type: AssetType,
        outcome: Result<StoredMedia, String>,
        prompt: &str,
        model_id: &str,
        phase: Phase,
    ) -> PipelineResult<SceneResult> {
        let media = match outcome {
            Ok(media) => media,
            Err(reason) => return Ok(self.fail_scene(shot_list_id, scene, phase, reason).await),
        };

        self.store
            .upsert_asset(&UpsertAsset {
                scene_id: scene.id,
                asset_type,
                status: AssetStatus::Complete,
                storage_url: Some(media.url.clone()),
                content_type: Some(media.content_type),
                prompt: Some(prompt.to_string()),
                model_id: Some(model_id.to_string()),
                phase: Some(phase.as_str().to_string()),
            })
            .await?;
        let (status, event_type) = match asset_type {
            AssetType::Image => (SceneStatus::ImageComplete, event_types::IMAGE_GENERATED),
            AssetType::Video => (SceneStatus::Complete, event_types::VIDEO_GENERATED),
        };
        self.store.set_scene_status(scene.id, status).await?;

        tracing::info!(
            shot_list_id,
            scene_id = scene.id,
            order_index = scene.order_index,
            phase = %phase,
            "Scene {asset_type} generated",
        );
        self.events.publish(
            PipelineEvent::new(event_type)
                .with_shot_list(shot_list_id)
                .with_scene(scene.id)
                .with_payload(serde_json::json!({
                    "order_index": scene.order_index,
                    "phase": phase.as_str(),
                    "url": media.url,
                })),
        );
        Ok(SceneResult::succeeded(scene, asset_type, media.url))
    }

    /// Turn a record-store error during one scene into that scene's failure.
    async fn settle(
        &self,
        shot_list_id: DbId,
        scene: &Scene,
        phase: Phase,
        result: PipelineResult<SceneResult>,
    ) -> SceneResult {
        match result {
            Ok(result) => result,
            Err(e) => {
                self.fail_scene(shot_list_id, scene, phase, format!("failed to record result: {e}"))
                    .await
            }
        }
    }

    /// Mark `scene` failed (best effort) and report it.
    async fn fail_scene(
        &self,
        shot_list_id: DbId,
        scene: &Scene,
        phase: Phase,
        reason: String,
    ) -> SceneResult {
        if let Err(e) = self
            .store
            .set_scene_status(scene.id, SceneStatus::Failed)
            .await
        {
            tracing::error!(
                scene_id = scene.id,
                error = %e,
                "Failed to mark scene as failed",
            );
        }

        tracing::warn!(
            shot_list_id,
            scene_id = scene.id,
            order_index = scene.order_index,
            phase = %phase,
            error = %reason,
            "Scene generation failed",
        );
        self.events.publish(
            PipelineEvent::new(event_types::GENERATION_FAILED)
                .with_shot_list(shot_list_id)
                .with_scene(scene.id)
                .with_payload(serde_json::json!({
                    "order_index": scene.order_index,
                    "phase": phase.as_str(),
                    "error": reason,
                })),
        );
        SceneResult::failed(scene, reason)
    }
}

/// Scene 1, or a validation error if the shot list has none.
fn anchor_scene(records: &ShotListRecords) -> PipelineResult<&Scene> {
    records.anchor().ok_or_else(|| {
        CoreError::Validation(format!(
            "Shot list {} has no scene {ANCHOR_ORDER_INDEX}",
            records.shot_list.id
        ))
        .into()
    })
}

/// Scenes a batch operation runs over: every scene after the anchor, or
/// the single requested one.
fn select_targets(records: &ShotListRecords, target: Option<DbId>) -> PipelineResult<Vec<Scene>> {
    let Some(scene_id) = target else {
        return Ok(records
            .scenes
            .iter()
            .filter(|s| SceneScope::AfterAnchor.contains(s.order_index))
            .cloned()
            .collect());
    };
    let scene = records
        .scenes
        .iter()
        .find(|s| s.id == scene_id)
        .ok_or(CoreError::NotFound {
            entity: "Scene",
            id: scene_id,
        })?;
    if scene.is_anchor() {
        return Err(CoreError::Validation(
            "Scene 1 is generated by the first-image and first-video operations".to_string(),
        )
        .into());
    }
    Ok(vec![scene.clone()])
}

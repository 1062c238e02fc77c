//! In-memory fakes shared by the pipeline integration suites.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use storyreel_backends::{
    BackendError, GenerationOutcome, ImageBackend, ObjectStore, PollConfig, PollStatus,
    RetryPolicy, StorageError, Submission, VideoBackend, VideoPayload,
};
use storyreel_core::phase::Gate;
use storyreel_core::types::{DbId, Timestamp};
use storyreel_db::models::asset::{Asset, UpsertAsset};
use storyreel_db::models::project::Project;
use storyreel_db::models::scene::Scene;
use storyreel_db::models::shot_list::ShotList;
use storyreel_db::models::status::SceneStatus;
use storyreel_db::store::{
    MemoryStore, RecordStore, ResetPlan, ResetSummary, StoreError, StoreResult,
};
use storyreel_events::EventBus;
use storyreel_pipeline::assembly::{AssemblyEngine, MediaEngine, MediaError, MediaLoader};
use storyreel_pipeline::generation::{Backends, GenerationOrchestrator};
use storyreel_pipeline::reset::ResetTarget;
use storyreel_pipeline::PipelineService;

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-image";

// ---------------------------------------------------------------------------
// Image backend
// ---------------------------------------------------------------------------

/// One recorded image call.
#[derive(Debug, Clone)]
pub struct ImageCall {
    pub prompt: String,
    pub reference: Option<Vec<u8>>,
}

/// Returns a PNG for every prompt, except prompts containing a configured
/// marker which are rejected.
#[derive(Default)]
pub struct FakeImageBackend {
    pub calls: Mutex<Vec<ImageCall>>,
    pub reject_marker: Mutex<Option<String>>,
}

impl FakeImageBackend {
    pub fn reject_prompts_containing(&self, marker: &str) {
        *self.reject_marker.lock().unwrap() = Some(marker.to_string());
    }

    pub fn calls(&self) -> Vec<ImageCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageBackend for FakeImageBackend {
    fn model_id(&self) -> &str {
        "fake-image-1"
    }

    async fn generate(
        &self,
        prompt: &str,
        reference: Option<&[u8]>,
    ) -> Result<GenerationOutcome<Vec<u8>>, BackendError> {
        self.calls.lock().unwrap().push(ImageCall {
            prompt: prompt.to_string(),
            reference: reference.map(<[u8]>::to_vec),
        });
        let marker = self.reject_marker.lock().unwrap().clone();
        if marker.is_some_and(|m| prompt.contains(&m)) {
            return Ok(GenerationOutcome::Rejected("blocked by safety filter".to_string()));
        }
        let mut bytes = PNG.to_vec();
        bytes.extend_from_slice(prompt.as_bytes());
        Ok(GenerationOutcome::Generated(bytes))
    }
}

// ---------------------------------------------------------------------------
// Video backend
// ---------------------------------------------------------------------------

/// One recorded video submission.
#[derive(Debug, Clone)]
pub struct VideoCall {
    pub prompt: String,
    pub seed: Vec<u8>,
    pub duration_secs: f64,
}

/// Finishes every operation on the first poll with a clip whose bytes
/// encode its duration (`clip:5.0`).
#[derive(Default)]
pub struct FakeVideoBackend {
    pub calls: Mutex<Vec<VideoCall>>,
    pub never_finish: Mutex<bool>,
}

impl FakeVideoBackend {
    pub fn calls(&self) -> Vec<VideoCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoBackend for FakeVideoBackend {
    fn model_id(&self) -> &str {
        "fake-video-1"
    }

    async fn submit(
        &self,
        prompt: &str,
        seed_image: &[u8],
        duration_secs: f64,
    ) -> Result<GenerationOutcome<Submission>, BackendError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(VideoCall {
            prompt: prompt.to_string(),
            seed: seed_image.to_vec(),
            duration_secs,
        });
        Ok(GenerationOutcome::Generated(Submission {
            operation_id: format!("op-{}:{duration_secs:.1}", calls.len()),
        }))
    }

    async fn poll(&self, submission: &Submission) -> Result<PollStatus, BackendError> {
        if *self.never_finish.lock().unwrap() {
            return Ok(PollStatus::Pending);
        }
        let duration = submission
            .operation_id
            .rsplit(':')
            .next()
            .unwrap_or("5.0");
        Ok(PollStatus::Done(VideoPayload::Bytes(
            format!("clip:{duration}").into_bytes(),
        )))
    }

    async fn download(&self, uri: &str) -> Result<Vec<u8>, BackendError> {
        Err(BackendError::InvalidResponse(format!("unexpected download of {uri}")))
    }
}

// ---------------------------------------------------------------------------
// Object store
// ---------------------------------------------------------------------------

/// Keeps objects in a map under `mem://` URLs.
#[derive(Default)]
pub struct MemoryObjectStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_uploads: Mutex<bool>,
}

impl MemoryObjectStore {
    pub fn put(&self, url: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes.to_vec());
    }

    pub fn remove(&self, url: &str) {
        self.objects.lock().unwrap().remove(url);
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        if *self.fail_uploads.lock().unwrap() {
            return Err(StorageError::Api {
                status: 503,
                body: "bucket unavailable".to_string(),
            });
        }
        let url = format!("mem://{path}");
        self.objects.lock().unwrap().insert(url.clone(), bytes);
        Ok(url)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(url.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Media engine
// ---------------------------------------------------------------------------

/// Shared counters across every engine a [`FakeMediaLoader`] creates.
#[derive(Default)]
pub struct MediaStats {
    pub loads: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub slots: Mutex<HashMap<String, Vec<u8>>>,
}

impl MediaStats {
    pub fn slot_count(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

/// Media whose bytes are `label:seconds`.
fn duration_of(bytes: &[u8]) -> Result<f64, MediaError> {
    let text = String::from_utf8_lossy(bytes);
    text.rsplit(':')
        .next()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .ok_or_else(|| MediaError::MissingSlot(format!("unreadable media '{text}'")))
}

pub struct FakeMediaLoader {
    pub stats: Arc<MediaStats>,
    pub fail: bool,
}

#[async_trait]
impl MediaLoader for FakeMediaLoader {
    async fn load(&self) -> Result<Box<dyn MediaEngine>, MediaError> {
        if self.fail {
            return Err(MediaError::MissingSlot("ffmpeg".to_string()));
        }
        self.stats.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeMediaEngine {
            stats: Arc::clone(&self.stats),
        }))
    }
}

/// Concat sums clip durations; mix clamps to the shorter input.
pub struct FakeMediaEngine {
    stats: Arc<MediaStats>,
}

impl FakeMediaEngine {
    fn read(&self, slot: &str) -> Result<Vec<u8>, MediaError> {
        self.stats
            .slots
            .lock()
            .unwrap()
            .get(slot)
            .cloned()
            .ok_or_else(|| MediaError::MissingSlot(slot.to_string()))
    }

    fn write(&self, slot: &str, bytes: Vec<u8>) {
        self.stats.slots.lock().unwrap().insert(slot.to_string(), bytes);
    }
}

#[async_trait]
impl MediaEngine for FakeMediaEngine {
    async fn write_slot(&self, slot: &str, bytes: &[u8]) -> Result<(), MediaError> {
        self.write(slot, bytes.to_vec());
        Ok(())
    }

    async fn read_slot(&self, slot: &str) -> Result<Vec<u8>, MediaError> {
        self.read(slot)
    }

    async fn remove_slot(&self, slot: &str) -> Result<(), MediaError> {
        self.stats
            .slots
            .lock()
            .unwrap()
            .remove(slot)
            .map(|_| ())
            .ok_or_else(|| MediaError::MissingSlot(slot.to_string()))
    }

    async fn concat(&self, manifest_slot: &str, output_slot: &str) -> Result<(), MediaError> {
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_active.fetch_max(active, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let manifest = String::from_utf8_lossy(&self.read(manifest_slot)?).to_string();
        let mut total = 0.0;
        for line in manifest.lines() {
            let slot = line.trim_start_matches("file '").trim_end_matches('\'');
            total += duration_of(&self.read(slot)?)?;
        }
        self.write(output_slot, format!("concat:{total:.1}").into_bytes());

        self.stats.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn mix(
        &self,
        video_slot: &str,
        music_slot: &str,
        _music_volume: f32,
        output_slot: &str,
    ) -> Result<(), MediaError> {
        let video = duration_of(&self.read(video_slot)?)?;
        let music = duration_of(&self.read(music_slot)?)?;
        self.write(output_slot, format!("mixed:{:.1}", video.min(music)).into_bytes());
        Ok(())
    }

    async fn duration_secs(&self, slot: &str) -> Result<f64, MediaError> {
        duration_of(&self.read(slot)?)
    }

    async fn shutdown(&self) -> Result<(), MediaError> {
        self.stats.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

// ---------------------------------------------------------------------------
// Record store
// ---------------------------------------------------------------------------

/// Delegates to a [`MemoryStore`] but fails asset writes for chosen scenes
/// and can slip a reset in just before the next gate write.
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    failing_upserts: Mutex<HashSet<DbId>>,
    reset_before_confirm: Mutex<Option<ResetTarget>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            failing_upserts: Mutex::new(HashSet::new()),
            reset_before_confirm: Mutex::new(None),
        }
    }

    pub fn fail_upserts_for(&self, scene_id: DbId) {
        self.failing_upserts.lock().unwrap().insert(scene_id);
    }

    pub fn reset_before_next_confirm(&self, target: ResetTarget) {
        *self.reset_before_confirm.lock().unwrap() = Some(target);
    }

    async fn interleave_reset(&self, shot_list_id: DbId) {
        let target = self.reset_before_confirm.lock().unwrap().take();
        if let Some(target) = target {
            self.inner
                .apply_reset(shot_list_id, target.plan())
                .await
                .unwrap();
        }
    }
}

#[async_trait]
impl RecordStore for FaultyStore {
    async fn find_project(&self, id: DbId) -> StoreResult<Option<Project>> {
        self.inner.find_project(id).await
    }

    async fn find_shot_list(&self, id: DbId) -> StoreResult<Option<ShotList>> {
        self.inner.find_shot_list(id).await
    }

    async fn list_scenes(&self, shot_list_id: DbId) -> StoreResult<Vec<Scene>> {
        self.inner.list_scenes(shot_list_id).await
    }

    async fn list_assets(&self, shot_list_id: DbId) -> StoreResult<Vec<Asset>> {
        self.inner.list_assets(shot_list_id).await
    }

    async fn confirm_gate(
        &self,
        shot_list_id: DbId,
        gate: Gate,
        at: Timestamp,
        video_style: Option<&str>,
    ) -> StoreResult<ShotList> {
        self.interleave_reset(shot_list_id).await;
        self.inner
            .confirm_gate(shot_list_id, gate, at, video_style)
            .await
    }

    async fn confirm_handoff(
        &self,
        shot_list_id: DbId,
        project_id: DbId,
        at: Timestamp,
        step: i32,
    ) -> StoreResult<ShotList> {
        self.inner
            .confirm_handoff(shot_list_id, project_id, at, step)
            .await
    }

    async fn set_scene_status(&self, scene_id: DbId, status: SceneStatus) -> StoreResult<()> {
        self.inner.set_scene_status(scene_id, status).await
    }

    async fn upsert_asset(&self, input: &UpsertAsset) -> StoreResult<Asset> {
        if self.failing_upserts.lock().unwrap().contains(&input.scene_id) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.upsert_asset(input).await
    }

    async fn apply_reset(&self, shot_list_id: DbId, plan: &ResetPlan) -> StoreResult<ResetSummary> {
        self.inner.apply_reset(shot_list_id, plan).await
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<MemoryStore>,
    /// The store the service writes through; wraps `store`.
    pub faults: Arc<FaultyStore>,
    pub image: Arc<FakeImageBackend>,
    pub video: Arc<FakeVideoBackend>,
    pub objects: Arc<MemoryObjectStore>,
    pub media: Arc<MediaStats>,
    pub events: Arc<EventBus>,
    pub service: PipelineService,
    pub shot_list: ShotList,
    pub scenes: Vec<Scene>,
}

impl Harness {
    /// A service over a freshly seeded shot list of `scene_count` scenes.
    pub async fn new(scene_count: i32) -> Self {
        let store = Arc::new(MemoryStore::new());
        let (_, shot_list, scenes) = store.seed_shot_list(scene_count).await;

        let image = Arc::new(FakeImageBackend::default());
        let video = Arc::new(FakeVideoBackend::default());
        let objects = Arc::new(MemoryObjectStore::default());
        let media = Arc::new(MediaStats::default());
        let events = Arc::new(EventBus::default());
        let faults = Arc::new(FaultyStore::new(store.clone()));

        let orchestrator = GenerationOrchestrator::new(
            faults.clone(),
            Backends {
                image: image.clone(),
                video: video.clone(),
                objects: objects.clone(),
            },
            Arc::clone(&events),
            RetryPolicy::new(1, Duration::ZERO),
            PollConfig {
                interval: Duration::from_millis(1),
                max_attempts: 3,
            },
        );
        let assembly = AssemblyEngine::new(
            FakeMediaLoader {
                stats: Arc::clone(&media),
                fail: false,
            },
            objects.clone(),
        );
        let service = PipelineService::new(faults.clone(), orchestrator, assembly, Arc::clone(&events));

        Self {
            store,
            faults,
            image,
            video,
            objects,
            media,
            events,
            service,
            shot_list,
            scenes,
        }
    }

    pub fn scene(&self, order_index: i32) -> &Scene {
        self.scenes
            .iter()
            .find(|s| s.order_index == order_index)
            .unwrap()
    }
}

//! Test application over the in-memory store with fake backends.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use storyreel_backends::{
    BackendError, GenerationOutcome, ImageBackend, ObjectStore, PollConfig, PollStatus,
    RetryPolicy, StorageError, Submission, VideoBackend, VideoPayload,
};
use storyreel_db::store::MemoryStore;
use storyreel_events::EventBus;
use storyreel_pipeline::assembly::{AssemblyEngine, MediaEngine, MediaError, MediaLoader};
use storyreel_pipeline::generation::{Backends, GenerationOrchestrator};
use storyreel_pipeline::PipelineService;
use tower::ServiceExt;

use storyreel_api::config::{PipelineConfig, ServerConfig};
use storyreel_api::router::build_app_router;
use storyreel_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: None,
        pipeline: PipelineConfig {
            image_backend_url: "http://image.test".to_string(),
            image_model: "fake-image".to_string(),
            video_backend_url: "http://video.test".to_string(),
            video_model: "fake-video".to_string(),
            storage_root: PathBuf::from("unused"),
            storage_public_url: "mem://".to_string(),
            retry_max_attempts: 1,
            retry_base_delay: Duration::ZERO,
            video_poll_interval: Duration::from_millis(1),
            video_poll_max_attempts: 2,
            ffmpeg_work_dir: PathBuf::from("unused"),
        },
    }
}

/// Build the full application router over `store`.
pub fn build_test_app(store: Arc<MemoryStore>) -> Router {
    build_test_app_with_objects(store, Arc::new(MemObjects::default()))
}

pub fn build_test_app_with_objects(store: Arc<MemoryStore>, objects: Arc<MemObjects>) -> Router {
    build_test_app_with(
        store,
        objects,
        Arc::new(StubVideo),
        PollConfig {
            interval: Duration::from_millis(1),
            max_attempts: 2,
        },
    )
}

/// Like [`build_test_app`] with a chosen video backend and poll budget.
pub fn build_test_app_with(
    store: Arc<MemoryStore>,
    objects: Arc<MemObjects>,
    video: Arc<dyn VideoBackend>,
    poll: PollConfig,
) -> Router {
    let config = test_config();
    let event_bus = Arc::new(EventBus::default());
    let orchestrator = GenerationOrchestrator::new(
        store.clone(),
        Backends {
            image: Arc::new(StubImage),
            video,
            objects: objects.clone(),
        },
        Arc::clone(&event_bus),
        RetryPolicy::new(1, Duration::ZERO),
        poll,
    );
    let assembly = AssemblyEngine::new(StubMediaLoader, objects);
    let pipeline = Arc::new(PipelineService::new(
        store,
        orchestrator,
        assembly,
        Arc::clone(&event_bus),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        pipeline,
        event_bus,
        pool: None,
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Always returns a PNG; rejects prompts containing `REJECT`.
pub struct StubImage;

#[async_trait]
impl ImageBackend for StubImage {
    fn model_id(&self) -> &str {
        "fake-image"
    }

    async fn generate(
        &self,
        prompt: &str,
        _reference: Option<&[u8]>,
    ) -> Result<GenerationOutcome<Vec<u8>>, BackendError> {
        if prompt.contains("REJECT") {
            return Ok(GenerationOutcome::Rejected("prompt refused".to_string()));
        }
        Ok(GenerationOutcome::Generated(b"\x89PNG\r\n\x1a\nstub".to_vec()))
    }
}

/// Finishes every video on the first poll with a 5 second clip.
pub struct StubVideo;

#[async_trait]
impl VideoBackend for StubVideo {
    fn model_id(&self) -> &str {
        "fake-video"
    }

    async fn submit(
        &self,
        _prompt: &str,
        _seed_image: &[u8],
        _duration_secs: f64,
    ) -> Result<GenerationOutcome<Submission>, BackendError> {
        Ok(GenerationOutcome::Generated(Submission {
            operation_id: "op".to_string(),
        }))
    }

    async fn poll(&self, _submission: &Submission) -> Result<PollStatus, BackendError> {
        Ok(PollStatus::Done(VideoPayload::Bytes(b"clip:5.0".to_vec())))
    }

    async fn download(&self, uri: &str) -> Result<Vec<u8>, BackendError> {
        Err(BackendError::InvalidResponse(format!("unexpected download of {uri}")))
    }
}

/// Reports `Pending` for the first `pending_polls` polls, then a 5 second clip.
pub struct SlowVideo {
    pending_polls: AtomicU32,
}

impl SlowVideo {
    pub fn new(pending_polls: u32) -> Self {
        Self {
            pending_polls: AtomicU32::new(pending_polls),
        }
    }
}

#[async_trait]
impl VideoBackend for SlowVideo {
    fn model_id(&self) -> &str {
        "slow-video"
    }

    async fn submit(
        &self,
        _prompt: &str,
        _seed_image: &[u8],
        _duration_secs: f64,
    ) -> Result<GenerationOutcome<Submission>, BackendError> {
        Ok(GenerationOutcome::Generated(Submission {
            operation_id: "slow-op".to_string(),
        }))
    }

    async fn poll(&self, _submission: &Submission) -> Result<PollStatus, BackendError> {
        let remaining = self.pending_polls.load(Ordering::SeqCst);
        if remaining > 0 {
            self.pending_polls.store(remaining - 1, Ordering::SeqCst);
            return Ok(PollStatus::Pending);
        }
        Ok(PollStatus::Done(VideoPayload::Bytes(b"clip:5.0".to_vec())))
    }

    async fn download(&self, uri: &str) -> Result<Vec<u8>, BackendError> {
        Err(BackendError::InvalidResponse(format!("unexpected download of {uri}")))
    }
}

#[derive(Default)]
pub struct MemObjects {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemObjects {
    pub fn put(&self, url: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes.to_vec());
    }
}

#[async_trait]
impl ObjectStore for MemObjects {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
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

pub struct StubMediaLoader;

#[async_trait]
impl MediaLoader for StubMediaLoader {
    async fn load(&self) -> Result<Box<dyn MediaEngine>, MediaError> {
        Ok(Box::new(StubMedia::default()))
    }
}

/// Media bytes are `label:seconds`; concat sums, mix takes the shorter.
#[derive(Default)]
pub struct StubMedia {
    slots: Mutex<HashMap<String, Vec<u8>>>,
}

impl StubMedia {
    fn read(&self, slot: &str) -> Result<Vec<u8>, MediaError> {
        self.slots
            .lock()
            .unwrap()
            .get(slot)
            .cloned()
            .ok_or_else(|| MediaError::MissingSlot(slot.to_string()))
    }

    fn secs(&self, slot: &str) -> Result<f64, MediaError> {
        let bytes = self.read(slot)?;
        String::from_utf8_lossy(&bytes)
            .rsplit(':')
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| MediaError::MissingSlot(slot.to_string()))
    }
}

#[async_trait]
impl MediaEngine for StubMedia {
    async fn write_slot(&self, slot: &str, bytes: &[u8]) -> Result<(), MediaError> {
        self.slots
            .lock()
            .unwrap()
            .insert(slot.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read_slot(&self, slot: &str) -> Result<Vec<u8>, MediaError> {
        self.read(slot)
    }

    async fn remove_slot(&self, slot: &str) -> Result<(), MediaError> {
        self.slots.lock().unwrap().remove(slot);
        Ok(())
    }

    async fn concat(&self, manifest_slot: &str, output_slot: &str) -> Result<(), MediaError> {
        let manifest = String::from_utf8_lossy(&self.read(manifest_slot)?).to_string();
        let mut total = 0.0;
        for line in manifest.lines() {
            total += self.secs(line.trim_start_matches("file '").trim_end_matches('\''))?;
        }
        self.write_slot(output_slot, format!("concat:{total:.1}").as_bytes())
            .await
    }

    async fn mix(
        &self,
        video_slot: &str,
        music_slot: &str,
        _music_volume: f32,
        output_slot: &str,
    ) -> Result<(), MediaError> {
        let secs = self.secs(video_slot)?.min(self.secs(music_slot)?);
        self.write_slot(output_slot, format!("mixed:{secs:.1}").as_bytes())
            .await
    }

    async fn duration_secs(&self, slot: &str) -> Result<f64, MediaError> {
        self.secs(slot)
    }

    async fn shutdown(&self) -> Result<(), MediaError> {
        Ok(())
    }
}

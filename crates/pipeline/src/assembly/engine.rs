//! The assembly engine: one lazily loaded media engine, runs serialised.

use std::sync::Arc;

use storyreel_backends::ObjectStore;
use storyreel_core::assembly::{
    clip_slot_name, fetch_progress, order_clips, validate_volume, AssemblyProgress, AssemblyStage,
    ClipSpec, CONCAT_SLOT, DEFAULT_MUSIC_VOLUME, MANIFEST_SLOT, MIXED_SLOT, MUSIC_SLOT,
};
use storyreel_core::ffmpeg::concat_manifest;
use storyreel_core::storage::VIDEO_CONTENT_TYPE;
use tokio::sync::Mutex;

use crate::assembly::media::{MediaEngine, MediaError, MediaLoader};

/// Receives progress reports during a run.
pub type ProgressFn = dyn Fn(AssemblyProgress) + Send + Sync;

/// Errors that abort an assembly run. No partial output is produced.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("At least one clip is required")]
    NoClips,

    #[error("Invalid clip list: {0}")]
    InvalidClips(String),

    #[error("Music volume must be between 0.0 and 1.0, got {0}")]
    InvalidVolume(f32),

    #[error("Failed to load media engine: {0}")]
    Load(#[source] MediaError),

    /// `index` is the clip's 0-based position in assembly order.
    #[error("Failed to fetch clip {index}: {message}")]
    Fetch { index: usize, message: String },

    #[error("Assembly stage '{stage}' failed: {message}")]
    Stage { stage: &'static str, message: String },
}

impl AssemblyError {
    fn stage(stage: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Stage {
            stage,
            message: err.to_string(),
        }
    }
}

/// Inputs of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyRequest {
    pub clips: Vec<ClipSpec>,
    pub music_url: Option<String>,
    /// Background track volume; defaults to 0.3.
    pub music_volume: Option<f32>,
}

/// The exported final cut.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyOutput {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub duration_secs: f64,
    pub clip_count: usize,
}

/// Concatenates clips into one deliverable.
///
/// The media engine is loaded on the first run and reused until
/// [`shutdown`](Self::shutdown). The engine lock is held for the whole run,
/// so concurrent runs queue behind each other.
pub struct AssemblyEngine {
    loader: Box<dyn MediaLoader>,
    sources: Arc<dyn ObjectStore>,
    engine: Mutex<Option<Box<dyn MediaEngine>>>,
}

impl AssemblyEngine {
    pub fn new(loader: impl MediaLoader + 'static, sources: Arc<dyn ObjectStore>) -> Self {
        Self {
            loader: Box::new(loader),
            sources,
            engine: Mutex::new(None),
        }
    }

    pub async fn is_loaded(&self) -> bool {
        self.engine.lock().await.is_some()
    }

    /// Run every stage for `request`, reporting through `on_progress`.
    pub async fn assemble(
        &self,
        request: AssemblyRequest,
        on_progress: &ProgressFn,
    ) -> Result<AssemblyOutput, AssemblyError> {
        if request.clips.is_empty() {
            return Err(AssemblyError::NoClips);
        }
        let clips = order_clips(request.clips).map_err(|e| AssemblyError::InvalidClips(e.to_string()))?;
        let music_volume = request.music_volume.unwrap_or(DEFAULT_MUSIC_VOLUME);
        if validate_volume(music_volume).is_err() {
            return Err(AssemblyError::InvalidVolume(music_volume));
        }

        let mut guard = self.engine.lock().await;
        if guard.is_none() {
            on_progress(AssemblyProgress::new(AssemblyStage::Loading, 0, "Loading media engine"));
            let loaded = self.loader.load().await.map_err(AssemblyError::Load)?;
            *guard = Some(loaded);
        }
        let engine = guard
            .as_deref()
            .ok_or_else(|| AssemblyError::stage("load", "media engine unavailable"))?;
        on_progress(AssemblyProgress::new(AssemblyStage::Loading, 100, "Media engine ready"));

        let mut slots = Vec::new();
        let result = self
            .run(engine, &clips, request.music_url.as_deref(), music_volume, &mut slots, on_progress)
            .await;
        cleanup(engine, &slots).await;

        match &result {
            Ok(output) => tracing::info!(
                clips = output.clip_count,
                duration_secs = output.duration_secs,
                size = output.bytes.len(),
                "Assembly complete",
            ),
            Err(e) => tracing::error!(error = %e, "Assembly failed"),
        }
        result
    }

    /// Tear the media engine down. The next run loads a fresh one.
    pub async fn shutdown(&self) {
        let Some(engine) = self.engine.lock().await.take() else {
            return;
        };
        if let Err(e) = engine.shutdown().await {
            tracing::warn!(error = %e, "Media engine shutdown failed");
        } else {
            tracing::info!("Media engine shut down");
        }
    }

    async fn run(
        &self,
        engine: &dyn MediaEngine,
        clips: &[ClipSpec],
        music_url: Option<&str>,
        music_volume: f32,
        slots: &mut Vec<String>,
        on_progress: &ProgressFn,
    ) -> Result<AssemblyOutput, AssemblyError> {
        let total = clips.len();

        // Fetch
        let mut clip_slots = Vec::with_capacity(total);
        for (index, clip) in clips.iter().enumerate() {
            let bytes = self
                .sources
                .fetch(&clip.url)
                .await
                .map_err(|e| AssemblyError::Fetch {
                    index,
                    message: e.to_string(),
                })?;
            let slot = clip_slot_name(index);
            slots.push(slot.clone());
            engine
                .write_slot(&slot, &bytes)
                .await
                .map_err(|e| AssemblyError::Fetch {
                    index,
                    message: e.to_string(),
                })?;
            clip_slots.push(slot);
            on_progress(AssemblyProgress::new(
                AssemblyStage::Fetching,
                fetch_progress(index, total),
                format!("Fetched clip {} of {total}", index + 1),
            ));
        }

        // Manifest + concat
        slots.push(MANIFEST_SLOT.to_string());
        engine
            .write_slot(MANIFEST_SLOT, concat_manifest(&clip_slots).as_bytes())
            .await
            .map_err(|e| AssemblyError::stage("manifest", e))?;
        on_progress(AssemblyProgress::new(AssemblyStage::Processing, 0, "Concatenating clips"));
        slots.push(CONCAT_SLOT.to_string());
        engine
            .concat(MANIFEST_SLOT, CONCAT_SLOT)
            .await
            .map_err(|e| AssemblyError::stage("concat", e))?;
        on_progress(AssemblyProgress::new(AssemblyStage::Processing, 100, "Clips concatenated"));

        // Optional mix
        let final_slot = match music_url {
            Some(url) => {
                on_progress(AssemblyProgress::new(AssemblyStage::Encoding, 0, "Mixing background track"));
                let music = self
                    .sources
                    .fetch(url)
                    .await
                    .map_err(|e| AssemblyError::stage("music", e))?;
                slots.push(MUSIC_SLOT.to_string());
                engine
                    .write_slot(MUSIC_SLOT, &music)
                    .await
                    .map_err(|e| AssemblyError::stage("music", e))?;
                slots.push(MIXED_SLOT.to_string());
                engine
                    .mix(CONCAT_SLOT, MUSIC_SLOT, music_volume, MIXED_SLOT)
                    .await
                    .map_err(|e| AssemblyError::stage("mix", e))?;
                on_progress(AssemblyProgress::new(AssemblyStage::Encoding, 100, "Background track mixed"));
                MIXED_SLOT
            }
            None => CONCAT_SLOT,
        };

        // Export
        let bytes = engine
            .read_slot(final_slot)
            .await
            .map_err(|e| AssemblyError::stage("export", e))?;
        let duration_secs = engine
            .duration_secs(final_slot)
            .await
            .map_err(|e| AssemblyError::stage("export", e))?;
        on_progress(AssemblyProgress::new(
            AssemblyStage::Complete,
            100,
            format!("Assembled {total} clips ({duration_secs:.1}s)"),
        ));

        Ok(AssemblyOutput {
            bytes,
            content_type: VIDEO_CONTENT_TYPE,
            duration_secs,
            clip_count: total,
        })
    }
}

/// Remove every slot a run touched. Failures are only logged.
async fn cleanup(engine: &dyn MediaEngine, slots: &[String]) {
    for slot in slots.iter().rev() {
        if let Err(e) = engine.remove_slot(slot).await {
            tracing::debug!(slot = %slot, error = %e, "Slot cleanup failed");
        }
    }
}

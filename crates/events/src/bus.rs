//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the pipeline service
//! and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storyreel_core::types::DbId;
use tokio::sync::broadcast;

/// Event names published by the pipeline.
pub mod event_types {
    pub const IMAGE_GENERATED: &str = "scene.image_generated";
    pub const VIDEO_GENERATED: &str = "scene.video_generated";
    pub const GENERATION_FAILED: &str = "scene.generation_failed";
    pub const GATE_CONFIRMED: &str = "shot_list.gate_confirmed";
    pub const PHASE_RESET: &str = "shot_list.phase_reset";
    pub const ASSEMBLY_PROGRESS: &str = "assembly.progress";
}

// ---------------------------------------------------------------------------
// PipelineEvent
// ---------------------------------------------------------------------------

/// Something that happened to a shot list, one of its scenes, or an
/// assembly run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Dot-separated event name, see [`event_types`].
    pub event_type: String,

    /// Shot list the event belongs to, if any.
    pub shot_list_id: Option<DbId>,

    /// Scene the event is about, if any.
    pub scene_id: Option<DbId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl PipelineEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            shot_list_id: None,
            scene_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_shot_list(mut self, shot_list_id: DbId) -> Self {
        self.shot_list_id = Some(shot_list_id);
        self
    }

    pub fn with_scene(mut self, scene_id: DbId) -> Self {
        self.scene_id = Some(scene_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
///
/// When the buffer is full the oldest unread events are dropped and slow
/// receivers observe `RecvError::Lagged`.
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped silently when
    /// nobody is listening.
    pub fn publish(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Storyreel pipeline event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PipelineEvent`]: the envelope for generation, gate, reset and
//!   assembly events.
//! - [`EventLog`]: background subscriber that writes every event to the
//!   tracing output.

pub mod bus;
pub mod log;

pub use bus::{event_types, EventBus, PipelineEvent};
pub use log::EventLog;

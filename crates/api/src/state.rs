use std::sync::Arc;

use storyreel_db::DbPool;
use storyreel_events::EventBus;
use storyreel_pipeline::PipelineService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind an `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Generation, gates, resets and assembly over the configured store.
    pub pipeline: Arc<PipelineService>,
    pub event_bus: Arc<EventBus>,
    /// Present only when running against PostgreSQL.
    pub pool: Option<DbPool>,
}

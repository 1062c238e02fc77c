//! Tracing sink for pipeline events.

use tokio::sync::broadcast;

use crate::bus::PipelineEvent;

/// Background subscriber that logs every [`PipelineEvent`].
pub struct EventLog;

impl EventLog {
    /// Run until the bus is dropped.
    pub async fn run(mut receiver: broadcast::Receiver<PipelineEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    tracing::info!(
                        event_type = %event.event_type,
                        shot_list_id = ?event.shot_list_id,
                        scene_id = ?event.scene_id,
                        payload = %event.payload,
                        "Pipeline event"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event log lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, event log shutting down");
                    break;
                }
            }
        }
    }
}

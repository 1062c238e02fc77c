//! User confirmations that advance the workflow.
//!
//! A confirmation is checked against a fresh snapshot and rejected without
//! writing anything when its precondition does not hold. The store re-checks
//! gate order when it writes, so a reset landing in between is also caught.

use chrono::Utc;
use serde::Serialize;
use storyreel_core::error::CoreError;
use storyreel_core::generation::validate_video_style;
use storyreel_core::phase::{check_gate, resolve_phase, Gate, Phase, HANDOFF_STEP};
use storyreel_core::types::DbId;
use storyreel_db::store::{RecordStore, StoreError};
use storyreel_events::{event_types, EventBus, PipelineEvent};

use crate::error::{PipelineError, PipelineResult};
use crate::snapshot::{build_snapshot, ShotListRecords};

/// Result of a successful confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmOutcome {
    pub next_phase: Phase,
    /// Set only by the final hand-off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<i32>,
}

/// Confirm `gate` for a shot list.
///
/// `all_videos` also moves the owning project to the next wizard step in
/// the same store call.
pub async fn confirm(
    store: &dyn RecordStore,
    events: &EventBus,
    shot_list_id: DbId,
    gate: Gate,
    video_style: Option<&str>,
) -> PipelineResult<ConfirmOutcome> {
    let records = ShotListRecords::load(store, shot_list_id).await?;
    check_gate(&records.snapshot(), gate, video_style)?;

    let now = Utc::now();
    let (shot_list, next_step) = match gate {
        Gate::FirstVideo => {
            let style = validate_video_style(video_style)?;
            let updated = store
                .confirm_gate(shot_list_id, gate, now, Some(&style))
                .await
                .map_err(out_of_order)?;
            (updated, None)
        }
        Gate::AllVideos => {
            let updated = store
                .confirm_handoff(shot_list_id, records.shot_list.project_id, now, HANDOFF_STEP)
                .await
                .map_err(out_of_order)?;
            (updated, Some(HANDOFF_STEP))
        }
        Gate::FirstImage | Gate::AllImages => {
            let updated = store
                .confirm_gate(shot_list_id, gate, now, None)
                .await
                .map_err(out_of_order)?;
            (updated, None)
        }
    };

    let next_phase = resolve_phase(&build_snapshot(
        &records.scenes,
        &records.assets,
        Some(&shot_list),
    ));
    tracing::info!(shot_list_id, gate = %gate, next_phase = %next_phase, "Gate confirmed");
    events.publish(
        PipelineEvent::new(event_types::GATE_CONFIRMED)
            .with_shot_list(shot_list_id)
            .with_payload(serde_json::json!({
                "gate": gate.as_str(),
                "next_phase": next_phase.as_str(),
                "next_step": next_step,
            })),
    );

    Ok(ConfirmOutcome {
        next_phase,
        next_step,
    })
}

/// A gate write the store refused because its predecessor was cleared
/// after the check.
fn out_of_order(err: StoreError) -> PipelineError {
    match err {
        StoreError::GateOutOfOrder { gate, requires } => CoreError::PhaseInvariant {
            gate: gate.as_str(),
            reason: format!("gate '{requires}' is no longer confirmed"),
            incomplete: Vec::new(),
        }
        .into(),
        other => other.into(),
    }
}

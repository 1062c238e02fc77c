use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// A confirmation was attempted before its completion predicate holds.
    ///
    /// `incomplete` lists the 1-based scene order indices still missing
    /// their asset (empty when the failure is about gate ordering).
    #[error("Phase gate '{gate}' not satisfied: {reason}")]
    PhaseInvariant {
        gate: &'static str,
        reason: String,
        incomplete: Vec<i32>,
    },
}

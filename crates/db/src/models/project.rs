//! Project model. Owned by the surrounding wizard; this workspace only
//! reads it and performs the final step hand-off.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use storyreel_core::types::{DbId, Timestamp};

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub name: String,
    /// Wizard stage marker.
    pub current_step: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new project.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub name: String,
    /// Defaults to 1 if omitted.
    pub current_step: Option<i32>,
}

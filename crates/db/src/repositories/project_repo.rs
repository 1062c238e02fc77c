//! Repository for the `projects` table.

use sqlx::{PgExecutor, PgPool};
use storyreel_core::types::DbId;

use crate::models::project::{CreateProject, Project};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, current_step, created_at, updated_at";

/// Provides the project operations this workspace needs.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a new project, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateProject) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (name, current_step)
             VALUES ($1, COALESCE($2, 1))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(&input.name)
            .bind(input.current_step)
            .fetch_one(pool)
            .await
    }

    /// Find a project by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Set the wizard stage marker. Returns `false` if no row matched.
    pub async fn set_current_step<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        step: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE projects SET current_step = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(step)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

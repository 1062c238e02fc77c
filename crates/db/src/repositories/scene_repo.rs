//! Repository for the `scenes` table.

use sqlx::{PgExecutor, PgPool};
use storyreel_core::types::DbId;

use crate::models::scene::{CreateScene, Scene, SceneScope};
use crate::models::status::SceneStatus;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, shot_list_id, order_index, image_prompt, video_prompt, \
    duration_seconds, status_id, created_at, updated_at";

/// Provides CRUD operations for scenes.
pub struct SceneRepo;

impl SceneRepo {
    /// Insert a new scene in `pending` status, returning the created row.
    pub async fn create(
        pool: &PgPool,
        shot_list_id: DbId,
        input: &CreateScene,
    ) -> Result<Scene, sqlx::Error> {
        let query = format!(
            "INSERT INTO scenes
                (shot_list_id, order_index, image_prompt, video_prompt, duration_seconds, status_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Scene>(&query)
            .bind(shot_list_id)
            .bind(input.order_index)
            .bind(&input.image_prompt)
            .bind(&input.video_prompt)
            .bind(input.duration_seconds)
            .bind(SceneStatus::Pending.id())
            .fetch_one(pool)
            .await
    }

    /// List all scenes of a shot list, ordered by `order_index` ascending.
    pub async fn list_by_shot_list(
        pool: &PgPool,
        shot_list_id: DbId,
    ) -> Result<Vec<Scene>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM scenes
             WHERE shot_list_id = $1
             ORDER BY order_index ASC"
        );
        sqlx::query_as::<_, Scene>(&query)
            .bind(shot_list_id)
            .fetch_all(pool)
            .await
    }

    /// Set one scene's status. Returns `false` if no row matched.
    pub async fn update_status(
        pool: &PgPool,
        id: DbId,
        status: SceneStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE scenes SET status_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the status of every scene in `scope`. Returns the number of rows updated.
    pub async fn update_status_in_scope<'e, E: PgExecutor<'e>>(
        executor: E,
        shot_list_id: DbId,
        scope: SceneScope,
        status: SceneStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE scenes SET status_id = $3, updated_at = NOW()
             WHERE shot_list_id = $1 AND order_index >= $2",
        )
        .bind(shot_list_id)
        .bind(scope.min_order_index())
        .bind(status.id())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}

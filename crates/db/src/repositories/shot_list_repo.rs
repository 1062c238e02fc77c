//! Repository for the `shot_lists` table.

use sqlx::{PgExecutor, PgPool};
use storyreel_core::phase::Gate;
use storyreel_core::types::{DbId, Timestamp};

use crate::models::shot_list::{ShotList, ShotListField};
use crate::repositories::ProjectRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, project_id, video_style, first_image_confirmed_at, \
    all_images_confirmed_at, first_video_confirmed_at, all_videos_confirmed_at, \
    created_at, updated_at";

/// Provides gate and reset operations for shot lists.
pub struct ShotListRepo;

impl ShotListRepo {
    /// Insert an empty shot list for a project.
    pub async fn create(pool: &PgPool, project_id: DbId) -> Result<ShotList, sqlx::Error> {
        let query = format!(
            "INSERT INTO shot_lists (project_id) VALUES ($1) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ShotList>(&query)
            .bind(project_id)
            .fetch_one(pool)
            .await
    }

    /// Find a shot list by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ShotList>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM shot_lists WHERE id = $1");
        sqlx::query_as::<_, ShotList>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Record a passed gate. When `video_style` is `Some` it is written in
    /// the same statement.
    ///
    /// Only matches while the gate's predecessor is confirmed. Returns
    /// `None` if the row is missing or the predecessor is null.
    pub async fn confirm<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        gate: Gate,
        at: Timestamp,
        video_style: Option<&str>,
    ) -> Result<Option<ShotList>, sqlx::Error> {
        let column = ShotListField::for_gate(gate).column();
        let guard = gate
            .requires()
            .map(|prev| format!(" AND {} IS NOT NULL", ShotListField::for_gate(prev).column()))
            .unwrap_or_default();
        let query = format!(
            "UPDATE shot_lists SET
                {column} = $2,
                video_style = COALESCE($3, video_style),
                updated_at = NOW()
             WHERE id = $1{guard}
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ShotList>(&query)
            .bind(id)
            .bind(at)
            .bind(video_style)
            .fetch_optional(executor)
            .await
    }

    /// Null out `fields`. Returns `false` if no row matched.
    pub async fn clear_fields<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        fields: &[ShotListField],
    ) -> Result<bool, sqlx::Error> {
        let mut assignments: Vec<String> = fields
            .iter()
            .map(|f| format!("{} = NULL", f.column()))
            .collect();
        assignments.push("updated_at = NOW()".to_string());
        let query = format!(
            "UPDATE shot_lists SET {} WHERE id = $1",
            assignments.join(", ")
        );
        let result = sqlx::query(&query).bind(id).execute(executor).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the final gate and hand the project over to the next wizard
    /// step in one transaction.
    ///
    /// Returns `None` (and writes nothing) if the shot list does not exist or
    /// its first-video gate is not confirmed.
    pub async fn confirm_handoff(
        pool: &PgPool,
        id: DbId,
        project_id: DbId,
        at: Timestamp,
        step: i32,
    ) -> Result<Option<ShotList>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let Some(shot_list) = Self::confirm(&mut *tx, id, Gate::AllVideos, at, None).await? else {
            return Ok(None);
        };
        ProjectRepo::set_current_step(&mut *tx, project_id, step).await?;
        tx.commit().await?;
        Ok(Some(shot_list))
    }
}

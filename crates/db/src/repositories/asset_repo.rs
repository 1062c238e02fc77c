//! Repository for the `assets` table.

use sqlx::{PgExecutor, PgPool};
use storyreel_core::types::DbId;

use crate::models::asset::{Asset, UpsertAsset};
use crate::models::scene::SceneScope;
use crate::models::status::AssetType;

/// Column list for `assets` queries.
const COLUMNS: &str = "\
    id, scene_id, asset_type_id, status_id, storage_url, content_type, \
    prompt, model_id, phase, created_at, updated_at";

/// Same columns qualified with the `a.` alias for joined queries.
const COLUMNS_QUALIFIED: &str = "\
    a.id, a.scene_id, a.asset_type_id, a.status_id, a.storage_url, a.content_type, \
    a.prompt, a.model_id, a.phase, a.created_at, a.updated_at";

/// Provides upsert/list/delete operations for generated assets.
pub struct AssetRepo;

impl AssetRepo {
    /// Insert the asset for `(scene_id, asset_type)` or overwrite the
    /// existing one, returning the stored row.
    pub async fn upsert(pool: &PgPool, input: &UpsertAsset) -> Result<Asset, sqlx::Error> {
        let query = format!(
            "INSERT INTO assets
                (scene_id, asset_type_id, status_id, storage_url, content_type,
                 prompt, model_id, phase)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT ON CONSTRAINT uq_assets_scene_type DO UPDATE SET
                status_id = EXCLUDED.status_id,
                storage_url = EXCLUDED.storage_url,
                content_type = EXCLUDED.content_type,
                prompt = EXCLUDED.prompt,
                model_id = EXCLUDED.model_id,
                phase = EXCLUDED.phase,
                updated_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Asset>(&query)
            .bind(input.scene_id)
            .bind(input.asset_type.id())
            .bind(input.status.id())
            .bind(&input.storage_url)
            .bind(&input.content_type)
            .bind(&input.prompt)
            .bind(&input.model_id)
            .bind(&input.phase)
            .fetch_one(pool)
            .await
    }

    /// List every asset belonging to the scenes of a shot list, in scene order.
    pub async fn list_by_shot_list(
        pool: &PgPool,
        shot_list_id: DbId,
    ) -> Result<Vec<Asset>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS_QUALIFIED} FROM assets a
             JOIN scenes s ON s.id = a.scene_id
             WHERE s.shot_list_id = $1
             ORDER BY s.order_index ASC, a.asset_type_id ASC"
        );
        sqlx::query_as::<_, Asset>(&query)
            .bind(shot_list_id)
            .fetch_all(pool)
            .await
    }

    /// Delete every asset of `asset_type` whose scene is in `scope`.
    /// Returns the number of rows removed.
    pub async fn delete_in_scope<'e, E: PgExecutor<'e>>(
        executor: E,
        shot_list_id: DbId,
        asset_type: AssetType,
        scope: SceneScope,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM assets a USING scenes s
             WHERE a.scene_id = s.id
               AND s.shot_list_id = $1
               AND a.asset_type_id = $2
               AND s.order_index >= $3",
        )
        .bind(shot_list_id)
        .bind(asset_type.id())
        .bind(scope.min_order_index())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}

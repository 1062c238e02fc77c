//! Generated asset model and DTOs.
//!
//! At most one asset exists per `(scene_id, asset_type_id)`; every write
//! is an upsert keyed on that pair.

use serde::Serialize;
use sqlx::FromRow;
use storyreel_core::types::{DbId, Timestamp};

use crate::models::status::{AssetStatus, AssetType, StatusId};

/// A row from the `assets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Asset {
    pub id: DbId,
    pub scene_id: DbId,
    pub asset_type_id: StatusId,
    pub status_id: StatusId,
    /// Public URL returned by the object store.
    pub storage_url: Option<String>,
    pub content_type: Option<String>,
    // -- Generation metadata --
    pub prompt: Option<String>,
    pub model_id: Option<String>,
    pub phase: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Asset {
    pub fn asset_type(&self) -> Option<AssetType> {
        AssetType::from_id(self.asset_type_id)
    }

    pub fn status(&self) -> Option<AssetStatus> {
        AssetStatus::from_id(self.status_id)
    }

    pub fn is_complete(&self) -> bool {
        self.status_id == AssetStatus::Complete.id()
    }

    pub fn is(&self, asset_type: AssetType) -> bool {
        self.asset_type_id == asset_type.id()
    }
}

/// DTO for inserting or overwriting the asset of a `(scene, type)` pair.
#[derive(Debug, Clone)]
pub struct UpsertAsset {
    pub scene_id: DbId,
    pub asset_type: AssetType,
    pub status: AssetStatus,
    pub storage_url: Option<String>,
    pub content_type: Option<String>,
    pub prompt: Option<String>,
    pub model_id: Option<String>,
    pub phase: Option<String>,
}

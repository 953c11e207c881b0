use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::storage::{UploadedAsset, validate_remote_id};
use serde::{Deserialize, Serialize};

use crate::entity::asset;
use crate::error::AppError;

/// Metadata of an image already uploaded to the asset store.
///
/// Owner create/update requests carry this instead of raw bytes. Obtain it
/// from `POST /api/v1/assets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AssetMetadata {
    /// Store-assigned object key.
    #[schema(example = "sliders/0192f0c4e5a87d3b9c1e2f3a4b5c6d7e.webp")]
    pub remote_id: String,
    /// Public URL of the object.
    #[schema(example = "/static/assets/sliders/0192f0c4e5a87d3b9c1e2f3a4b5c6d7e.webp")]
    pub url: String,
    #[schema(example = 1920)]
    pub width: u32,
    #[schema(example = 1080)]
    pub height: u32,
    /// File extension of the detected format.
    #[schema(example = "webp")]
    pub format: String,
    #[schema(example = 245_760)]
    pub byte_size: u64,
}

impl From<UploadedAsset> for AssetMetadata {
    fn from(uploaded: UploadedAsset) -> Self {
        Self {
            remote_id: uploaded.remote_id,
            url: uploaded.url,
            width: uploaded.width,
            height: uploaded.height,
            format: uploaded.format,
            byte_size: uploaded.byte_size,
        }
    }
}

impl AssetMetadata {
    /// Whether `row` already describes exactly this object.
    pub fn matches(&self, row: &asset::Model) -> bool {
        self.remote_id == row.remote_id
            && self.url == row.url
            && i64::from(self.width) == i64::from(row.width)
            && i64::from(self.height) == i64::from(row.height)
            && self.format == row.format
            && i64::try_from(self.byte_size).is_ok_and(|size| size == row.byte_size)
    }
}

pub fn validate_metadata(meta: &AssetMetadata) -> Result<(), AppError> {
    validate_remote_id(&meta.remote_id).map_err(|e| AppError::Validation(e.to_string()))?;
    if meta.url.trim().is_empty() || meta.url.len() > 2048 {
        return Err(AppError::Validation(
            "Asset URL must be 1-2048 characters".into(),
        ));
    }
    if meta.width == 0 || meta.height == 0 {
        return Err(AppError::Validation(
            "Asset dimensions must be positive".into(),
        ));
    }
    // Asset rows store dimensions as INTEGER and size as BIGINT.
    if i32::try_from(meta.width).is_err() {
        return Err(AppError::Validation("Asset width is out of range".into()));
    }
    if i32::try_from(meta.height).is_err() {
        return Err(AppError::Validation("Asset height is out of range".into()));
    }
    if i64::try_from(meta.byte_size).is_err() {
        return Err(AppError::Validation("Asset size is out of range".into()));
    }
    if meta.format.trim().is_empty() {
        return Err(AppError::Validation("Asset format must not be empty".into()));
    }
    Ok(())
}

/// Validate an optional or PATCH-style asset field.
pub fn validate_asset_field(field: Option<Option<&AssetMetadata>>) -> Result<(), AppError> {
    match field {
        Some(Some(meta)) => validate_metadata(meta),
        _ => Ok(()),
    }
}

/// An image attached to a resource.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AssetResponse {
    pub id: i32,
    pub remote_id: String,
    pub url: String,
    pub width: i32,
    pub height: i32,
    pub format: String,
    pub byte_size: i64,
    pub created_at: DateTime<Utc>,
}

impl From<asset::Model> for AssetResponse {
    fn from(m: asset::Model) -> Self {
        Self {
            id: m.id,
            remote_id: m.remote_id,
            url: m.url,
            width: m.width,
            height: m.height,
            format: m.format,
            byte_size: m.byte_size,
            created_at: m.created_at,
        }
    }
}

/// Look up an owner's referenced asset among preloaded rows.
pub fn embed(assets: &HashMap<i32, asset::Model>, id: Option<i32>) -> Option<AssetResponse> {
    id.and_then(|id| assets.get(&id))
        .cloned()
        .map(AssetResponse::from)
}

/// A remote delete that failed on a lenient path.
///
/// The database change went ahead; the object may linger in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct RemoteFailure {
    pub remote_id: String,
    pub message: String,
}

/// Response body for deleting a resource that owns assets.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DeleteResponse {
    pub id: i32,
    pub remote_failures: Vec<RemoteFailure>,
}

/// Response body for discarding an uploaded object.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DiscardAssetResponse {
    pub remote_id: String,
    /// Whether the object still existed in the store.
    pub found: bool,
}

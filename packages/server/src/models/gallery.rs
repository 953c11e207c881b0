use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::{AssetMetadata, AssetResponse, embed, validate_metadata};
use super::shared::{double_option, validate_optional_text};
use crate::entity::{asset, gallery_item};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateGalleryItemRequest {
    pub caption: Option<String>,
    pub image: AssetMetadata,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateGalleryItemRequest {
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub caption: Option<Option<String>>,
    /// Replaces the image. A gallery item always has one.
    pub image: Option<AssetMetadata>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct GalleryItemResponse {
    pub id: i32,
    pub caption: Option<String>,
    pub image: Option<AssetResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response body for a gallery bulk delete.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct GalleryBulkDeleteResponse {
    pub removed: Vec<i32>,
    pub remote_failures: Vec<super::asset::RemoteFailure>,
}

impl GalleryItemResponse {
    pub fn build(m: gallery_item::Model, assets: &HashMap<i32, asset::Model>) -> Self {
        Self {
            image: embed(assets, m.image_id),
            id: m.id,
            caption: m.caption,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

pub fn validate_create_gallery_item(req: &CreateGalleryItemRequest) -> Result<(), AppError> {
    validate_optional_text("Caption", req.caption.as_deref(), 512)?;
    validate_metadata(&req.image)
}

pub fn validate_update_gallery_item(req: &UpdateGalleryItemRequest) -> Result<(), AppError> {
    validate_optional_text(
        "Caption",
        req.caption.as_ref().and_then(|c| c.as_deref()),
        512,
    )?;
    if let Some(ref image) = req.image {
        validate_metadata(image)?;
    }
    Ok(())
}

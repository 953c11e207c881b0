use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::{AssetMetadata, AssetResponse, embed, validate_asset_field};
use super::shared::{double_option, validate_optional_text, validate_position, validate_text};
use crate::entity::{asset, category};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateCategoryRequest {
    /// Unique category name.
    #[schema(example = "Detailing")]
    pub name: String,
    pub description: Option<String>,
    /// 1-based position; omitted appends.
    pub position: Option<i32>,
    pub card_image: Option<AssetMetadata>,
    pub details_image: Option<AssetMetadata>,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<AssetMetadata>)]
    pub card_image: Option<Option<AssetMetadata>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<AssetMetadata>)]
    pub details_image: Option<Option<AssetMetadata>>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CategoryResponse {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub position: i32,
    pub card_image: Option<AssetResponse>,
    pub details_image: Option<AssetResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CategoryResponse {
    pub fn build(m: category::Model, assets: &HashMap<i32, asset::Model>) -> Self {
        Self {
            card_image: embed(assets, m.card_image_id),
            details_image: embed(assets, m.details_image_id),
            id: m.id,
            name: m.name,
            description: m.description,
            position: m.position,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

pub fn validate_create_category(req: &CreateCategoryRequest) -> Result<(), AppError> {
    validate_text("Name", &req.name, 128)?;
    validate_optional_text("Description", req.description.as_deref(), 10_000)?;
    validate_position(req.position)?;
    validate_asset_field(req.card_image.as_ref().map(Some))?;
    validate_asset_field(req.details_image.as_ref().map(Some))
}

pub fn validate_update_category(req: &UpdateCategoryRequest) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        validate_text("Name", name, 128)?;
    }
    validate_optional_text(
        "Description",
        req.description.as_ref().and_then(|d| d.as_deref()),
        10_000,
    )?;
    validate_asset_field(req.card_image.as_ref().map(|i| i.as_ref()))?;
    validate_asset_field(req.details_image.as_ref().map(|i| i.as_ref()))
}

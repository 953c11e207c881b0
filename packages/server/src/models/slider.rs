use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::{AssetMetadata, AssetResponse, embed, validate_asset_field};
use super::shared::{double_option, validate_optional_text, validate_position, validate_text};
use crate::entity::{asset, slider};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateSliderRequest {
    #[schema(example = "Spring collection")]
    pub title: String,
    pub subtitle: Option<String>,
    #[schema(example = "/services/3")]
    pub link_url: Option<String>,
    /// 1-based position; omitted appends, values past the end are clamped.
    #[schema(example = 1)]
    pub position: Option<i32>,
    pub image: Option<AssetMetadata>,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateSliderRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub subtitle: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub link_url: Option<Option<String>>,
    /// Absent keeps the image, `null` removes it, metadata replaces it.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<AssetMetadata>)]
    pub image: Option<Option<AssetMetadata>>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SliderResponse {
    pub id: i32,
    pub title: String,
    pub subtitle: Option<String>,
    pub link_url: Option<String>,
    #[schema(example = 1)]
    pub position: i32,
    pub image: Option<AssetResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SliderResponse {
    pub fn build(m: slider::Model, assets: &HashMap<i32, asset::Model>) -> Self {
        Self {
            image: embed(assets, m.image_id),
            id: m.id,
            title: m.title,
            subtitle: m.subtitle,
            link_url: m.link_url,
            position: m.position,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

pub fn validate_create_slider(req: &CreateSliderRequest) -> Result<(), AppError> {
    validate_text("Title", &req.title, 256)?;
    validate_optional_text("Subtitle", req.subtitle.as_deref(), 512)?;
    validate_optional_text("Link URL", req.link_url.as_deref(), 2048)?;
    validate_position(req.position)?;
    validate_asset_field(req.image.as_ref().map(Some))
}

pub fn validate_update_slider(req: &UpdateSliderRequest) -> Result<(), AppError> {
    if let Some(ref title) = req.title {
        validate_text("Title", title, 256)?;
    }
    validate_optional_text("Subtitle", req.subtitle.as_ref().and_then(|s| s.as_deref()), 512)?;
    validate_optional_text("Link URL", req.link_url.as_ref().and_then(|s| s.as_deref()), 2048)?;
    validate_asset_field(req.image.as_ref().map(|i| i.as_ref()))
}

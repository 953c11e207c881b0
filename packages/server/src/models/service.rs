use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::{AssetMetadata, AssetResponse, embed, validate_asset_field};
use super::shared::{double_option, validate_optional_text, validate_text};
use crate::entity::{asset, service};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateServiceRequest {
    pub category_id: i32,
    #[schema(example = "Full detail")]
    pub name: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image: Option<AssetMetadata>,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateServiceRequest {
    /// Move the service to another category.
    pub category_id: Option<i32>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub summary: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<AssetMetadata>)]
    pub image: Option<Option<AssetMetadata>>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ServiceListQuery {
    /// Only services of this category.
    pub category_id: Option<i32>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ServiceResponse {
    pub id: i32,
    pub category_id: i32,
    pub name: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image: Option<AssetResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceResponse {
    pub fn build(m: service::Model, assets: &HashMap<i32, asset::Model>) -> Self {
        Self {
            image: embed(assets, m.image_id),
            id: m.id,
            category_id: m.category_id,
            name: m.name,
            summary: m.summary,
            description: m.description,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

pub fn validate_create_service(req: &CreateServiceRequest) -> Result<(), AppError> {
    validate_text("Name", &req.name, 128)?;
    validate_optional_text("Summary", req.summary.as_deref(), 512)?;
    validate_optional_text("Description", req.description.as_deref(), 10_000)?;
    validate_asset_field(req.image.as_ref().map(Some))
}

pub fn validate_update_service(req: &UpdateServiceRequest) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        validate_text("Name", name, 128)?;
    }
    validate_optional_text("Summary", req.summary.as_ref().and_then(|s| s.as_deref()), 512)?;
    validate_optional_text(
        "Description",
        req.description.as_ref().and_then(|d| d.as_deref()),
        10_000,
    )?;
    validate_asset_field(req.image.as_ref().map(|i| i.as_ref()))
}

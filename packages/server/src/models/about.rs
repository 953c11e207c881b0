use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::{AssetMetadata, AssetResponse, embed, validate_asset_field};
use super::shared::{double_option, validate_optional_text, validate_text};
use crate::entity::{about_block, about_page, asset, company_story};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateAboutBlockRequest {
    #[schema(example = "Our team")]
    pub title: String,
    /// Markdown body.
    pub body: String,
    pub image: Option<AssetMetadata>,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateAboutBlockRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<AssetMetadata>)]
    pub image: Option<Option<AssetMetadata>>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AboutBlockResponse {
    pub id: i32,
    pub title: String,
    pub body: String,
    pub image: Option<AssetResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AboutBlockResponse {
    pub fn build(m: about_block::Model, assets: &HashMap<i32, asset::Model>) -> Self {
        Self {
            image: embed(assets, m.image_id),
            id: m.id,
            title: m.title,
            body: m.body,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

pub fn validate_create_about_block(req: &CreateAboutBlockRequest) -> Result<(), AppError> {
    validate_text("Title", &req.title, 256)?;
    validate_text("Body", &req.body, 100_000)?;
    validate_asset_field(req.image.as_ref().map(Some))
}

pub fn validate_update_about_block(req: &UpdateAboutBlockRequest) -> Result<(), AppError> {
    if let Some(ref title) = req.title {
        validate_text("Title", title, 256)?;
    }
    if let Some(ref body) = req.body {
        validate_text("Body", body, 100_000)?;
    }
    validate_asset_field(req.image.as_ref().map(|i| i.as_ref()))
}

/// Partial update of the about page header.
#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateAboutPageRequest {
    pub heading: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub subheading: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<AssetMetadata>)]
    pub banner: Option<Option<AssetMetadata>>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AboutPageResponse {
    pub heading: String,
    pub subheading: Option<String>,
    pub banner: Option<AssetResponse>,
    pub updated_at: DateTime<Utc>,
}

impl AboutPageResponse {
    pub fn build(m: about_page::Model, assets: &HashMap<i32, asset::Model>) -> Self {
        Self {
            banner: embed(assets, m.banner_id),
            heading: m.heading,
            subheading: m.subheading,
            updated_at: m.updated_at,
        }
    }
}

pub fn validate_update_about_page(req: &UpdateAboutPageRequest) -> Result<(), AppError> {
    if let Some(ref heading) = req.heading {
        validate_text("Heading", heading, 256)?;
    }
    validate_optional_text(
        "Subheading",
        req.subheading.as_ref().and_then(|s| s.as_deref()),
        512,
    )?;
    validate_asset_field(req.banner.as_ref().map(|i| i.as_ref()))
}

/// Partial update of the company story section.
#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateCompanyStoryRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<AssetMetadata>)]
    pub image: Option<Option<AssetMetadata>>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CompanyStoryResponse {
    pub title: String,
    pub body: String,
    pub image: Option<AssetResponse>,
    pub updated_at: DateTime<Utc>,
}

impl CompanyStoryResponse {
    pub fn build(m: company_story::Model, assets: &HashMap<i32, asset::Model>) -> Self {
        Self {
            image: embed(assets, m.image_id),
            title: m.title,
            body: m.body,
            updated_at: m.updated_at,
        }
    }
}

pub fn validate_update_company_story(req: &UpdateCompanyStoryRequest) -> Result<(), AppError> {
    if let Some(ref title) = req.title {
        validate_text("Title", title, 256)?;
    }
    if let Some(ref body) = req.body {
        validate_text("Body", body, 100_000)?;
    }
    validate_asset_field(req.image.as_ref().map(|i| i.as_ref()))
}

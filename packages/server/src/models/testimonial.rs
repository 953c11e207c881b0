use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::{AssetMetadata, AssetResponse, embed, validate_asset_field};
use super::shared::{double_option, validate_optional_text, validate_text};
use crate::entity::{asset, testimonial};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateTestimonialRequest {
    #[schema(example = "Dana K.")]
    pub author: String,
    #[schema(example = "Fleet manager")]
    pub role: Option<String>,
    pub quote: String,
    /// 1-5 stars.
    #[schema(example = 5)]
    pub rating: i32,
    pub image: Option<AssetMetadata>,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateTestimonialRequest {
    pub author: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub role: Option<Option<String>>,
    pub quote: Option<String>,
    pub rating: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<AssetMetadata>)]
    pub image: Option<Option<AssetMetadata>>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TestimonialResponse {
    pub id: i32,
    pub author: String,
    pub role: Option<String>,
    pub quote: String,
    pub rating: i32,
    pub image: Option<AssetResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TestimonialResponse {
    pub fn build(m: testimonial::Model, assets: &HashMap<i32, asset::Model>) -> Self {
        Self {
            image: embed(assets, m.image_id),
            id: m.id,
            author: m.author,
            role: m.role,
            quote: m.quote,
            rating: m.rating,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

fn validate_rating(rating: i32) -> Result<(), AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation("Rating must be 1-5".into()));
    }
    Ok(())
}

pub fn validate_create_testimonial(req: &CreateTestimonialRequest) -> Result<(), AppError> {
    validate_text("Author", &req.author, 128)?;
    validate_optional_text("Role", req.role.as_deref(), 128)?;
    validate_text("Quote", &req.quote, 2000)?;
    validate_rating(req.rating)?;
    validate_asset_field(req.image.as_ref().map(Some))
}

pub fn validate_update_testimonial(req: &UpdateTestimonialRequest) -> Result<(), AppError> {
    if let Some(ref author) = req.author {
        validate_text("Author", author, 128)?;
    }
    validate_optional_text("Role", req.role.as_ref().and_then(|r| r.as_deref()), 128)?;
    if let Some(ref quote) = req.quote {
        validate_text("Quote", quote, 2000)?;
    }
    if let Some(rating) = req.rating {
        validate_rating(rating)?;
    }
    validate_asset_field(req.image.as_ref().map(|i| i.as_ref()))
}

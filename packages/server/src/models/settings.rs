use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::{AssetMetadata, AssetResponse, embed, validate_asset_field};
use super::shared::{double_option, validate_optional_text, validate_text};
use crate::entity::{asset, settings};
use crate::error::AppError;

/// Partial update of the site settings. Every asset field follows PATCH
/// semantics: absent keeps, `null` removes, metadata replaces.
#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateSettingsRequest {
    #[schema(example = "Northside Auto Care")]
    pub site_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub contact_email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub contact_phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<AssetMetadata>)]
    pub logo: Option<Option<AssetMetadata>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<AssetMetadata>)]
    pub favicon: Option<Option<AssetMetadata>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<AssetMetadata>)]
    pub meta_image: Option<Option<AssetMetadata>>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SettingsResponse {
    pub site_name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub logo: Option<AssetResponse>,
    pub favicon: Option<AssetResponse>,
    pub meta_image: Option<AssetResponse>,
    pub updated_at: DateTime<Utc>,
}

impl SettingsResponse {
    pub fn build(m: settings::Model, assets: &HashMap<i32, asset::Model>) -> Self {
        Self {
            logo: embed(assets, m.logo_id),
            favicon: embed(assets, m.favicon_id),
            meta_image: embed(assets, m.meta_image_id),
            site_name: m.site_name,
            contact_email: m.contact_email,
            contact_phone: m.contact_phone,
            address: m.address,
            updated_at: m.updated_at,
        }
    }
}

pub fn validate_update_settings(req: &UpdateSettingsRequest) -> Result<(), AppError> {
    if let Some(ref name) = req.site_name {
        validate_text("Site name", name, 128)?;
    }
    if let Some(Some(ref email)) = req.contact_email
        && !email.contains('@')
    {
        return Err(AppError::Validation(
            "Contact email must be an email address".into(),
        ));
    }
    validate_optional_text(
        "Contact email",
        req.contact_email.as_ref().and_then(|e| e.as_deref()),
        256,
    )?;
    validate_optional_text(
        "Contact phone",
        req.contact_phone.as_ref().and_then(|p| p.as_deref()),
        64,
    )?;
    validate_optional_text(
        "Address",
        req.address.as_ref().and_then(|a| a.as_deref()),
        512,
    )?;
    validate_asset_field(req.logo.as_ref().map(|i| i.as_ref()))?;
    validate_asset_field(req.favicon.as_ref().map(|i| i.as_ref()))?;
    validate_asset_field(req.meta_image.as_ref().map(|i| i.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_fields_follow_patch_semantics() {
        let req: UpdateSettingsRequest = serde_json::from_str(
            r#"{"logo": null, "favicon": {"remote_id": "brand/f.png", "url": "/f.png",
                "width": 32, "height": 32, "format": "png", "byte_size": 512}}"#,
        )
        .unwrap();

        assert_eq!(req.logo, Some(None));
        assert!(matches!(req.favicon, Some(Some(_))));
        assert_eq!(req.meta_image, None);
        assert!(validate_update_settings(&req).is_ok());
    }

    #[test]
    fn malformed_email_is_rejected() {
        let req = UpdateSettingsRequest {
            contact_email: Some(Some("not-an-address".into())),
            ..Default::default()
        };
        assert!(validate_update_settings(&req).is_err());
    }
}

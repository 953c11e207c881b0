use axum::Json;
use axum::extract::State;
use chrono::Utc;
use sea_orm::{ConnectionTrait, EntityTrait, IntoActiveModel, Set};
use tracing::instrument;

use crate::assets::coordinator;
use crate::assets::records;
use crate::assets::{AssetAction, AssetChanges};
use crate::entity::settings;
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::settings::*;
use crate::state::AppState;

async fn settings_row<C: ConnectionTrait>(db: &C) -> Result<settings::Model, AppError> {
    settings::Entity::find_by_id(settings::SINGLETON_ID)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Settings have not been initialised".into()))
}

fn image_ids(m: &settings::Model) -> impl Iterator<Item = i32> {
    [m.logo_id, m.favicon_id, m.meta_image_id].into_iter().flatten()
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Settings",
    operation_id = "getSettings",
    summary = "Get site settings",
    responses(
        (status = 200, description = "Site settings", body = SettingsResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>, AppError> {
    let row = settings_row(&state.db).await?;
    let assets = records::load_map(&state.db, image_ids(&row)).await?;
    Ok(Json(SettingsResponse::build(row, &assets)))
}

#[utoipa::path(
    put,
    path = "/",
    tag = "Settings",
    operation_id = "updateSettings",
    summary = "Update site settings",
    description = "Fields left out are kept, `null` clears a field. Each image that is replaced \
        or cleared has its previous remote object deleted first. If one of those deletes fails \
        the update is aborted; images already deleted by then are detached.",
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Settings updated", body = SettingsResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 502, description = "A previous image could not be deleted (REMOTE_ASSET_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn update_settings(
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, AppError> {
    validate_update_settings(&payload)?;

    let current = settings_row(&state.db).await?;
    let logo = records::find_optional(&state.db, current.logo_id).await?;
    let favicon = records::find_optional(&state.db, current.favicon_id).await?;
    let meta_image = records::find_optional(&state.db, current.meta_image_id).await?;
    let changes = AssetChanges::<settings::Entity>::new()
        .field(settings::Column::LogoId, AssetAction::plan(logo, payload.logo))
        .field(
            settings::Column::FaviconId,
            AssetAction::plan(favicon, payload.favicon),
        )
        .field(
            settings::Column::MetaImageId,
            AssetAction::plan(meta_image, payload.meta_image),
        );
    coordinator::release_strict(&state, settings::Column::Id, settings::SINGLETON_ID, &changes)
        .await?;

    let mut active = current.into_active_model();
    if let Some(site_name) = payload.site_name {
        active.site_name = Set(site_name.trim().to_string());
    }
    if let Some(contact_email) = payload.contact_email {
        active.contact_email = Set(contact_email);
    }
    if let Some(contact_phone) = payload.contact_phone {
        active.contact_phone = Set(contact_phone);
    }
    if let Some(address) = payload.address {
        active.address = Set(address);
    }
    active.updated_at = Set(Utc::now());

    let model = coordinator::update_owner(
        &state,
        settings::Column::Id,
        settings::SINGLETON_ID,
        &changes,
        active,
    )
    .await?;
    let assets = records::load_map(&state.db, image_ids(&model)).await?;
    Ok(Json(SettingsResponse::build(model, &assets)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use super::*;
    use crate::entity::asset;
    use crate::test_support::{FakeStore, asset_row, meta, state_with};

    fn site(logo_id: Option<i32>, favicon_id: Option<i32>) -> settings::Model {
        settings::Model {
            id: settings::SINGLETON_ID,
            site_name: "Shine Works".into(),
            contact_email: None,
            contact_phone: None,
            address: None,
            logo_id,
            favicon_id,
            meta_image_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn failed_favicon_delete_detaches_the_already_deleted_logo() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![site(Some(1), Some(2))]])
            .append_query_results([vec![asset_row(1, "brand/logo.png")]])
            .append_query_results([vec![asset_row(2, "brand/favicon.png")]])
            .append_query_results([Vec::<asset::Model>::new()])
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();
        let store = Arc::new(FakeStore::failing_on(&["brand/favicon.png"]));
        let state = state_with(db, store.clone());

        let payload = UpdateSettingsRequest {
            site_name: Some("Shine Works Ltd".into()),
            logo: Some(None),
            favicon: Some(Some(meta("brand/favicon-2.png"))),
            ..Default::default()
        };
        let err = update_settings(State(state.clone()), AppJson(payload))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RemoteAsset(_)));
        assert_eq!(
            store.attempts(),
            vec!["brand/logo.png", "brand/favicon.png"]
        );

        let log = format!("{:?}", state.db.into_transaction_log());
        assert_eq!(log.matches("UPDATE").count(), 1);
        assert_eq!(log.matches("DELETE").count(), 1);
        assert!(!log.contains("Shine Works Ltd"));
        assert!(!log.contains("INSERT"));
    }
}

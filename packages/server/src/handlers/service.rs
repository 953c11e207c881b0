use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use tracing::{info, instrument};

use super::addons;
use crate::assets::coordinator;
use crate::assets::records;
use crate::assets::{AssetAction, AssetChanges};
use crate::database::{TxnProfile, begin, bounded, with_retry};
use crate::entity::parent::Parent;
use crate::entity::{service, service_addon};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::addon::{AddonResponse, CreateAddonRequest, ReplaceAddonsRequest};
use crate::models::asset::DeleteResponse;
use crate::models::ordering::{Created, MoveRequest, SwapRequest};
use crate::models::service::*;
use crate::state::AppState;

async fn find_service<C: ConnectionTrait>(db: &C, id: i32) -> Result<service::Model, AppError> {
    service::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Service {id} not found")))
}

async fn render_one<C: ConnectionTrait>(
    conn: &C,
    row: service::Model,
) -> Result<ServiceResponse, AppError> {
    let assets = records::load_map(conn, row.image_id).await?;
    Ok(ServiceResponse::build(row, &assets))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Services",
    operation_id = "listServices",
    summary = "List services",
    params(ServiceListQuery),
    responses(
        (status = 200, description = "Services ordered by id", body = Vec<ServiceResponse>),
    ),
)]
#[instrument(skip(state))]
pub async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<ServiceListQuery>,
) -> Result<Json<Vec<ServiceResponse>>, AppError> {
    let mut select = service::Entity::find();
    if let Some(category_id) = query.category_id {
        select = select.filter(service::Column::CategoryId.eq(category_id));
    }
    let rows = select
        .order_by_asc(service::Column::Id)
        .all(&state.db)
        .await?;

    let assets = records::load_map(&state.db, rows.iter().filter_map(|r| r.image_id)).await?;
    Ok(Json(
        rows.into_iter()
            .map(|r| ServiceResponse::build(r, &assets))
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Services",
    operation_id = "getService",
    summary = "Get a service",
    params(("id" = i32, Path, description = "Service ID")),
    responses(
        (status = 200, description = "Service", body = ServiceResponse),
        (status = 404, description = "Service not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ServiceResponse>, AppError> {
    let row = find_service(&state.db, id).await?;
    Ok(Json(render_one(&state.db, row).await?))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Services",
    operation_id = "createService",
    summary = "Create a service",
    request_body = CreateServiceRequest,
    responses(
        (status = 201, description = "Service created", body = ServiceResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Image already attached (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(name = %payload.name, category_id = payload.category_id))]
pub async fn create_service(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateServiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_service(&payload)?;

    let now = Utc::now();
    let owner = service::ActiveModel {
        category_id: Set(payload.category_id),
        name: Set(payload.name.trim().to_string()),
        summary: Set(payload.summary),
        description: Set(payload.description),
        image_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let changes = AssetChanges::<service::Entity>::new()
        .field(service::Column::ImageId, AssetAction::attach(payload.image))
        .under(Some(Parent::Category(payload.category_id)));

    let model = coordinator::insert_owner(&state, &changes, owner).await?;
    Ok((
        StatusCode::CREATED,
        Json(render_one(&state.db, model).await?),
    ))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Services",
    operation_id = "updateService",
    summary = "Update a service",
    description = "Partial update. Replacing or clearing the image deletes the previous remote \
        object first; if that fails nothing is changed.",
    params(("id" = i32, Path, description = "Service ID")),
    request_body = UpdateServiceRequest,
    responses(
        (status = 200, description = "Service updated", body = ServiceResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Service or category not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Previous image could not be deleted (REMOTE_ASSET_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn update_service(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateServiceRequest>,
) -> Result<Json<ServiceResponse>, AppError> {
    validate_update_service(&payload)?;

    let current = find_service(&state.db, id).await?;
    let image = records::find_optional(&state.db, current.image_id).await?;
    let changes = AssetChanges::<service::Entity>::new()
        .field(
            service::Column::ImageId,
            AssetAction::plan(image, payload.image),
        )
        .under(payload.category_id.map(Parent::Category));
    coordinator::release_strict(&state, service::Column::Id, id, &changes).await?;

    let mut active = current.into_active_model();
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(category_id);
    }
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(summary) = payload.summary {
        active.summary = Set(summary);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    active.updated_at = Set(Utc::now());

    let model =
        coordinator::update_owner(&state, service::Column::Id, id, &changes, active).await?;
    Ok(Json(render_one(&state.db, model).await?))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Services",
    operation_id = "deleteService",
    summary = "Delete a service",
    description = "Deletes the service with its add-ons and image. A failed remote image delete \
        is reported in `remote_failures` and does not block the delete.",
    params(("id" = i32, Path, description = "Service ID")),
    responses(
        (status = 200, description = "Service deleted", body = DeleteResponse),
        (status = 404, description = "Service not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn delete_service(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<DeleteResponse>, AppError> {
    let row = find_service(&state.db, id).await?;
    let assets = records::find_many(&state.db, row.image_id).await?;
    let mut remote_failures = coordinator::release_lenient(&*state.assets, &assets).await;

    let state = &state;
    let assets = &assets;
    let settings = &state.config.transactions;
    let profile = TxnProfile::AssetReplace;

    let result = with_retry(profile, settings, move || async move {
        let txn = begin(&state.db, profile).await?;
        bounded(profile, settings, async move {
            let late = coordinator::late_assets::<service::Entity, _>(
                &txn,
                service::Column::Id,
                &[id],
                assets,
            )
            .await?;
            let addons = service_addon::Entity::delete_many()
                .filter(service_addon::Column::ServiceId.eq(id))
                .exec(&txn)
                .await?;
            service::Entity::delete_by_id(id).exec(&txn).await?;
            records::delete_ids(&txn, assets.iter().chain(&late).map(|a| a.id)).await?;
            txn.commit().await?;
            info!(
                service_id = id,
                addons = addons.rows_affected,
                "Deleted service"
            );
            Ok(late)
        })
        .await
    })
    .await;

    let late =
        coordinator::settle_destroy::<service::Entity, _>(state, assets, &remote_failures, result)
            .await?;
    remote_failures.extend(coordinator::release_lenient(&*state.assets, &late).await);

    Ok(Json(DeleteResponse {
        id,
        remote_failures,
    }))
}

#[utoipa::path(
    get,
    path = "/{id}/addons",
    tag = "Service Add-ons",
    operation_id = "listServiceAddons",
    summary = "List a service's add-ons",
    params(("id" = i32, Path, description = "Service ID")),
    responses(
        (status = 200, description = "Add-ons ordered by position", body = Vec<AddonResponse>),
        (status = 404, description = "Service not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn list_service_addons(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<AddonResponse>>, AppError> {
    find_service(&state.db, id).await?;
    Ok(Json(addons::list::<service_addon::Entity>(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/{id}/addons",
    tag = "Service Add-ons",
    operation_id = "createServiceAddon",
    summary = "Add an add-on to a service",
    params(("id" = i32, Path, description = "Service ID")),
    request_body = CreateAddonRequest,
    responses(
        (status = 201, description = "Add-on created", body = Created<AddonResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Service not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(name = %payload.name))]
pub async fn create_service_addon(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<CreateAddonRequest>,
) -> Result<impl IntoResponse, AppError> {
    find_service(&state.db, id).await?;
    let created = addons::insert::<service_addon::Entity>(&state, id, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/{id}/addons",
    tag = "Service Add-ons",
    operation_id = "replaceServiceAddons",
    summary = "Replace a service's add-ons",
    description = "`names` is the complete desired list. Repeated names are dropped, keeping \
        the first occurrence (case-sensitive). Positions are renumbered from 1.",
    params(("id" = i32, Path, description = "Service ID")),
    request_body = ReplaceAddonsRequest,
    responses(
        (status = 200, description = "The new add-on list", body = Vec<AddonResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Service not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(count = payload.names.len()))]
pub async fn replace_service_addons(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<ReplaceAddonsRequest>,
) -> Result<Json<Vec<AddonResponse>>, AppError> {
    find_service(&state.db, id).await?;
    Ok(Json(
        addons::replace::<service_addon::Entity>(&state, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/{id}/addons/{addon_id}",
    tag = "Service Add-ons",
    operation_id = "deleteServiceAddon",
    summary = "Remove an add-on from a service",
    params(
        ("id" = i32, Path, description = "Service ID"),
        ("addon_id" = i32, Path, description = "Add-on ID"),
    ),
    responses(
        (status = 200, description = "Remaining add-ons", body = Vec<AddonResponse>),
        (status = 404, description = "Service or add-on not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn delete_service_addon(
    State(state): State<AppState>,
    Path((id, addon_id)): Path<(i32, i32)>,
) -> Result<Json<Vec<AddonResponse>>, AppError> {
    Ok(Json(
        addons::remove::<service_addon::Entity>(&state, id, addon_id).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/{id}/addons/{addon_id}/position",
    tag = "Service Add-ons",
    operation_id = "moveServiceAddon",
    summary = "Move a service add-on",
    params(
        ("id" = i32, Path, description = "Service ID"),
        ("addon_id" = i32, Path, description = "Add-on ID"),
    ),
    request_body = MoveRequest,
    responses(
        (status = 200, description = "Add-ons after the move", body = Vec<AddonResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Service or add-on not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(position = payload.position))]
pub async fn move_service_addon(
    State(state): State<AppState>,
    Path((id, addon_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<MoveRequest>,
) -> Result<Json<Vec<AddonResponse>>, AppError> {
    Ok(Json(
        addons::move_to::<service_addon::Entity>(&state, id, addon_id, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/{id}/addons/swap",
    tag = "Service Add-ons",
    operation_id = "swapServiceAddons",
    summary = "Swap two add-ons of a service",
    params(("id" = i32, Path, description = "Service ID")),
    request_body = SwapRequest,
    responses(
        (status = 200, description = "Add-ons after the swap", body = Vec<AddonResponse>),
        (status = 400, description = "Same id twice (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Add-on not found in this service (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn swap_service_addons(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<SwapRequest>,
) -> Result<Json<Vec<AddonResponse>>, AppError> {
    Ok(Json(
        addons::swap::<service_addon::Entity>(&state, id, payload).await?,
    ))
}

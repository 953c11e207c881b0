use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use sea_orm::{ConnectionTrait, EntityTrait, IntoActiveModel, QueryOrder, Set};
use tracing::instrument;

use crate::assets::coordinator;
use crate::assets::records;
use crate::assets::{AssetAction, AssetChanges};
use crate::entity::{about_block, about_page, company_story};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::about::*;
use crate::models::asset::DeleteResponse;
use crate::state::AppState;

async fn find_block<C: ConnectionTrait>(db: &C, id: i32) -> Result<about_block::Model, AppError> {
    about_block::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("About block {id} not found")))
}

async fn render_block<C: ConnectionTrait>(
    conn: &C,
    row: about_block::Model,
) -> Result<AboutBlockResponse, AppError> {
    let assets = records::load_map(conn, row.image_id).await?;
    Ok(AboutBlockResponse::build(row, &assets))
}

#[utoipa::path(
    get,
    path = "/blocks",
    tag = "About",
    operation_id = "listAboutBlocks",
    summary = "List about page blocks",
    responses(
        (status = 200, description = "Blocks, oldest first", body = Vec<AboutBlockResponse>),
    ),
)]
#[instrument(skip(state))]
pub async fn list_blocks(
    State(state): State<AppState>,
) -> Result<Json<Vec<AboutBlockResponse>>, AppError> {
    let rows = about_block::Entity::find()
        .order_by_asc(about_block::Column::Id)
        .all(&state.db)
        .await?;

    let assets = records::load_map(&state.db, rows.iter().filter_map(|r| r.image_id)).await?;
    Ok(Json(
        rows.into_iter()
            .map(|r| AboutBlockResponse::build(r, &assets))
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/blocks/{id}",
    tag = "About",
    operation_id = "getAboutBlock",
    summary = "Get an about page block",
    params(("id" = i32, Path, description = "Block ID")),
    responses(
        (status = 200, description = "Block", body = AboutBlockResponse),
        (status = 404, description = "Block not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_block(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<AboutBlockResponse>, AppError> {
    let row = find_block(&state.db, id).await?;
    Ok(Json(render_block(&state.db, row).await?))
}

#[utoipa::path(
    post,
    path = "/blocks",
    tag = "About",
    operation_id = "createAboutBlock",
    summary = "Create an about page block",
    request_body = CreateAboutBlockRequest,
    responses(
        (status = 201, description = "Block created", body = AboutBlockResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Image already attached (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(title = %payload.title))]
pub async fn create_block(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateAboutBlockRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_about_block(&payload)?;

    let now = Utc::now();
    let owner = about_block::ActiveModel {
        title: Set(payload.title.trim().to_string()),
        body: Set(payload.body),
        image_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let changes = AssetChanges::<about_block::Entity>::new().field(
        about_block::Column::ImageId,
        AssetAction::attach(payload.image),
    );

    let model = coordinator::insert_owner(&state, &changes, owner).await?;
    Ok((
        StatusCode::CREATED,
        Json(render_block(&state.db, model).await?),
    ))
}

#[utoipa::path(
    patch,
    path = "/blocks/{id}",
    tag = "About",
    operation_id = "updateAboutBlock",
    summary = "Update an about page block",
    params(("id" = i32, Path, description = "Block ID")),
    request_body = UpdateAboutBlockRequest,
    responses(
        (status = 200, description = "Block updated", body = AboutBlockResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Block not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Previous image could not be deleted (REMOTE_ASSET_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn update_block(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateAboutBlockRequest>,
) -> Result<Json<AboutBlockResponse>, AppError> {
    validate_update_about_block(&payload)?;

    let current = find_block(&state.db, id).await?;
    let image = records::find_optional(&state.db, current.image_id).await?;
    let changes = AssetChanges::<about_block::Entity>::new().field(
        about_block::Column::ImageId,
        AssetAction::plan(image, payload.image),
    );
    coordinator::release_strict(&state, about_block::Column::Id, id, &changes).await?;

    let mut active = current.into_active_model();
    if let Some(title) = payload.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(body) = payload.body {
        active.body = Set(body);
    }
    active.updated_at = Set(Utc::now());

    let model =
        coordinator::update_owner(&state, about_block::Column::Id, id, &changes, active).await?;
    Ok(Json(render_block(&state.db, model).await?))
}

#[utoipa::path(
    delete,
    path = "/blocks/{id}",
    tag = "About",
    operation_id = "deleteAboutBlock",
    summary = "Delete an about page block",
    params(("id" = i32, Path, description = "Block ID")),
    responses(
        (status = 200, description = "Block deleted", body = DeleteResponse),
        (status = 404, description = "Block not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn delete_block(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<DeleteResponse>, AppError> {
    let row = find_block(&state.db, id).await?;
    let assets = records::find_many(&state.db, row.image_id).await?;

    let remote_failures = coordinator::destroy_owners::<about_block::Entity>(
        &state,
        about_block::Column::Id,
        &[id],
        &assets,
    )
    .await?;

    Ok(Json(DeleteResponse {
        id,
        remote_failures,
    }))
}

async fn about_page_row<C: ConnectionTrait>(db: &C) -> Result<about_page::Model, AppError> {
    about_page::Entity::find_by_id(about_page::SINGLETON_ID)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("About page has not been initialised".into()))
}

#[utoipa::path(
    get,
    path = "/page",
    tag = "About",
    operation_id = "getAboutPage",
    summary = "Get the about page header",
    responses(
        (status = 200, description = "About page", body = AboutPageResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn get_page(State(state): State<AppState>) -> Result<Json<AboutPageResponse>, AppError> {
    let row = about_page_row(&state.db).await?;
    let assets = records::load_map(&state.db, row.banner_id).await?;
    Ok(Json(AboutPageResponse::build(row, &assets)))
}

#[utoipa::path(
    put,
    path = "/page",
    tag = "About",
    operation_id = "updateAboutPage",
    summary = "Update the about page header",
    description = "Fields left out are kept. `banner: null` removes the banner; the previous \
        remote object is deleted first and a failure aborts the update.",
    request_body = UpdateAboutPageRequest,
    responses(
        (status = 200, description = "About page updated", body = AboutPageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 502, description = "Previous banner could not be deleted (REMOTE_ASSET_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn update_page(
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateAboutPageRequest>,
) -> Result<Json<AboutPageResponse>, AppError> {
    validate_update_about_page(&payload)?;

    let current = about_page_row(&state.db).await?;
    let banner = records::find_optional(&state.db, current.banner_id).await?;
    let changes = AssetChanges::<about_page::Entity>::new().field(
        about_page::Column::BannerId,
        AssetAction::plan(banner, payload.banner),
    );
    coordinator::release_strict(&state, about_page::Column::Id, about_page::SINGLETON_ID, &changes)
        .await?;

    let mut active = current.into_active_model();
    if let Some(heading) = payload.heading {
        active.heading = Set(heading.trim().to_string());
    }
    if let Some(subheading) = payload.subheading {
        active.subheading = Set(subheading);
    }
    active.updated_at = Set(Utc::now());

    let model = coordinator::update_owner(
        &state,
        about_page::Column::Id,
        about_page::SINGLETON_ID,
        &changes,
        active,
    )
    .await?;
    let assets = records::load_map(&state.db, model.banner_id).await?;
    Ok(Json(AboutPageResponse::build(model, &assets)))
}

async fn story_row<C: ConnectionTrait>(db: &C) -> Result<company_story::Model, AppError> {
    company_story::Entity::find_by_id(company_story::SINGLETON_ID)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Company story has not been initialised".into()))
}

#[utoipa::path(
    get,
    path = "/story",
    tag = "About",
    operation_id = "getCompanyStory",
    summary = "Get the company story",
    responses(
        (status = 200, description = "Company story", body = CompanyStoryResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn get_story(
    State(state): State<AppState>,
) -> Result<Json<CompanyStoryResponse>, AppError> {
    let row = story_row(&state.db).await?;
    let assets = records::load_map(&state.db, row.image_id).await?;
    Ok(Json(CompanyStoryResponse::build(row, &assets)))
}

#[utoipa::path(
    put,
    path = "/story",
    tag = "About",
    operation_id = "updateCompanyStory",
    summary = "Update the company story",
    request_body = UpdateCompanyStoryRequest,
    responses(
        (status = 200, description = "Company story updated", body = CompanyStoryResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 502, description = "Previous image could not be deleted (REMOTE_ASSET_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn update_story(
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateCompanyStoryRequest>,
) -> Result<Json<CompanyStoryResponse>, AppError> {
    validate_update_company_story(&payload)?;

    let current = story_row(&state.db).await?;
    let image = records::find_optional(&state.db, current.image_id).await?;
    let changes = AssetChanges::<company_story::Entity>::new().field(
        company_story::Column::ImageId,
        AssetAction::plan(image, payload.image),
    );
    coordinator::release_strict(
        &state,
        company_story::Column::Id,
        company_story::SINGLETON_ID,
        &changes,
    )
    .await?;

    let mut active = current.into_active_model();
    if let Some(title) = payload.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(body) = payload.body {
        active.body = Set(body);
    }
    active.updated_at = Set(Utc::now());

    let model = coordinator::update_owner(
        &state,
        company_story::Column::Id,
        company_story::SINGLETON_ID,
        &changes,
        active,
    )
    .await?;
    let assets = records::load_map(&state.db, model.image_id).await?;
    Ok(Json(CompanyStoryResponse::build(model, &assets)))
}

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use tracing::instrument;

use super::ensure_all_found;
use crate::assets::coordinator;
use crate::assets::records;
use crate::assets::{AssetAction, AssetChanges};
use crate::entity::gallery_item;
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::asset::DeleteResponse;
use crate::models::gallery::*;
use crate::models::ordering::{BulkDeleteRequest, validate_bulk_delete};
use crate::state::AppState;

async fn find_item<C: ConnectionTrait>(db: &C, id: i32) -> Result<gallery_item::Model, AppError> {
    gallery_item::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Gallery item {id} not found")))
}

async fn render_one<C: ConnectionTrait>(
    conn: &C,
    row: gallery_item::Model,
) -> Result<GalleryItemResponse, AppError> {
    let assets = records::load_map(conn, row.image_id).await?;
    Ok(GalleryItemResponse::build(row, &assets))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Gallery",
    operation_id = "listGalleryItems",
    summary = "List gallery items",
    responses(
        (status = 200, description = "Gallery items, oldest first", body = Vec<GalleryItemResponse>),
    ),
)]
#[instrument(skip(state))]
pub async fn list_gallery_items(
    State(state): State<AppState>,
) -> Result<Json<Vec<GalleryItemResponse>>, AppError> {
    let rows = gallery_item::Entity::find()
        .order_by_asc(gallery_item::Column::Id)
        .all(&state.db)
        .await?;

    let assets = records::load_map(&state.db, rows.iter().filter_map(|r| r.image_id)).await?;
    Ok(Json(
        rows.into_iter()
            .map(|r| GalleryItemResponse::build(r, &assets))
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Gallery",
    operation_id = "getGalleryItem",
    summary = "Get a gallery item",
    params(("id" = i32, Path, description = "Gallery item ID")),
    responses(
        (status = 200, description = "Gallery item", body = GalleryItemResponse),
        (status = 404, description = "Gallery item not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_gallery_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<GalleryItemResponse>, AppError> {
    let row = find_item(&state.db, id).await?;
    Ok(Json(render_one(&state.db, row).await?))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Gallery",
    operation_id = "createGalleryItem",
    summary = "Add an image to the gallery",
    request_body = CreateGalleryItemRequest,
    responses(
        (status = 201, description = "Gallery item created", body = GalleryItemResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Image already attached (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(remote_id = %payload.image.remote_id))]
pub async fn create_gallery_item(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateGalleryItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_gallery_item(&payload)?;

    let now = Utc::now();
    let owner = gallery_item::ActiveModel {
        caption: Set(payload.caption),
        image_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let changes = AssetChanges::<gallery_item::Entity>::new().field(
        gallery_item::Column::ImageId,
        AssetAction::Attach(payload.image),
    );

    let model = coordinator::insert_owner(&state, &changes, owner).await?;
    Ok((
        StatusCode::CREATED,
        Json(render_one(&state.db, model).await?),
    ))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Gallery",
    operation_id = "updateGalleryItem",
    summary = "Update a gallery item",
    description = "Replacing the image deletes the previous remote object first; if that fails \
        nothing is changed.",
    params(("id" = i32, Path, description = "Gallery item ID")),
    request_body = UpdateGalleryItemRequest,
    responses(
        (status = 200, description = "Gallery item updated", body = GalleryItemResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Gallery item not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Previous image could not be deleted (REMOTE_ASSET_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn update_gallery_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateGalleryItemRequest>,
) -> Result<Json<GalleryItemResponse>, AppError> {
    validate_update_gallery_item(&payload)?;

    let current = find_item(&state.db, id).await?;
    let image = records::find_optional(&state.db, current.image_id).await?;
    let changes = AssetChanges::<gallery_item::Entity>::new().field(
        gallery_item::Column::ImageId,
        AssetAction::plan(image, payload.image.map(Some)),
    );
    coordinator::release_strict(&state, gallery_item::Column::Id, id, &changes).await?;

    let mut active = current.into_active_model();
    if let Some(caption) = payload.caption {
        active.caption = Set(caption);
    }
    active.updated_at = Set(Utc::now());

    let model =
        coordinator::update_owner(&state, gallery_item::Column::Id, id, &changes, active).await?;
    Ok(Json(render_one(&state.db, model).await?))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Gallery",
    operation_id = "deleteGalleryItem",
    summary = "Delete a gallery item",
    params(("id" = i32, Path, description = "Gallery item ID")),
    responses(
        (status = 200, description = "Gallery item deleted", body = DeleteResponse),
        (status = 404, description = "Gallery item not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn delete_gallery_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<DeleteResponse>, AppError> {
    let row = find_item(&state.db, id).await?;
    let assets = records::find_many(&state.db, row.image_id).await?;

    let remote_failures = coordinator::destroy_owners::<gallery_item::Entity>(
        &state,
        gallery_item::Column::Id,
        &[id],
        &assets,
    )
    .await?;

    Ok(Json(DeleteResponse {
        id,
        remote_failures,
    }))
}

#[utoipa::path(
    post,
    path = "/bulk-delete",
    tag = "Gallery",
    operation_id = "bulkDeleteGalleryItems",
    summary = "Delete several gallery items",
    description = "Every id must exist, otherwise nothing is deleted. Each image is deleted \
        remotely on a best-effort basis; failures are listed in `remote_failures`.",
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "Gallery items deleted", body = GalleryBulkDeleteResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Some ids do not exist (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(count = payload.ids.len()))]
pub async fn bulk_delete_gallery_items(
    State(state): State<AppState>,
    AppJson(payload): AppJson<BulkDeleteRequest>,
) -> Result<Json<GalleryBulkDeleteResponse>, AppError> {
    validate_bulk_delete(&payload)?;

    let rows = gallery_item::Entity::find()
        .filter(gallery_item::Column::Id.is_in(payload.ids.iter().copied()))
        .all(&state.db)
        .await?;
    ensure_all_found("Gallery item", &payload.ids, rows.iter().map(|r| r.id))?;
    let assets = records::find_many(&state.db, rows.iter().filter_map(|r| r.image_id)).await?;

    let remote_failures = coordinator::destroy_owners::<gallery_item::Entity>(
        &state,
        gallery_item::Column::Id,
        &payload.ids,
        &assets,
    )
    .await?;

    Ok(Json(GalleryBulkDeleteResponse {
        removed: payload.ids,
        remote_failures,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};

    use super::*;
    use crate::test_support::{FakeStore, asset_row, state_with};

    fn item(id: i32, image_id: i32) -> gallery_item::Model {
        gallery_item::Model {
            id,
            caption: None,
            image_id: Some(image_id),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn bulk_delete_attempts_every_image_and_removes_all_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![item(1, 11), item(2, 12), item(3, 13)]])
            .append_query_results([vec![
                asset_row(11, "gallery/a.png"),
                asset_row(12, "gallery/b.png"),
                asset_row(13, "gallery/c.png"),
            ]])
            // the items again, inside the delete transaction
            .append_query_results([vec![item(1, 11), item(2, 12), item(3, 13)]])
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 3,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 3,
                },
            ])
            .into_connection();
        let store = Arc::new(FakeStore::failing_on(&["gallery/b.png"]));
        let state = state_with(db, store.clone());

        let payload = BulkDeleteRequest { ids: vec![1, 2, 3] };
        let Json(resp) = bulk_delete_gallery_items(State(state.clone()), AppJson(payload))
            .await
            .unwrap();

        assert_eq!(resp.removed, vec![1, 2, 3]);
        assert_eq!(resp.remote_failures.len(), 1);
        assert_eq!(resp.remote_failures[0].remote_id, "gallery/b.png");
        assert_eq!(store.attempts().len(), 3);

        let log = format!("{:?}", state.db.into_transaction_log());
        assert_eq!(log.matches("DELETE").count(), 2);
    }

    #[tokio::test]
    async fn aborted_bulk_delete_unlinks_the_images_already_deleted() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![item(1, 11), item(2, 12)]])
            .append_query_results([vec![
                asset_row(11, "gallery/a.png"),
                asset_row(12, "gallery/b.png"),
            ]])
            .append_query_results([vec![item(1, 11), item(2, 12)]])
            .append_exec_errors([DbErr::Custom("connection reset".into())])
            // compensation: null image_id where it points at 11, drop row 11
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
        let store = Arc::new(FakeStore::failing_on(&["gallery/b.png"]));
        let state = state_with(db, store.clone());

        let payload = BulkDeleteRequest { ids: vec![1, 2] };
        let err = bulk_delete_gallery_items(State(state.clone()), AppJson(payload))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(store.attempts(), vec!["gallery/a.png", "gallery/b.png"]);

        let log = format!("{:?}", state.db.into_transaction_log());
        assert_eq!(log.matches("UPDATE").count(), 1);
        assert!(log.contains(r#"\"image_id\" IN"#));
    }
}

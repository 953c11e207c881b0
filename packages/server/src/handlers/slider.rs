use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter, Set};
use tracing::instrument;

use super::ensure_all_found;
use crate::assets::coordinator;
use crate::assets::records;
use crate::assets::{AssetAction, AssetChanges};
use crate::entity::slider;
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::ordering::*;
use crate::models::slider::*;
use crate::ordering::{OrderedRepository, Scope};
use crate::state::AppState;

type Sliders<'a> = OrderedRepository<'a, slider::Entity>;

async fn render<C: ConnectionTrait>(
    conn: &C,
    rows: Vec<slider::Model>,
) -> Result<Vec<SliderResponse>, AppError> {
    let assets = records::load_map(conn, rows.iter().filter_map(|r| r.image_id)).await?;
    Ok(rows
        .into_iter()
        .map(|r| SliderResponse::build(r, &assets))
        .collect())
}

async fn render_one<C: ConnectionTrait>(
    conn: &C,
    row: slider::Model,
) -> Result<SliderResponse, AppError> {
    let assets = records::load_map(conn, row.image_id).await?;
    Ok(SliderResponse::build(row, &assets))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Sliders",
    operation_id = "listSliders",
    summary = "List slider banners in display order",
    responses(
        (status = 200, description = "Banners ordered by position", body = Vec<SliderResponse>),
    ),
)]
#[instrument(skip(state))]
pub async fn list_sliders(
    State(state): State<AppState>,
) -> Result<Json<Vec<SliderResponse>>, AppError> {
    let rows = Sliders::list(&state.db, Scope::Global).await?;
    Ok(Json(render(&state.db, rows).await?))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Sliders",
    operation_id = "getSlider",
    summary = "Get a slider banner",
    params(("id" = i32, Path, description = "Slider ID")),
    responses(
        (status = 200, description = "Banner", body = SliderResponse),
        (status = 404, description = "Slider not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_slider(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SliderResponse>, AppError> {
    let row = Sliders::find(&state.db, Scope::Global, id).await?;
    Ok(Json(render_one(&state.db, row).await?))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Sliders",
    operation_id = "createSlider",
    summary = "Create a slider banner",
    description = "Inserts a banner at `position` (clamped to the end of the list, appended when \
        omitted). Banners at or after that position move down by one. The image, if given, must \
        be metadata returned by `POST /assets`.",
    request_body = CreateSliderRequest,
    responses(
        (status = 201, description = "Banner created", body = Created<SliderResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Slider is full (CAPACITY_EXCEEDED) or image already attached (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(title = %payload.title))]
pub async fn create_slider(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateSliderRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_slider(&payload)?;

    let now = Utc::now();
    let owner = slider::ActiveModel {
        title: Set(payload.title.trim().to_string()),
        subtitle: Set(payload.subtitle),
        link_url: Set(payload.link_url),
        image_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let changes = AssetChanges::<slider::Entity>::new()
        .field(slider::Column::ImageId, AssetAction::attach(payload.image));

    let repo = Sliders::new(&state);
    let inserted = coordinator::insert_ordered(
        &state,
        &repo,
        Scope::Global,
        payload.position,
        &changes,
        owner,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(Created {
            item: render_one(&state.db, inserted.model).await?,
            shifted: inserted.shifted,
        }),
    ))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Sliders",
    operation_id = "updateSlider",
    summary = "Update a slider banner",
    description = "Partial update. Replacing or clearing the image deletes the previous remote \
        object first; if that fails nothing is changed.",
    params(("id" = i32, Path, description = "Slider ID")),
    request_body = UpdateSliderRequest,
    responses(
        (status = 200, description = "Banner updated", body = SliderResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Slider not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Previous image could not be deleted (REMOTE_ASSET_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn update_slider(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateSliderRequest>,
) -> Result<Json<SliderResponse>, AppError> {
    validate_update_slider(&payload)?;

    let current = Sliders::find(&state.db, Scope::Global, id).await?;
    let image = records::find_optional(&state.db, current.image_id).await?;
    let changes = AssetChanges::<slider::Entity>::new().field(
        slider::Column::ImageId,
        AssetAction::plan(image, payload.image),
    );
    coordinator::release_strict(&state, slider::Column::Id, id, &changes).await?;

    let mut active = current.into_active_model();
    if let Some(title) = payload.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(subtitle) = payload.subtitle {
        active.subtitle = Set(subtitle);
    }
    if let Some(link_url) = payload.link_url {
        active.link_url = Set(link_url);
    }
    active.updated_at = Set(Utc::now());

    let model =
        coordinator::update_owner(&state, slider::Column::Id, id, &changes, active).await?;
    Ok(Json(render_one(&state.db, model).await?))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Sliders",
    operation_id = "deleteSlider",
    summary = "Delete a slider banner",
    description = "Deletes the banner and closes the gap in positions. A failed remote image \
        delete is reported in `remote_failures` and does not block the delete.",
    params(("id" = i32, Path, description = "Slider ID")),
    responses(
        (status = 200, description = "Banner deleted", body = Removed<SliderResponse>),
        (status = 404, description = "Slider not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn delete_slider(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Removed<SliderResponse>>, AppError> {
    let row = Sliders::find(&state.db, Scope::Global, id).await?;
    let assets = records::find_many(&state.db, row.image_id).await?;

    let repo = Sliders::new(&state);
    let (remaining, remote_failures) =
        coordinator::destroy_ordered(&state, &repo, Scope::Global, &[id], &assets).await?;

    Ok(Json(Removed {
        removed: vec![id],
        remaining: render(&state.db, remaining).await?,
        remote_failures,
    }))
}

#[utoipa::path(
    post,
    path = "/bulk-delete",
    tag = "Sliders",
    operation_id = "bulkDeleteSliders",
    summary = "Delete several slider banners",
    description = "Every id must exist, otherwise nothing is deleted. Survivors keep their \
        relative order and are renumbered from 1.",
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "Banners deleted", body = Removed<SliderResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Some ids do not exist (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(count = payload.ids.len()))]
pub async fn bulk_delete_sliders(
    State(state): State<AppState>,
    AppJson(payload): AppJson<BulkDeleteRequest>,
) -> Result<Json<Removed<SliderResponse>>, AppError> {
    validate_bulk_delete(&payload)?;

    let rows = slider::Entity::find()
        .filter(slider::Column::Id.is_in(payload.ids.iter().copied()))
        .all(&state.db)
        .await?;
    ensure_all_found("Slider", &payload.ids, rows.iter().map(|r| r.id))?;
    let assets = records::find_many(&state.db, rows.iter().filter_map(|r| r.image_id)).await?;

    let repo = Sliders::new(&state);
    let (remaining, remote_failures) =
        coordinator::destroy_ordered(&state, &repo, Scope::Global, &payload.ids, &assets).await?;

    Ok(Json(Removed {
        removed: payload.ids,
        remaining: render(&state.db, remaining).await?,
        remote_failures,
    }))
}

#[utoipa::path(
    put,
    path = "/{id}/position",
    tag = "Sliders",
    operation_id = "moveSlider",
    summary = "Move a slider banner",
    description = "Moves the banner to `position` (clamped to the last slot); the banners in \
        between shift by one.",
    params(("id" = i32, Path, description = "Slider ID")),
    request_body = MoveRequest,
    responses(
        (status = 200, description = "Banners after the move", body = Vec<SliderResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Slider not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(position = payload.position))]
pub async fn move_slider(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<MoveRequest>,
) -> Result<Json<Vec<SliderResponse>>, AppError> {
    validate_move(&payload)?;

    let rows = Sliders::new(&state)
        .move_to(Scope::Global, id, payload.position)
        .await?;
    Ok(Json(render(&state.db, rows).await?))
}

#[utoipa::path(
    post,
    path = "/swap",
    tag = "Sliders",
    operation_id = "swapSliders",
    summary = "Swap two slider banners",
    request_body = SwapRequest,
    responses(
        (status = 200, description = "Banners after the swap", body = Vec<SliderResponse>),
        (status = 400, description = "Same id twice (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Slider not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(first = payload.first_id, second = payload.second_id))]
pub async fn swap_sliders(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SwapRequest>,
) -> Result<Json<Vec<SliderResponse>>, AppError> {
    validate_swap(&payload)?;

    let rows = Sliders::new(&state)
        .swap(Scope::Global, payload.first_id, payload.second_id)
        .await?;
    Ok(Json(render(&state.db, rows).await?))
}

#[utoipa::path(
    put,
    path = "/reorder",
    tag = "Sliders",
    operation_id = "reorderSliders",
    summary = "Reorder all slider banners",
    description = "`ids` must list every banner exactly once.",
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Banners in their new order", body = Vec<SliderResponse>),
        (status = 400, description = "Ids do not match the banners (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(count = payload.ids.len()))]
pub async fn reorder_sliders(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ReorderRequest>,
) -> Result<Json<Vec<SliderResponse>>, AppError> {
    validate_reorder(&payload)?;

    let rows = Sliders::new(&state)
        .reorder(Scope::Global, &payload.ids)
        .await?;
    Ok(Json(render(&state.db, rows).await?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use super::*;
    use crate::entity::asset;
    use crate::test_support::{FakeStore, asset_row, meta, state_with};

    fn banner(id: i32, position: i32, image_id: Option<i32>) -> slider::Model {
        slider::Model {
            id,
            title: format!("Banner {id}"),
            subtitle: None,
            link_url: None,
            position,
            image_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn affected(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    #[tokio::test]
    async fn failed_image_replace_leaves_banner_untouched() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![banner(1, 1, Some(10))]])
            .append_query_results([vec![asset_row(10, "sliders/old.png")]])
            .append_query_results([Vec::<asset::Model>::new()])
            .into_connection();
        let store = Arc::new(FakeStore::failing_on(&["sliders/old.png"]));
        let state = state_with(db, store.clone());

        let payload = UpdateSliderRequest {
            title: Some("Renamed".into()),
            image: Some(Some(meta("sliders/new.png"))),
            ..Default::default()
        };
        let err = update_slider(State(state.clone()), Path(1), AppJson(payload))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RemoteAsset(_)));
        assert_eq!(store.attempts(), vec!["sliders/old.png"]);

        let log = format!("{:?}", state.db.into_transaction_log());
        assert!(!log.contains("INSERT"));
        assert!(!log.contains("UPDATE"));
        assert!(!log.contains("DELETE"));
    }

    #[tokio::test]
    async fn delete_proceeds_when_remote_delete_fails() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // lookup, its image, then inside the transaction: the owner again,
            // the scope, the re-read
            .append_query_results([vec![banner(1, 1, Some(10))]])
            .append_query_results([vec![asset_row(10, "sliders/a.png")]])
            .append_query_results([vec![banner(1, 1, Some(10))]])
            .append_query_results([vec![banner(1, 1, Some(10)), banner(2, 2, None)]])
            .append_query_results([vec![banner(2, 1, None)]])
            .append_exec_results([affected(1), affected(1), affected(1)])
            .into_connection();
        let store = Arc::new(FakeStore::failing_on(&["sliders/a.png"]));
        let state = state_with(db, store.clone());

        let Json(removed) = delete_slider(State(state.clone()), Path(1)).await.unwrap();

        assert_eq!(removed.removed, vec![1]);
        assert_eq!(removed.remote_failures.len(), 1);
        assert_eq!(removed.remote_failures[0].remote_id, "sliders/a.png");
        assert_eq!(removed.remaining.len(), 1);
        assert_eq!(removed.remaining[0].position, 1);

        let log = format!("{:?}", state.db.into_transaction_log());
        assert_eq!(log.matches("DELETE").count(), 2);
        assert_eq!(log.matches("UPDATE").count(), 1);
    }

    #[tokio::test]
    async fn image_replaced_during_delete_is_removed_too() {
        // Image 11 replaced image 10 between the first read and the delete
        // transaction.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![banner(1, 1, Some(10))]])
            .append_query_results([vec![asset_row(10, "sliders/a.png")]])
            .append_query_results([vec![banner(1, 1, Some(11))]])
            .append_query_results([vec![asset_row(11, "sliders/b.png")]])
            .append_query_results([vec![banner(1, 1, Some(11))]])
            .append_query_results([Vec::<slider::Model>::new()])
            .append_exec_results([affected(1), affected(1)])
            .into_connection();
        let store = Arc::new(FakeStore::new());
        let state = state_with(db, store.clone());

        let Json(removed) = delete_slider(State(state.clone()), Path(1)).await.unwrap();

        assert!(removed.remaining.is_empty());
        assert!(removed.remote_failures.is_empty());
        assert_eq!(store.attempts(), vec!["sliders/a.png", "sliders/b.png"]);

        let log = format!("{:?}", state.db.into_transaction_log());
        assert_eq!(log.matches("DELETE").count(), 2);
        assert!(log.contains("Int(Some(11))"));
    }

    #[tokio::test]
    async fn bulk_delete_with_unknown_id_deletes_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![banner(1, 1, None)]])
            .into_connection();
        let store = Arc::new(FakeStore::new());
        let state = state_with(db, store.clone());

        let payload = BulkDeleteRequest { ids: vec![1, 5] };
        let err = bulk_delete_sliders(State(state.clone()), AppJson(payload))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.attempts().is_empty());
        let log = format!("{:?}", state.db.into_transaction_log());
        assert!(!log.contains("DELETE"));
    }

    #[tokio::test]
    async fn swapping_a_banner_with_itself_is_rejected_before_any_query() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let state = state_with(db, Arc::new(FakeStore::new()));

        let payload = SwapRequest {
            first_id: 3,
            second_id: 3,
        };
        let err = swap_sliders(State(state.clone()), AppJson(payload))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(state.db.into_transaction_log().is_empty());
    }
}

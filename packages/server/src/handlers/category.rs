use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, Set,
};
use tracing::{info, instrument};

use super::addons;
use crate::assets::coordinator;
use crate::assets::records;
use crate::assets::{AssetAction, AssetChanges};
use crate::database::{TxnProfile, begin, bounded, with_retry};
use crate::entity::{category, category_addon, service};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::addon::{AddonResponse, CreateAddonRequest, ReplaceAddonsRequest};
use crate::models::category::*;
use crate::models::ordering::*;
use crate::ordering::{OrderedRepository, Scope};
use crate::state::AppState;

type Categories<'a> = OrderedRepository<'a, category::Entity>;

fn image_ids(m: &category::Model) -> [Option<i32>; 2] {
    [m.card_image_id, m.details_image_id]
}

async fn render<C: ConnectionTrait>(
    conn: &C,
    rows: Vec<category::Model>,
) -> Result<Vec<CategoryResponse>, AppError> {
    let assets = records::load_map(conn, rows.iter().flat_map(image_ids).flatten()).await?;
    Ok(rows
        .into_iter()
        .map(|r| CategoryResponse::build(r, &assets))
        .collect())
}

async fn render_one<C: ConnectionTrait>(
    conn: &C,
    row: category::Model,
) -> Result<CategoryResponse, AppError> {
    let assets = records::load_map(conn, image_ids(&row).into_iter().flatten()).await?;
    Ok(CategoryResponse::build(row, &assets))
}

/// Names are unique across categories. `except` skips the row being renamed.
async fn ensure_unique_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    except: Option<i32>,
) -> Result<(), AppError> {
    let mut query = category::Entity::find().filter(category::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(category::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Category '{name}' already exists"
        )));
    }
    Ok(())
}

async fn ensure_unreferenced<C: ConnectionTrait>(conn: &C, id: i32) -> Result<(), AppError> {
    let services = service::Entity::find()
        .filter(service::Column::CategoryId.eq(id))
        .count(conn)
        .await?;
    if services > 0 {
        return Err(AppError::Conflict(format!(
            "Category {id} still has {services} service(s)"
        )));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Categories",
    operation_id = "listCategories",
    summary = "List categories in display order",
    responses(
        (status = 200, description = "Categories ordered by position", body = Vec<CategoryResponse>),
    ),
)]
#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryResponse>>, AppError> {
    let rows = Categories::list(&state.db, Scope::Global).await?;
    Ok(Json(render(&state.db, rows).await?))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Categories",
    operation_id = "getCategory",
    summary = "Get a category",
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category", body = CategoryResponse),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<CategoryResponse>, AppError> {
    let row = Categories::find(&state.db, Scope::Global, id).await?;
    Ok(Json(render_one(&state.db, row).await?))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Categories",
    operation_id = "createCategory",
    summary = "Create a category",
    description = "Inserts a category at `position` (appended when omitted). Names must be unique.",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = Created<CategoryResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Duplicate name (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(name = %payload.name))]
pub async fn create_category(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateCategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_category(&payload)?;

    let name = payload.name.trim().to_string();
    ensure_unique_name(&state.db, &name, None).await?;

    let now = Utc::now();
    let owner = category::ActiveModel {
        name: Set(name),
        description: Set(payload.description),
        card_image_id: Set(None),
        details_image_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let changes = AssetChanges::<category::Entity>::new()
        .field(
            category::Column::CardImageId,
            AssetAction::attach(payload.card_image),
        )
        .field(
            category::Column::DetailsImageId,
            AssetAction::attach(payload.details_image),
        );

    let repo = Categories::new(&state);
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
    tag = "Categories",
    operation_id = "updateCategory",
    summary = "Update a category",
    description = "Partial update. Each image is replaced or cleared strictly: the previous \
        remote object is deleted first and a failure aborts the update.",
    params(("id" = i32, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Duplicate name (CONFLICT)", body = ErrorBody),
        (status = 502, description = "Previous image could not be deleted (REMOTE_ASSET_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateCategoryRequest>,
) -> Result<Json<CategoryResponse>, AppError> {
    validate_update_category(&payload)?;

    let current = Categories::find(&state.db, Scope::Global, id).await?;
    let name = payload.name.map(|n| n.trim().to_string());
    if let Some(ref name) = name {
        ensure_unique_name(&state.db, name, Some(id)).await?;
    }

    let card = records::find_optional(&state.db, current.card_image_id).await?;
    let details = records::find_optional(&state.db, current.details_image_id).await?;
    let changes = AssetChanges::<category::Entity>::new()
        .field(
            category::Column::CardImageId,
            AssetAction::plan(card, payload.card_image),
        )
        .field(
            category::Column::DetailsImageId,
            AssetAction::plan(details, payload.details_image),
        );
    coordinator::release_strict(&state, category::Column::Id, id, &changes).await?;

    let mut active = current.into_active_model();
    if let Some(name) = name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    active.updated_at = Set(Utc::now());

    let model =
        coordinator::update_owner(&state, category::Column::Id, id, &changes, active).await?;
    Ok(Json(render_one(&state.db, model).await?))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Categories",
    operation_id = "deleteCategory",
    summary = "Delete a category",
    description = "Refused while any service belongs to the category. Deletes the category's \
        add-ons and images; failed remote image deletes are reported, not fatal.",
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category deleted", body = Removed<CategoryResponse>),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Services still reference the category (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Removed<CategoryResponse>>, AppError> {
    let row = Categories::find(&state.db, Scope::Global, id).await?;
    ensure_unreferenced(&state.db, id).await?;

    let assets = records::find_many(&state.db, image_ids(&row).into_iter().flatten()).await?;
    let mut remote_failures = coordinator::release_lenient(&*state.assets, &assets).await;

    let state = &state;
    let repo = &Categories::new(state);
    let assets = &assets;
    let settings = &state.config.transactions;
    let profile = TxnProfile::AssetReplace;

    let result = with_retry(profile, settings, move || async move {
        let txn = begin(&state.db, profile).await?;
        bounded(profile, settings, async move {
            // A service created since the first check would be orphaned.
            ensure_unreferenced(&txn, id).await?;
            let late = coordinator::late_assets::<category::Entity, _>(
                &txn,
                category::Column::Id,
                &[id],
                assets,
            )
            .await?;
            let addons = category_addon::Entity::delete_many()
                .filter(category_addon::Column::CategoryId.eq(id))
                .exec(&txn)
                .await?;
            let remaining = repo.delete_in(&txn, Scope::Global, id).await?;
            records::delete_ids(&txn, assets.iter().chain(&late).map(|a| a.id)).await?;
            txn.commit().await?;
            info!(
                category_id = id,
                addons = addons.rows_affected,
                "Deleted category"
            );
            Ok((remaining, late))
        })
        .await
    })
    .await;

    // A refusal here comes after the images were deleted remotely; the
    // surviving category is detached from them.
    let (remaining, late) =
        coordinator::settle_destroy::<category::Entity, _>(state, assets, &remote_failures, result)
            .await?;
    remote_failures.extend(coordinator::release_lenient(&*state.assets, &late).await);

    Ok(Json(Removed {
        removed: vec![id],
        remaining: render(&state.db, remaining).await?,
        remote_failures,
    }))
}

#[utoipa::path(
    put,
    path = "/{id}/position",
    tag = "Categories",
    operation_id = "moveCategory",
    summary = "Move a category",
    params(("id" = i32, Path, description = "Category ID")),
    request_body = MoveRequest,
    responses(
        (status = 200, description = "Categories after the move", body = Vec<CategoryResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(position = payload.position))]
pub async fn move_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<MoveRequest>,
) -> Result<Json<Vec<CategoryResponse>>, AppError> {
    validate_move(&payload)?;

    let rows = Categories::new(&state)
        .move_to(Scope::Global, id, payload.position)
        .await?;
    Ok(Json(render(&state.db, rows).await?))
}

#[utoipa::path(
    post,
    path = "/swap",
    tag = "Categories",
    operation_id = "swapCategories",
    summary = "Swap two categories",
    request_body = SwapRequest,
    responses(
        (status = 200, description = "Categories after the swap", body = Vec<CategoryResponse>),
        (status = 400, description = "Same id twice (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(first = payload.first_id, second = payload.second_id))]
pub async fn swap_categories(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SwapRequest>,
) -> Result<Json<Vec<CategoryResponse>>, AppError> {
    validate_swap(&payload)?;

    let rows = Categories::new(&state)
        .swap(Scope::Global, payload.first_id, payload.second_id)
        .await?;
    Ok(Json(render(&state.db, rows).await?))
}

#[utoipa::path(
    put,
    path = "/reorder",
    tag = "Categories",
    operation_id = "reorderCategories",
    summary = "Reorder all categories",
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Categories in their new order", body = Vec<CategoryResponse>),
        (status = 400, description = "Ids do not match the categories (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(count = payload.ids.len()))]
pub async fn reorder_categories(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ReorderRequest>,
) -> Result<Json<Vec<CategoryResponse>>, AppError> {
    validate_reorder(&payload)?;

    let rows = Categories::new(&state)
        .reorder(Scope::Global, &payload.ids)
        .await?;
    Ok(Json(render(&state.db, rows).await?))
}

#[utoipa::path(
    get,
    path = "/{id}/addons",
    tag = "Category Add-ons",
    operation_id = "listCategoryAddons",
    summary = "List a category's add-ons",
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Add-ons ordered by position", body = Vec<AddonResponse>),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn list_category_addons(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<AddonResponse>>, AppError> {
    Categories::find(&state.db, Scope::Global, id).await?;
    Ok(Json(addons::list::<category_addon::Entity>(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/{id}/addons",
    tag = "Category Add-ons",
    operation_id = "createCategoryAddon",
    summary = "Add an add-on to a category",
    params(("id" = i32, Path, description = "Category ID")),
    request_body = CreateAddonRequest,
    responses(
        (status = 201, description = "Add-on created", body = Created<AddonResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(name = %payload.name))]
pub async fn create_category_addon(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<CreateAddonRequest>,
) -> Result<impl IntoResponse, AppError> {
    Categories::find(&state.db, Scope::Global, id).await?;
    let created = addons::insert::<category_addon::Entity>(&state, id, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/{id}/addons",
    tag = "Category Add-ons",
    operation_id = "replaceCategoryAddons",
    summary = "Replace a category's add-ons",
    description = "`names` is the complete desired list. Repeated names are dropped, keeping \
        the first occurrence (case-sensitive). Positions are renumbered from 1.",
    params(("id" = i32, Path, description = "Category ID")),
    request_body = ReplaceAddonsRequest,
    responses(
        (status = 200, description = "The new add-on list", body = Vec<AddonResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(count = payload.names.len()))]
pub async fn replace_category_addons(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<ReplaceAddonsRequest>,
) -> Result<Json<Vec<AddonResponse>>, AppError> {
    Categories::find(&state.db, Scope::Global, id).await?;
    Ok(Json(
        addons::replace::<category_addon::Entity>(&state, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/{id}/addons/{addon_id}",
    tag = "Category Add-ons",
    operation_id = "deleteCategoryAddon",
    summary = "Remove an add-on from a category",
    params(
        ("id" = i32, Path, description = "Category ID"),
        ("addon_id" = i32, Path, description = "Add-on ID"),
    ),
    responses(
        (status = 200, description = "Remaining add-ons", body = Vec<AddonResponse>),
        (status = 404, description = "Category or add-on not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn delete_category_addon(
    State(state): State<AppState>,
    Path((id, addon_id)): Path<(i32, i32)>,
) -> Result<Json<Vec<AddonResponse>>, AppError> {
    Ok(Json(
        addons::remove::<category_addon::Entity>(&state, id, addon_id).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/{id}/addons/{addon_id}/position",
    tag = "Category Add-ons",
    operation_id = "moveCategoryAddon",
    summary = "Move a category add-on",
    params(
        ("id" = i32, Path, description = "Category ID"),
        ("addon_id" = i32, Path, description = "Add-on ID"),
    ),
    request_body = MoveRequest,
    responses(
        (status = 200, description = "Add-ons after the move", body = Vec<AddonResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Category or add-on not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(position = payload.position))]
pub async fn move_category_addon(
    State(state): State<AppState>,
    Path((id, addon_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<MoveRequest>,
) -> Result<Json<Vec<AddonResponse>>, AppError> {
    Ok(Json(
        addons::move_to::<category_addon::Entity>(&state, id, addon_id, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/{id}/addons/swap",
    tag = "Category Add-ons",
    operation_id = "swapCategoryAddons",
    summary = "Swap two add-ons of a category",
    params(("id" = i32, Path, description = "Category ID")),
    request_body = SwapRequest,
    responses(
        (status = 200, description = "Add-ons after the swap", body = Vec<AddonResponse>),
        (status = 400, description = "Same id twice (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Add-on not found in this category (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn swap_category_addons(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<SwapRequest>,
) -> Result<Json<Vec<AddonResponse>>, AppError> {
    Ok(Json(
        addons::swap::<category_addon::Entity>(&state, id, payload).await?,
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};

    use super::*;
    use crate::test_support::{FakeStore, asset_row, state_with};

    fn category(id: i32, name: &str, position: i32) -> category::Model {
        category::Model {
            id,
            name: name.to_string(),
            description: None,
            position,
            card_image_id: Some(10),
            details_image_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::BigInt(Some(n)))])
    }

    #[tokio::test]
    async fn category_with_services_is_not_deleted() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![category(4, "Detailing", 1)]])
            .append_query_results([vec![count_row(2)]])
            .into_connection();
        let store = Arc::new(FakeStore::new());
        let state = state_with(db, store.clone());

        let err = delete_category(State(state.clone()), Path(4))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert!(store.attempts().is_empty());
        let log = format!("{:?}", state.db.into_transaction_log());
        assert!(!log.contains("DELETE"));
    }

    #[tokio::test]
    async fn duplicate_name_is_a_conflict() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![category(1, "Detailing", 1)]])
            .into_connection();
        let state = state_with(db, Arc::new(FakeStore::new()));

        let payload = CreateCategoryRequest {
            name: "Detailing".into(),
            description: None,
            position: None,
            card_image: None,
            details_image: None,
        };
        let result = create_category(State(state), AppJson(payload)).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn unknown_category_is_not_found_before_asset_lookup() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<category::Model>::new()])
            .into_connection();
        let store = Arc::new(FakeStore::new());
        let state = state_with(db, store.clone());

        let err = delete_category(State(state), Path(99)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.attempts().is_empty());
    }

    fn affected(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    #[tokio::test]
    async fn service_added_during_delete_leaves_category_without_its_deleted_image() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![category(4, "Detailing", 1)]])
            .append_query_results([vec![count_row(0)]])
            .append_query_results([vec![asset_row(10, "categories/card.png")]])
            // the recheck inside the transaction sees a new service
            .append_query_results([vec![count_row(1)]])
            // compensation: one UPDATE per image column, then the asset row
            .append_exec_results([affected(1), affected(0), affected(1)])
            .into_connection();
        let store = Arc::new(FakeStore::new());
        let state = state_with(db, store.clone());

        let err = delete_category(State(state.clone()), Path(4))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.attempts(), vec!["categories/card.png"]);

        let log = format!("{:?}", state.db.into_transaction_log());
        assert_eq!(log.matches("UPDATE").count(), 2);
        assert_eq!(log.matches("DELETE").count(), 1);
    }

    #[tokio::test]
    async fn addon_for_category_deleted_meanwhile_is_not_found() {
        // The handler's lookup still sees the category; the insert
        // transaction does not.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![category(4, "Detailing", 1)]])
            .append_query_results([Vec::<category::Model>::new()])
            .into_connection();
        let state = state_with(db, Arc::new(FakeStore::new()));

        let payload = CreateAddonRequest {
            name: "Wax".into(),
            position: None,
        };
        let result = create_category_addon(State(state.clone()), Path(4), AppJson(payload)).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        let log = format!("{:?}", state.db.into_transaction_log());
        assert!(!log.contains("INSERT"));
        assert!(!log.contains(r#"FROM \"category_addon\""#));
    }
}

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
use crate::entity::testimonial;
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::asset::DeleteResponse;
use crate::models::testimonial::*;
use crate::state::AppState;

async fn find_testimonial<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<testimonial::Model, AppError> {
    testimonial::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Testimonial {id} not found")))
}

async fn render_one<C: ConnectionTrait>(
    conn: &C,
    row: testimonial::Model,
) -> Result<TestimonialResponse, AppError> {
    let assets = records::load_map(conn, row.image_id).await?;
    Ok(TestimonialResponse::build(row, &assets))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Testimonials",
    operation_id = "listTestimonials",
    summary = "List testimonials, newest first",
    responses(
        (status = 200, description = "Testimonials", body = Vec<TestimonialResponse>),
    ),
)]
#[instrument(skip(state))]
pub async fn list_testimonials(
    State(state): State<AppState>,
) -> Result<Json<Vec<TestimonialResponse>>, AppError> {
    let rows = testimonial::Entity::find()
        .order_by_desc(testimonial::Column::CreatedAt)
        .order_by_desc(testimonial::Column::Id)
        .all(&state.db)
        .await?;

    let assets = records::load_map(&state.db, rows.iter().filter_map(|r| r.image_id)).await?;
    Ok(Json(
        rows.into_iter()
            .map(|r| TestimonialResponse::build(r, &assets))
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Testimonials",
    operation_id = "getTestimonial",
    summary = "Get a testimonial",
    params(("id" = i32, Path, description = "Testimonial ID")),
    responses(
        (status = 200, description = "Testimonial", body = TestimonialResponse),
        (status = 404, description = "Testimonial not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_testimonial(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<TestimonialResponse>, AppError> {
    let row = find_testimonial(&state.db, id).await?;
    Ok(Json(render_one(&state.db, row).await?))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Testimonials",
    operation_id = "createTestimonial",
    summary = "Create a testimonial",
    request_body = CreateTestimonialRequest,
    responses(
        (status = 201, description = "Testimonial created", body = TestimonialResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Image already attached (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(author = %payload.author))]
pub async fn create_testimonial(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateTestimonialRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_testimonial(&payload)?;

    let now = Utc::now();
    let owner = testimonial::ActiveModel {
        author: Set(payload.author.trim().to_string()),
        role: Set(payload.role),
        quote: Set(payload.quote),
        rating: Set(payload.rating),
        image_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let changes = AssetChanges::<testimonial::Entity>::new().field(
        testimonial::Column::ImageId,
        AssetAction::attach(payload.image),
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
    tag = "Testimonials",
    operation_id = "updateTestimonial",
    summary = "Update a testimonial",
    params(("id" = i32, Path, description = "Testimonial ID")),
    request_body = UpdateTestimonialRequest,
    responses(
        (status = 200, description = "Testimonial updated", body = TestimonialResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Testimonial not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Previous photo could not be deleted (REMOTE_ASSET_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn update_testimonial(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateTestimonialRequest>,
) -> Result<Json<TestimonialResponse>, AppError> {
    validate_update_testimonial(&payload)?;

    let current = find_testimonial(&state.db, id).await?;
    let image = records::find_optional(&state.db, current.image_id).await?;
    let changes = AssetChanges::<testimonial::Entity>::new().field(
        testimonial::Column::ImageId,
        AssetAction::plan(image, payload.image),
    );
    coordinator::release_strict(&state, testimonial::Column::Id, id, &changes).await?;

    let mut active = current.into_active_model();
    if let Some(author) = payload.author {
        active.author = Set(author.trim().to_string());
    }
    if let Some(role) = payload.role {
        active.role = Set(role);
    }
    if let Some(quote) = payload.quote {
        active.quote = Set(quote);
    }
    if let Some(rating) = payload.rating {
        active.rating = Set(rating);
    }
    active.updated_at = Set(Utc::now());

    let model =
        coordinator::update_owner(&state, testimonial::Column::Id, id, &changes, active).await?;
    Ok(Json(render_one(&state.db, model).await?))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Testimonials",
    operation_id = "deleteTestimonial",
    summary = "Delete a testimonial",
    params(("id" = i32, Path, description = "Testimonial ID")),
    responses(
        (status = 200, description = "Testimonial deleted", body = DeleteResponse),
        (status = 404, description = "Testimonial not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn delete_testimonial(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<DeleteResponse>, AppError> {
    let row = find_testimonial(&state.db, id).await?;
    let assets = records::find_many(&state.db, row.image_id).await?;

    let remote_failures = coordinator::destroy_owners::<testimonial::Entity>(
        &state,
        testimonial::Column::Id,
        &[id],
        &assets,
    )
    .await?;

    Ok(Json(DeleteResponse {
        id,
        remote_failures,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};

    use super::*;
    use crate::entity::asset;
    use crate::test_support::{FakeStore, asset_row, meta, state_with};

    fn review(id: i32, image_id: Option<i32>) -> testimonial::Model {
        testimonial::Model {
            id,
            author: "Dana K.".into(),
            role: None,
            quote: "Spotless.".into(),
            rating: 5,
            image_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn clearing_photo_deletes_remote_object_before_the_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![review(3, Some(8))]])
            .append_query_results([vec![asset_row(8, "people/dana.png")]])
            // UPDATE ... RETURNING
            .append_query_results([vec![review(3, None)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let store = Arc::new(FakeStore::new());
        let state = state_with(db, store.clone());

        let payload = UpdateTestimonialRequest {
            image: Some(None),
            ..Default::default()
        };
        let Json(resp) = update_testimonial(State(state.clone()), Path(3), AppJson(payload))
            .await
            .unwrap();

        assert!(resp.image.is_none());
        assert_eq!(store.attempts(), vec!["people/dana.png"]);
        let log = format!("{:?}", state.db.into_transaction_log());
        assert!(log.contains("DELETE"));
    }

    #[tokio::test]
    async fn failed_photo_replace_aborts_the_update() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![review(3, Some(8))]])
            .append_query_results([vec![asset_row(8, "people/dana.png")]])
            // nothing else holds the replacement
            .append_query_results([Vec::<asset::Model>::new()])
            .into_connection();
        let store = Arc::new(FakeStore::failing_on(&["people/dana.png"]));
        let state = state_with(db, store);

        let payload = UpdateTestimonialRequest {
            rating: Some(4),
            image: Some(Some(meta("people/dana-2.png"))),
            ..Default::default()
        };
        let err = update_testimonial(State(state.clone()), Path(3), AppJson(payload))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RemoteAsset(_)));
        let log = format!("{:?}", state.db.into_transaction_log());
        assert!(!log.contains("INSERT"));
        assert!(!log.contains("UPDATE"));
    }

    #[tokio::test]
    async fn out_of_range_width_is_rejected_before_any_remote_delete() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let store = Arc::new(FakeStore::new());
        let state = state_with(db, store.clone());

        let mut photo = meta("people/dana-2.png");
        photo.width = 3_000_000_000;
        let payload = UpdateTestimonialRequest {
            image: Some(Some(photo)),
            ..Default::default()
        };
        let err = update_testimonial(State(state.clone()), Path(3), AppJson(payload))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.attempts().is_empty());
        assert!(state.db.into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn replacement_attached_elsewhere_is_refused_before_any_remote_delete() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![review(3, Some(8))]])
            .append_query_results([vec![asset_row(8, "people/dana.png")]])
            .append_query_results([vec![asset_row(20, "people/sam.png")]])
            .into_connection();
        let store = Arc::new(FakeStore::new());
        let state = state_with(db, store.clone());

        let payload = UpdateTestimonialRequest {
            image: Some(Some(meta("people/sam.png"))),
            ..Default::default()
        };
        let err = update_testimonial(State(state.clone()), Path(3), AppJson(payload))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert!(store.attempts().is_empty());
        let log = format!("{:?}", state.db.into_transaction_log());
        assert!(!log.contains("UPDATE"));
        assert!(!log.contains("DELETE"));
    }

    #[tokio::test]
    async fn failed_update_after_remote_delete_detaches_the_photo() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![review(3, Some(8))]])
            .append_query_results([vec![asset_row(8, "people/dana.png")]])
            .append_query_results([Vec::<asset::Model>::new()])
            // INSERT of the replacement row inside the update transaction
            .append_query_errors([DbErr::Custom("connection reset".into())])
            // compensation: null the column, drop the old row
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
        let store = Arc::new(FakeStore::new());
        let state = state_with(db, store.clone());

        let payload = UpdateTestimonialRequest {
            image: Some(Some(meta("people/dana-2.png"))),
            ..Default::default()
        };
        let err = update_testimonial(State(state.clone()), Path(3), AppJson(payload))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(store.attempts(), vec!["people/dana.png"]);

        let log = format!("{:?}", state.db.into_transaction_log());
        assert_eq!(log.matches("UPDATE").count(), 1);
        assert_eq!(log.matches("DELETE").count(), 1);
    }
}

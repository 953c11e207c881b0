use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::storage::{validate_folder, validate_remote_id};
use tracing::{info, instrument};

use crate::assets::records;
use crate::error::{AppError, ErrorBody};
use crate::models::asset::{AssetMetadata, DiscardAssetResponse};
use crate::state::AppState;

const DEFAULT_FOLDER: &str = "uploads";

/// Room for multipart boundaries and the `folder` field on top of the file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn upload_body_limit(max_upload_size: u64) -> DefaultBodyLimit {
    let max = usize::try_from(max_upload_size).unwrap_or(usize::MAX);
    DefaultBodyLimit::max(max.saturating_add(MULTIPART_OVERHEAD))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Assets",
    operation_id = "uploadAsset",
    summary = "Upload an image",
    description = "Uploads an image to the asset store and returns its metadata. The `file` \
        multipart field is required; an optional `folder` field (default `uploads`) groups \
        the object. Nothing is recorded in the database until the metadata is attached to a \
        resource. Unused uploads can be removed with `DELETE /assets/{remote_id}`.",
    request_body(content_type = "multipart/form-data", description = "Image with optional folder"),
    responses(
        (status = 201, description = "Image uploaded", body = AssetMetadata),
        (status = 400, description = "Not an image, bad folder or too large (VALIDATION_ERROR)", body = ErrorBody),
        (status = 502, description = "Asset store failed (REMOTE_ASSET_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, multipart))]
pub async fn upload_asset(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut data: Option<Vec<u8>> = None;
    let mut folder: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
                data = Some(bytes.to_vec());
            }
            Some("folder") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read folder: {e}")))?;
                folder = Some(text);
            }
            _ => {}
        }
    }

    let data = data.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;
    if data.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".into()));
    }
    let folder = match folder {
        Some(f) if !f.trim().is_empty() => f.trim().to_string(),
        _ => DEFAULT_FOLDER.to_string(),
    };
    validate_folder(&folder)?;

    let uploaded = state.assets.upload(&data, &folder).await?;
    info!(
        remote_id = %uploaded.remote_id,
        byte_size = uploaded.byte_size,
        "Uploaded asset"
    );

    Ok((StatusCode::CREATED, Json(AssetMetadata::from(uploaded))))
}

#[utoipa::path(
    delete,
    path = "/{remote_id}",
    tag = "Assets",
    operation_id = "discardAsset",
    summary = "Discard an unattached upload",
    description = "Deletes an uploaded object that was never attached to a resource. Objects \
        still referenced by a resource are refused; remove or replace them through that \
        resource instead.",
    params(("remote_id" = String, Path, description = "Remote id returned by the upload, URL-encoded (`/` as `%2F`)")),
    responses(
        (status = 200, description = "Object deleted", body = DiscardAssetResponse),
        (status = 400, description = "Malformed remote id (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Object is attached to a resource (CONFLICT)", body = ErrorBody),
        (status = 502, description = "Asset store failed (REMOTE_ASSET_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn discard_asset(
    State(state): State<AppState>,
    Path(remote_id): Path<String>,
) -> Result<Json<DiscardAssetResponse>, AppError> {
    validate_remote_id(&remote_id)?;

    if records::find_by_remote_id(&state.db, &remote_id)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(format!(
            "Asset '{remote_id}' is attached to a resource"
        )));
    }

    let outcome = state.assets.delete(&remote_id).await?;
    Ok(Json(DiscardAssetResponse {
        remote_id,
        found: outcome.found,
    }))
}

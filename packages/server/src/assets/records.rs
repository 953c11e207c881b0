use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use crate::entity::asset;
use crate::error::AppError;
use crate::models::asset::AssetMetadata;

/// Insert a row for an uploaded object.
///
/// `remote_id` is unique, so an object already attached elsewhere is a
/// conflict.
pub async fn create<C: ConnectionTrait>(
    conn: &C,
    meta: &AssetMetadata,
) -> Result<asset::Model, AppError> {
    let width = i32::try_from(meta.width)
        .map_err(|_| AppError::Validation("Asset width is out of range".into()))?;
    let height = i32::try_from(meta.height)
        .map_err(|_| AppError::Validation("Asset height is out of range".into()))?;
    let byte_size = i64::try_from(meta.byte_size)
        .map_err(|_| AppError::Validation("Asset size is out of range".into()))?;

    let row = asset::ActiveModel {
        remote_id: Set(meta.remote_id.clone()),
        url: Set(meta.url.clone()),
        width: Set(width),
        height: Set(height),
        format: Set(meta.format.clone()),
        byte_size: Set(byte_size),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    row.insert(conn)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict(format!(
                "Asset '{}' is already attached",
                meta.remote_id
            )),
            other => other,
        })
}

/// The row behind an owner's nullable reference, if any.
pub async fn find_optional<C: ConnectionTrait>(
    conn: &C,
    id: Option<i32>,
) -> Result<Option<asset::Model>, AppError> {
    match id {
        Some(id) => Ok(asset::Entity::find_by_id(id).one(conn).await?),
        None => Ok(None),
    }
}

pub async fn find_many<C: ConnectionTrait>(
    conn: &C,
    ids: impl IntoIterator<Item = i32>,
) -> Result<Vec<asset::Model>, AppError> {
    let ids: Vec<i32> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(asset::Entity::find()
        .filter(asset::Column::Id.is_in(ids))
        .all(conn)
        .await?)
}

/// Rows keyed by id, for embedding into owner responses.
pub async fn load_map<C: ConnectionTrait>(
    conn: &C,
    ids: impl IntoIterator<Item = i32>,
) -> Result<HashMap<i32, asset::Model>, AppError> {
    Ok(find_many(conn, ids)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect())
}

pub async fn find_by_remote_id<C: ConnectionTrait>(
    conn: &C,
    remote_id: &str,
) -> Result<Option<asset::Model>, AppError> {
    Ok(asset::Entity::find()
        .filter(asset::Column::RemoteId.eq(remote_id))
        .one(conn)
        .await?)
}

pub async fn delete_ids<C: ConnectionTrait>(
    conn: &C,
    ids: impl IntoIterator<Item = i32>,
) -> Result<u64, AppError> {
    let ids: Vec<i32> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(0);
    }
    let result = asset::Entity::delete_many()
        .filter(asset::Column::Id.is_in(ids))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

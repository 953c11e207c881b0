use serde::{Deserialize, Serialize};

use super::asset::RemoteFailure;
use super::shared::{validate_bulk_ids, validate_position, validate_reorder_ids};
use crate::error::AppError;

/// Upper bound on ids accepted by one bulk request.
pub const MAX_BULK_IDS: usize = 100;

/// Request body for exchanging the positions of two items.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct SwapRequest {
    #[schema(example = 3)]
    pub first_id: i32,
    #[schema(example = 7)]
    pub second_id: i32,
}

/// Request body for moving one item.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct MoveRequest {
    /// Target position (1-based). Values past the end move the item last.
    #[schema(example = 1)]
    pub position: i32,
}

/// Request body for a full reorder.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct ReorderRequest {
    /// Every id in the collection, in the desired order.
    pub ids: Vec<i32>,
}

/// Request body for deleting several items at once.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct BulkDeleteRequest {
    pub ids: Vec<i32>,
}

/// Response for an insert into an ordered collection.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct Created<T> {
    pub item: T,
    /// Number of siblings whose position moved to make room.
    #[schema(example = 2)]
    pub shifted: usize,
}

/// Response for a delete from an ordered collection.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct Removed<T> {
    pub removed: Vec<i32>,
    /// The collection after renumbering.
    pub remaining: Vec<T>,
    /// Remote deletes that failed; the rows were removed regardless.
    pub remote_failures: Vec<RemoteFailure>,
}

pub fn validate_swap(req: &SwapRequest) -> Result<(), AppError> {
    if req.first_id == req.second_id {
        return Err(AppError::Validation(
            "Cannot swap an item with itself".into(),
        ));
    }
    Ok(())
}

pub fn validate_move(req: &MoveRequest) -> Result<(), AppError> {
    validate_position(Some(req.position))
}

pub fn validate_reorder(req: &ReorderRequest) -> Result<(), AppError> {
    validate_reorder_ids(&req.ids, "id")
}

pub fn validate_bulk_delete(req: &BulkDeleteRequest) -> Result<(), AppError> {
    validate_bulk_ids(&req.ids, "ids", MAX_BULK_IDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swapping_an_item_with_itself_is_rejected() {
        let req = SwapRequest {
            first_id: 4,
            second_id: 4,
        };
        assert!(matches!(validate_swap(&req), Err(AppError::Validation(_))));
    }

    #[test]
    fn move_requires_positive_position() {
        assert!(validate_move(&MoveRequest { position: 0 }).is_err());
        assert!(validate_move(&MoveRequest { position: 40 }).is_ok());
    }
}

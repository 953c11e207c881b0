use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An image held by the remote asset store.
///
/// Owners point at assets through nullable `*_id` columns. An asset row is
/// referenced by at most one owner field and has no back-pointer.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "asset")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub remote_id: String,
    pub url: String,
    pub width: i32,
    pub height: i32,
    pub format: String,
    pub byte_size: i64,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::assets::AssetOwner;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gallery_item")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub caption: Option<String>,

    pub image_id: Option<i32>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

impl AssetOwner for Entity {
    fn asset_columns() -> Vec<Column> {
        vec![Column::ImageId]
    }
}

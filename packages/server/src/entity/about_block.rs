use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::assets::AssetOwner;

/// A titled section of the about page.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "about_block")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub body: String, // in Markdown

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

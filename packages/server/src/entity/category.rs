use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::assets::AssetOwner;
use crate::ordering::{Positioned, Slot};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "category")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub position: i32,

    pub card_image_id: Option<i32>,
    pub details_image_id: Option<i32>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

impl AssetOwner for Entity {
    fn asset_columns() -> Vec<Column> {
        vec![Column::CardImageId, Column::DetailsImageId]
    }
}

impl Positioned for Entity {
    const LABEL: &'static str = "Category";

    fn id_column() -> Column {
        Column::Id
    }

    fn position_column() -> Column {
        Column::Position
    }

    fn slot(model: &Model) -> Slot {
        Slot {
            id: model.id,
            position: model.position,
        }
    }
}

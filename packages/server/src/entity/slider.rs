use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::assets::AssetOwner;
use crate::ordering::{Positioned, Slot};

/// Hero banner. One global sequence, capped by `ordering.capacity.slider`.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "slider")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,
    pub subtitle: Option<String>,
    pub link_url: Option<String>,
    pub position: i32,

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

impl Positioned for Entity {
    const LABEL: &'static str = "Slider";

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

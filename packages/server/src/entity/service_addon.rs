use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::parent::Parent;
use crate::ordering::{Positioned, Slot};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "service_addon")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub service_id: i32,
    pub name: String,
    pub position: i32,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

impl Positioned for Entity {
    const LABEL: &'static str = "Service add-on";

    fn id_column() -> Column {
        Column::Id
    }

    fn position_column() -> Column {
        Column::Position
    }

    fn scope_column() -> Option<Column> {
        Some(Column::ServiceId)
    }

    fn parent(owner: i32) -> Option<Parent> {
        Some(Parent::Service(owner))
    }

    fn slot(model: &Model) -> Slot {
        Slot {
            id: model.id,
            position: model.position,
        }
    }
}

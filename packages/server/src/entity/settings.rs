use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Site-wide settings. A single row with id [`SINGLETON_ID`].
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,

    pub site_name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,

    pub logo_id: Option<i32>,
    pub favicon_id: Option<i32>,
    pub meta_image_id: Option<i32>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

pub const SINGLETON_ID: i32 = 1;

impl ActiveModelBehavior for ActiveModel {}

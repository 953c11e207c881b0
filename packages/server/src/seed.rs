use chrono::Utc;
use sea_orm::sea_query::{Index, OnConflict, PostgresQueryBuilder};
use sea_orm::*;
use tracing::info;

use crate::entity::{
    about_page, category, category_addon, company_story, service, service_addon, settings, slider,
};

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support composite non-unique indexes,
/// so we create them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    let indexes = [
        (
            "idx_slider_position",
            Index::create()
                .if_not_exists()
                .name("idx_slider_position")
                .table(slider::Entity)
                .col(slider::Column::Position)
                .to_string(PostgresQueryBuilder),
        ),
        (
            "idx_category_position",
            Index::create()
                .if_not_exists()
                .name("idx_category_position")
                .table(category::Entity)
                .col(category::Column::Position)
                .to_string(PostgresQueryBuilder),
        ),
        // Scoped listing and shifting:
        // SELECT ... FROM category_addon WHERE category_id = ? ORDER BY position
        (
            "idx_category_addon_scope_position",
            Index::create()
                .if_not_exists()
                .name("idx_category_addon_scope_position")
                .table(category_addon::Entity)
                .col(category_addon::Column::CategoryId)
                .col(category_addon::Column::Position)
                .to_string(PostgresQueryBuilder),
        ),
        (
            "idx_service_addon_scope_position",
            Index::create()
                .if_not_exists()
                .name("idx_service_addon_scope_position")
                .table(service_addon::Entity)
                .col(service_addon::Column::ServiceId)
                .col(service_addon::Column::Position)
                .to_string(PostgresQueryBuilder),
        ),
        // Category delete checks for remaining services.
        (
            "idx_service_category",
            Index::create()
                .if_not_exists()
                .name("idx_service_category")
                .table(service::Entity)
                .col(service::Column::CategoryId)
                .to_string(PostgresQueryBuilder),
        ),
    ];

    for (name, stmt) in indexes {
        match db.execute_unprepared(&stmt).await {
            Ok(_) => info!("Ensured index {} exists", name),
            Err(e) => tracing::warn!("Failed to create index {}: {}", name, e),
        }
    }

    Ok(())
}

async fn insert_if_missing<A>(
    db: &DatabaseConnection,
    model: A,
    pk: <A::Entity as EntityTrait>::Column,
) -> Result<bool, DbErr>
where
    A: ActiveModelTrait + Send,
{
    let result = <A::Entity as EntityTrait>::insert(model)
        .on_conflict(OnConflict::column(pk).do_nothing().to_owned())
        .exec_without_returning(db)
        .await;

    match result {
        Ok(n) => Ok(n > 0),
        Err(DbErr::RecordNotInserted) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Create the settings, about page and company story rows if absent.
///
/// Their handlers only read and update; the rows always carry the
/// singleton id.
pub async fn ensure_singletons(db: &DatabaseConnection) -> Result<(), DbErr> {
    let now = Utc::now();
    let mut inserted = 0u32;

    let site = settings::ActiveModel {
        id: Set(settings::SINGLETON_ID),
        site_name: Set(String::new()),
        contact_email: Set(None),
        contact_phone: Set(None),
        address: Set(None),
        logo_id: Set(None),
        favicon_id: Set(None),
        meta_image_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    if insert_if_missing(db, site, settings::Column::Id).await? {
        inserted += 1;
    }

    let page = about_page::ActiveModel {
        id: Set(about_page::SINGLETON_ID),
        heading: Set(String::new()),
        subheading: Set(None),
        banner_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    if insert_if_missing(db, page, about_page::Column::Id).await? {
        inserted += 1;
    }

    let story = company_story::ActiveModel {
        id: Set(company_story::SINGLETON_ID),
        title: Set(String::new()),
        body: Set(String::new()),
        image_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    if insert_if_missing(db, story, company_story::Column::Id).await? {
        inserted += 1;
    }

    if inserted > 0 {
        info!("Seeded {} singleton rows", inserted);
    }

    Ok(())
}

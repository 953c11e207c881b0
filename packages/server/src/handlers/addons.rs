//! Add-on operations shared by categories and services.
//!
//! Both owners keep an ordered list of named add-ons per owner row. The
//! concrete handlers look the owner up for a quick 404 and delegate here;
//! writes that add rows check the owner again in their own transaction.

use chrono::Utc;
use sea_orm::{IntoActiveModel, Set};

use crate::entity::{category_addon, service_addon};
use crate::error::AppError;
use crate::models::addon::{
    AddonResponse, CreateAddonRequest, ReplaceAddonsRequest, dedupe_names, validate_create_addon,
    validate_replace_addons,
};
use crate::models::ordering::{Created, MoveRequest, SwapRequest, validate_move, validate_swap};
use crate::ordering::{OrderedRepository, Positioned, Scope};
use crate::state::AppState;

/// An ordered add-on table scoped by its owner.
pub trait Addon: Positioned {
    /// A new row carrying only its name; scope and position are filled in on insert.
    fn draft(name: String) -> Self::ActiveModel;

    fn view(model: Self::Model) -> AddonResponse;
}

impl Addon for category_addon::Entity {
    fn draft(name: String) -> category_addon::ActiveModel {
        category_addon::ActiveModel {
            name: Set(name),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
    }

    fn view(m: category_addon::Model) -> AddonResponse {
        AddonResponse {
            id: m.id,
            name: m.name,
            position: m.position,
        }
    }
}

impl Addon for service_addon::Entity {
    fn draft(name: String) -> service_addon::ActiveModel {
        service_addon::ActiveModel {
            name: Set(name),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
    }

    fn view(m: service_addon::Model) -> AddonResponse {
        AddonResponse {
            id: m.id,
            name: m.name,
            position: m.position,
        }
    }
}

fn views<E: Addon>(rows: Vec<E::Model>) -> Vec<AddonResponse> {
    rows.into_iter().map(E::view).collect()
}

pub async fn list<E>(state: &AppState, owner: i32) -> Result<Vec<AddonResponse>, AppError>
where
    E: Addon,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: Send + Sync,
{
    let rows = OrderedRepository::<E>::list(&state.db, Scope::Owner(owner)).await?;
    Ok(views::<E>(rows))
}

pub async fn insert<E>(
    state: &AppState,
    owner: i32,
    req: CreateAddonRequest,
) -> Result<Created<AddonResponse>, AppError>
where
    E: Addon,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: Send + Sync,
{
    validate_create_addon(&req)?;

    let inserted = OrderedRepository::<E>::new(state)
        .insert(
            Scope::Owner(owner),
            req.position,
            E::draft(req.name.trim().to_string()),
        )
        .await?;

    Ok(Created {
        item: E::view(inserted.model),
        shifted: inserted.shifted,
    })
}

/// Replace the owner's whole add-on set with `req.names`, in order.
pub async fn replace<E>(
    state: &AppState,
    owner: i32,
    req: ReplaceAddonsRequest,
) -> Result<Vec<AddonResponse>, AppError>
where
    E: Addon,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: Send + Sync,
{
    validate_replace_addons(&req)?;

    let drafts: Vec<E::ActiveModel> = dedupe_names(&req.names)
        .into_iter()
        .map(E::draft)
        .collect();
    let rows = OrderedRepository::<E>::new(state)
        .replace_all(Scope::Owner(owner), &drafts)
        .await?;
    Ok(views::<E>(rows))
}

pub async fn remove<E>(
    state: &AppState,
    owner: i32,
    id: i32,
) -> Result<Vec<AddonResponse>, AppError>
where
    E: Addon,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: Send + Sync,
{
    let rows = OrderedRepository::<E>::new(state)
        .delete(Scope::Owner(owner), id)
        .await?;
    Ok(views::<E>(rows))
}

pub async fn move_to<E>(
    state: &AppState,
    owner: i32,
    id: i32,
    req: MoveRequest,
) -> Result<Vec<AddonResponse>, AppError>
where
    E: Addon,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: Send + Sync,
{
    validate_move(&req)?;

    let rows = OrderedRepository::<E>::new(state)
        .move_to(Scope::Owner(owner), id, req.position)
        .await?;
    Ok(views::<E>(rows))
}

pub async fn swap<E>(
    state: &AppState,
    owner: i32,
    req: SwapRequest,
) -> Result<Vec<AddonResponse>, AppError>
where
    E: Addon,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: Send + Sync,
{
    validate_swap(&req)?;

    let rows = OrderedRepository::<E>::new(state)
        .swap(Scope::Owner(owner), req.first_id, req.second_id)
        .await?;
    Ok(views::<E>(rows))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use super::*;
    use crate::entity::category;
    use crate::test_support::{FakeStore, state_with};

    fn owner() -> category::Model {
        category::Model {
            id: 7,
            name: "Detailing".into(),
            description: None,
            position: 1,
            card_image_id: None,
            details_image_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn addon(id: i32, name: &str, position: i32) -> category_addon::Model {
        category_addon::Model {
            id,
            category_id: 7,
            name: name.to_string(),
            position,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn replace_dedupes_and_renumbers() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // owner, current set, then one row per insert, then the re-read
            .append_query_results([vec![owner()]])
            .append_query_results([vec![addon(1, "Old", 1)]])
            .append_query_results([vec![addon(2, "Wax", 1)]])
            .append_query_results([vec![addon(3, "Polish", 2)]])
            .append_query_results([vec![addon(2, "Wax", 1), addon(3, "Polish", 2)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let state = state_with(db, Arc::new(FakeStore::new()));

        let req = ReplaceAddonsRequest {
            names: vec!["Wax".into(), " Polish ".into(), "Wax".into()],
        };
        let rows = replace::<category_addon::Entity>(&state, 7, req)
            .await
            .unwrap();

        assert_eq!(
            rows.iter().map(|r| (r.name.as_str(), r.position)).collect::<Vec<_>>(),
            vec![("Wax", 1), ("Polish", 2)]
        );

        let log = format!("{:?}", state.db.into_transaction_log());
        assert_eq!(log.matches("INSERT").count(), 2);
        assert_eq!(log.matches("DELETE").count(), 1);
    }

    #[tokio::test]
    async fn empty_replace_clears_the_set() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![owner()]])
            .append_query_results([vec![addon(1, "Wax", 1), addon(2, "Polish", 2)]])
            .append_query_results([Vec::<category_addon::Model>::new()])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 2,
            }])
            .into_connection();
        let state = state_with(db, Arc::new(FakeStore::new()));

        let rows = replace::<category_addon::Entity>(
            &state,
            7,
            ReplaceAddonsRequest { names: Vec::new() },
        )
        .await
        .unwrap();

        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn replace_for_a_vanished_owner_writes_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<category::Model>::new()])
            .into_connection();
        let state = state_with(db, Arc::new(FakeStore::new()));

        let req = ReplaceAddonsRequest {
            names: vec!["Wax".into()],
        };
        let err = replace::<category_addon::Entity>(&state, 7, req)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        let log = format!("{:?}", state.db.into_transaction_log());
        assert!(!log.contains("DELETE"));
        assert!(!log.contains("INSERT"));
    }
}

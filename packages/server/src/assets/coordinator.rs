//! Keeps owner rows, asset rows and remote objects consistent.
//!
//! Replacing or clearing an asset is strict: the previous remote object is
//! deleted before any transaction opens, and a failed delete aborts the
//! command with the owner untouched. Destroying an owner is lenient: remote
//! deletes are attempted and awaited, failures are logged and reported, and
//! the rows are removed regardless.
//!
//! Whenever a transaction fails after remote objects are already gone, the
//! rows that pointed at them are detached in a compensating transaction.

use common::storage::AssetStore;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, ModelTrait,
    QueryFilter, Value,
};
use tracing::{debug, error, warn};

use super::records;
use crate::database::{TxnProfile, begin, bounded, with_retry};
use crate::entity::asset;
use crate::entity::parent::Parent;
use crate::error::AppError;
use crate::models::asset::{AssetMetadata, RemoteFailure, validate_metadata};
use crate::ordering::{Inserted, OrderedRepository, Positioned, Scope};
use crate::state::AppState;

/// An entity whose rows reference asset rows through nullable id columns.
pub trait AssetOwner: EntityTrait {
    fn asset_columns() -> Vec<Self::Column>;

    /// Asset ids `model` references.
    fn asset_ids(model: &Self::Model) -> Vec<i32> {
        Self::asset_columns()
            .into_iter()
            .filter_map(|column| match model.get(column) {
                Value::Int(Some(id)) => Some(id),
                _ => None,
            })
            .collect()
    }
}

/// What a command does to one asset field of its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetAction {
    Keep,
    Attach(AssetMetadata),
    Replace {
        previous: asset::Model,
        next: AssetMetadata,
    },
    Detach(asset::Model),
}

impl AssetAction {
    /// Action for a create request, where there is nothing to replace.
    pub fn attach(requested: Option<AssetMetadata>) -> Self {
        requested.map_or(AssetAction::Keep, AssetAction::Attach)
    }

    /// Action for a PATCH-style field: absent keeps, `null` clears, metadata sets.
    ///
    /// Metadata naming the object already attached is a no-op.
    pub fn plan(current: Option<asset::Model>, requested: Option<Option<AssetMetadata>>) -> Self {
        match (current, requested) {
            (_, None) | (None, Some(None)) => AssetAction::Keep,
            (Some(previous), Some(None)) => AssetAction::Detach(previous),
            (None, Some(Some(next))) => AssetAction::Attach(next),
            (Some(previous), Some(Some(next)))
                if next.matches(&previous) || next.remote_id == previous.remote_id =>
            {
                AssetAction::Keep
            }
            (Some(previous), Some(Some(next))) => AssetAction::Replace { previous, next },
        }
    }

    /// The asset this action gives up.
    pub fn released(&self) -> Option<&asset::Model> {
        match self {
            AssetAction::Replace { previous, .. } | AssetAction::Detach(previous) => Some(previous),
            AssetAction::Keep | AssetAction::Attach(_) => None,
        }
    }

    /// The metadata this action stores.
    pub fn attached(&self) -> Option<&AssetMetadata> {
        match self {
            AssetAction::Attach(next) | AssetAction::Replace { next, .. } => Some(next),
            AssetAction::Keep | AssetAction::Detach(_) => None,
        }
    }
}

/// Asset actions for the fields of one owner row of entity `E`.
#[derive(Debug)]
pub struct AssetChanges<E: EntityTrait> {
    fields: Vec<(E::Column, AssetAction)>,
    parent: Option<Parent>,
}

impl<E: EntityTrait> Default for AssetChanges<E> {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            parent: None,
        }
    }
}

impl<E: EntityTrait> AssetChanges<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, column: E::Column, action: AssetAction) -> Self {
        self.fields.push((column, action));
        self
    }

    /// Require `parent` to exist when the owner is written.
    pub fn under(mut self, parent: Option<Parent>) -> Self {
        self.parent = parent;
        self
    }

    pub fn is_noop(&self) -> bool {
        self.fields
            .iter()
            .all(|(_, action)| *action == AssetAction::Keep)
    }

    pub fn actions(&self) -> impl Iterator<Item = &AssetAction> {
        self.fields.iter().map(|(_, action)| action)
    }

    /// Columns whose current asset this change gives up.
    fn released(&self) -> Vec<(E::Column, &asset::Model)> {
        self.fields
            .iter()
            .filter_map(|(column, action)| action.released().map(|previous| (*column, previous)))
            .collect()
    }

    /// Create and delete asset rows and point `owner`'s columns at the result.
    ///
    /// Runs inside the owner's transaction, after [`release_strict`] succeeded.
    pub async fn apply<C: ConnectionTrait>(
        &self,
        conn: &C,
        owner: &mut E::ActiveModel,
    ) -> Result<(), AppError> {
        if let Some(parent) = self.parent {
            parent.ensure(conn).await?;
        }
        for (column, action) in &self.fields {
            match action {
                AssetAction::Keep => {}
                AssetAction::Attach(next) => {
                    let row = records::create(conn, next).await?;
                    owner.set(*column, Some(row.id).into());
                }
                AssetAction::Replace { previous, next } => {
                    let row = records::create(conn, next).await?;
                    owner.set(*column, Some(row.id).into());
                    records::delete_ids(conn, [previous.id]).await?;
                }
                AssetAction::Detach(previous) => {
                    owner.set(*column, Option::<i32>::None.into());
                    records::delete_ids(conn, [previous.id]).await?;
                }
            }
        }
        Ok(())
    }
}

/// Everything [`AssetChanges::apply`] can reject, checked without writing.
async fn ensure_attachable<E: EntityTrait, C: ConnectionTrait>(
    conn: &C,
    changes: &AssetChanges<E>,
) -> Result<(), AppError> {
    if let Some(parent) = changes.parent {
        parent.ensure(conn).await?;
    }
    for next in changes.actions().filter_map(AssetAction::attached) {
        validate_metadata(next)?;
        if records::find_by_remote_id(conn, &next.remote_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "Asset '{}' is already attached",
                next.remote_id
            )));
        }
    }
    Ok(())
}

/// Delete the remote objects an update gives up. No transaction is open yet.
///
/// The new metadata and parent are checked first, so a request the owner
/// transaction would refuse deletes nothing. When a later field fails after
/// earlier ones were deleted remotely, those earlier fields are detached in a
/// compensating transaction so no row keeps pointing at a missing object.
/// The error is returned either way.
pub async fn release_strict<E: EntityTrait>(
    state: &AppState,
    id_column: E::Column,
    owner_id: i32,
    changes: &AssetChanges<E>,
) -> Result<(), AppError> {
    let released = changes.released();
    if released.is_empty() {
        return Ok(());
    }
    ensure_attachable(&state.db, changes).await?;

    let mut deleted: Vec<(E::Column, &asset::Model)> = Vec::new();
    for (column, previous) in released {
        match state.assets.delete(&previous.remote_id).await {
            Ok(outcome) => {
                if !outcome.found {
                    debug!(remote_id = %previous.remote_id, "Remote object was already gone");
                }
                deleted.push((column, previous));
            }
            Err(e) => {
                warn!(
                    remote_id = %previous.remote_id,
                    owner_id,
                    error = %e,
                    "Strict remote delete failed"
                );
                if !deleted.is_empty() {
                    detach_released::<E>(state, id_column, owner_id, &deleted).await?;
                }
                return Err(AppError::RemoteAsset(format!(
                    "Failed to delete '{}': {e}",
                    previous.remote_id
                )));
            }
        }
    }
    Ok(())
}

async fn detach_released<E: EntityTrait>(
    state: &AppState,
    id_column: E::Column,
    owner_id: i32,
    released: &[(E::Column, &asset::Model)],
) -> Result<(), AppError> {
    let settings = &state.config.transactions;
    let profile = TxnProfile::AssetReplace;

    with_retry(profile, settings, move || async move {
        let txn = begin(&state.db, profile).await?;
        bounded(profile, settings, async move {
            let mut update = E::update_many().filter(id_column.eq(owner_id));
            for (column, _) in released {
                update = update.col_expr(*column, Expr::value(Option::<i32>::None));
            }
            update.exec(&txn).await?;
            records::delete_ids(&txn, released.iter().map(|(_, a)| a.id)).await?;
            txn.commit().await?;
            Ok(())
        })
        .await
    })
    .await?;

    warn!(
        owner_id,
        detached = released.len(),
        "Detached assets whose remote objects were deleted before a later failure"
    );
    Ok(())
}

/// Best-effort remote delete for owners being destroyed.
pub async fn release_lenient(store: &dyn AssetStore, assets: &[asset::Model]) -> Vec<RemoteFailure> {
    let mut failures = Vec::new();
    for asset in assets {
        if let Err(e) = store.delete(&asset.remote_id).await {
            warn!(
                remote_id = %asset.remote_id,
                error = %e,
                "Remote delete failed, removing the row anyway"
            );
            failures.push(RemoteFailure {
                remote_id: asset.remote_id.clone(),
                message: e.to_string(),
            });
        }
    }
    failures
}

/// Insert a new owner together with the asset rows it attaches.
pub async fn insert_owner<E>(
    state: &AppState,
    changes: &AssetChanges<E>,
    owner: E::ActiveModel,
) -> Result<E::Model, AppError>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: Send + Sync,
{
    let settings = &state.config.transactions;
    let profile = TxnProfile::AssetReplace;
    let owner = &owner;

    with_retry(profile, settings, move || async move {
        let txn = begin(&state.db, profile).await?;
        bounded(profile, settings, async move {
            let mut active = owner.clone();
            changes.apply(&txn, &mut active).await?;
            let model = active.insert(&txn).await?;
            txn.commit().await?;
            Ok(model)
        })
        .await
    })
    .await
}

/// Persist an owner update together with its asset rows.
///
/// Call [`release_strict`] first. If the transaction fails, the fields whose
/// remote objects that call deleted are detached before the error returns.
pub async fn update_owner<E>(
    state: &AppState,
    id_column: E::Column,
    owner_id: i32,
    changes: &AssetChanges<E>,
    owner: E::ActiveModel,
) -> Result<E::Model, AppError>
where
    E: EntityTrait,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: Send + Sync,
{
    let settings = &state.config.transactions;
    let profile = TxnProfile::AssetReplace;
    let owner = &owner;

    let result = with_retry(profile, settings, move || async move {
        let txn = begin(&state.db, profile).await?;
        bounded(profile, settings, async move {
            let mut active = owner.clone();
            changes.apply(&txn, &mut active).await?;
            let model = active.update(&txn).await?;
            txn.commit().await?;
            Ok(model)
        })
        .await
    })
    .await;

    if let Err(e) = &result {
        let released = changes.released();
        if !released.is_empty() {
            warn!(owner_id, error = ?e, "Owner update failed after remote deletes");
            if let Err(detach) = detach_released::<E>(state, id_column, owner_id, &released).await {
                error!(owner_id, error = ?detach, "Failed to detach released assets");
            }
        }
    }
    result
}

/// Asset rows the owners in `ids` reference as seen by `conn`, minus `known`.
///
/// Destroy commands read assets before their transaction opens; an update
/// committed in between shows up here.
pub async fn late_assets<E: AssetOwner, C: ConnectionTrait>(
    conn: &C,
    id_column: E::Column,
    ids: &[i32],
    known: &[asset::Model],
) -> Result<Vec<asset::Model>, AppError> {
    let late: Vec<i32> = E::find()
        .filter(id_column.is_in(ids.iter().copied()))
        .all(conn)
        .await?
        .iter()
        .flat_map(E::asset_ids)
        .filter(|id| !known.iter().any(|a| a.id == *id))
        .collect();
    records::find_many(conn, late).await
}

/// Pass a destroy transaction's result through. On failure, the assets whose
/// remote objects were deleted beforehand are detached from every row of `E`
/// still pointing at them.
pub async fn settle_destroy<E: AssetOwner, T>(
    state: &AppState,
    released: &[asset::Model],
    failures: &[RemoteFailure],
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    let err = match result {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    let gone: Vec<i32> = released
        .iter()
        .filter(|a| !failures.iter().any(|f| f.remote_id == a.remote_id))
        .map(|a| a.id)
        .collect();
    if !gone.is_empty() {
        warn!(error = ?err, "Delete failed after remote deletes");
        if let Err(e) = unlink::<E>(state, &gone).await {
            error!(error = ?e, "Failed to unlink deleted assets");
        }
    }
    Err(err)
}

async fn unlink<E: AssetOwner>(state: &AppState, asset_ids: &[i32]) -> Result<(), AppError> {
    let settings = &state.config.transactions;
    let profile = TxnProfile::AssetReplace;

    with_retry(profile, settings, move || async move {
        let txn = begin(&state.db, profile).await?;
        bounded(profile, settings, async move {
            for column in E::asset_columns() {
                E::update_many()
                    .col_expr(column, Expr::value(Option::<i32>::None))
                    .filter(column.is_in(asset_ids.iter().copied()))
                    .exec(&txn)
                    .await?;
            }
            records::delete_ids(&txn, asset_ids.iter().copied()).await?;
            txn.commit().await?;
            Ok(())
        })
        .await
    })
    .await?;

    warn!(
        unlinked = asset_ids.len(),
        "Unlinked assets whose remote objects were deleted before an aborted delete"
    );
    Ok(())
}

fn destroy_profile(ids: &[i32]) -> TxnProfile {
    if ids.len() > 1 {
        TxnProfile::Bulk
    } else {
        TxnProfile::AssetReplace
    }
}

/// Delete unordered owners and their asset rows, after a lenient remote
/// release.
pub async fn destroy_owners<E: AssetOwner>(
    state: &AppState,
    id_column: E::Column,
    ids: &[i32],
    assets: &[asset::Model],
) -> Result<Vec<RemoteFailure>, AppError> {
    let mut failures = release_lenient(&*state.assets, assets).await;

    let settings = &state.config.transactions;
    let profile = destroy_profile(ids);

    let result = with_retry(profile, settings, move || async move {
        let txn = begin(&state.db, profile).await?;
        bounded(profile, settings, async move {
            let late = late_assets::<E, _>(&txn, id_column, ids, assets).await?;
            E::delete_many()
                .filter(id_column.is_in(ids.iter().copied()))
                .exec(&txn)
                .await?;
            records::delete_ids(&txn, assets.iter().chain(&late).map(|a| a.id)).await?;
            txn.commit().await?;
            Ok(late)
        })
        .await
    })
    .await;

    let late = settle_destroy::<E, _>(state, assets, &failures, result).await?;
    failures.extend(release_lenient(&*state.assets, &late).await);
    Ok(failures)
}

/// Insert an ordered owner and the asset rows it attaches in one transaction.
pub async fn insert_ordered<E>(
    state: &AppState,
    repo: &OrderedRepository<'_, E>,
    scope: Scope,
    position: Option<i32>,
    changes: &AssetChanges<E>,
    owner: E::ActiveModel,
) -> Result<Inserted<E::Model>, AppError>
where
    E: Positioned,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: Send + Sync,
{
    let settings = &state.config.transactions;
    let profile = if changes.is_noop() {
        TxnProfile::Reorder
    } else {
        TxnProfile::AssetReplace
    };
    let owner = &owner;

    with_retry(profile, settings, move || async move {
        let txn = begin(&state.db, profile).await?;
        bounded(profile, settings, async move {
            let mut active = owner.clone();
            changes.apply(&txn, &mut active).await?;
            let inserted = repo.insert_in(&txn, scope, position, active).await?;
            txn.commit().await?;
            Ok(inserted)
        })
        .await
    })
    .await
}

/// Delete ordered owners and their asset rows, closing the gaps, after a
/// lenient remote release. Returns the renumbered scope.
pub async fn destroy_ordered<E>(
    state: &AppState,
    repo: &OrderedRepository<'_, E>,
    scope: Scope,
    ids: &[i32],
    assets: &[asset::Model],
) -> Result<(Vec<E::Model>, Vec<RemoteFailure>), AppError>
where
    E: Positioned + AssetOwner,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: Send + Sync,
{
    let mut failures = release_lenient(&*state.assets, assets).await;

    let settings = &state.config.transactions;
    let profile = destroy_profile(ids);

    let result = with_retry(profile, settings, move || async move {
        let txn = begin(&state.db, profile).await?;
        bounded(profile, settings, async move {
            let late = late_assets::<E, _>(&txn, E::id_column(), ids, assets).await?;
            let remaining = repo.bulk_delete_in(&txn, scope, ids).await?;
            records::delete_ids(&txn, assets.iter().chain(&late).map(|a| a.id)).await?;
            txn.commit().await?;
            Ok((remaining, late))
        })
        .await
    })
    .await;

    let (remaining, late) = settle_destroy::<E, _>(state, assets, &failures, result).await?;
    failures.extend(release_lenient(&*state.assets, &late).await);
    Ok((remaining, failures))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use super::*;
    use crate::entity::{category, slider, testimonial};
    use crate::test_support::{FakeStore, asset_row, meta, state_with};

    #[test]
    fn absent_field_keeps_current_asset() {
        let action = AssetAction::plan(Some(asset_row(1, "people/a.png")), None);
        assert_eq!(action, AssetAction::Keep);
    }

    #[test]
    fn null_clears_only_when_something_is_attached() {
        let previous = asset_row(1, "people/a.png");
        assert_eq!(
            AssetAction::plan(Some(previous.clone()), Some(None)),
            AssetAction::Detach(previous)
        );
        assert_eq!(AssetAction::plan(None, Some(None)), AssetAction::Keep);
    }

    #[test]
    fn fresh_metadata_attaches_or_replaces() {
        assert_eq!(
            AssetAction::plan(None, Some(Some(meta("people/b.png")))),
            AssetAction::Attach(meta("people/b.png"))
        );

        let previous = asset_row(1, "people/a.png");
        assert_eq!(
            AssetAction::plan(Some(previous.clone()), Some(Some(meta("people/b.png")))),
            AssetAction::Replace {
                previous,
                next: meta("people/b.png"),
            }
        );
    }

    #[test]
    fn identical_metadata_is_a_noop() {
        let previous = asset_row(1, "people/a.png");
        let same = meta("people/a.png");
        assert!(same.matches(&previous));
        assert_eq!(
            AssetAction::plan(Some(previous), Some(Some(same))),
            AssetAction::Keep
        );
    }

    #[tokio::test]
    async fn lenient_release_attempts_every_object() {
        let store = FakeStore::failing_on(&["gallery/b.png"]);
        let assets = vec![
            asset_row(1, "gallery/a.png"),
            asset_row(2, "gallery/b.png"),
            asset_row(3, "gallery/c.png"),
        ];

        let failures = release_lenient(&store, &assets).await;

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].remote_id, "gallery/b.png");
        assert_eq!(
            store.attempts(),
            vec!["gallery/a.png", "gallery/b.png", "gallery/c.png"]
        );
    }

    #[tokio::test]
    async fn strict_release_failure_touches_no_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<asset::Model>::new()])
            .into_connection();
        let store = Arc::new(FakeStore::failing_on(&["people/a.png"]));
        let state = state_with(db, store.clone());

        let changes = AssetChanges::<testimonial::Entity>::new().field(
            testimonial::Column::ImageId,
            AssetAction::plan(
                Some(asset_row(1, "people/a.png")),
                Some(Some(meta("people/b.png"))),
            ),
        );

        let err = release_strict(&state, testimonial::Column::Id, 5, &changes)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RemoteAsset(_)));
        let log = format!("{:?}", state.db.into_transaction_log());
        assert!(!log.contains("UPDATE"));
        assert!(!log.contains("DELETE"));
    }

    #[tokio::test]
    async fn partial_strict_release_detaches_what_was_deleted() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();
        let store = Arc::new(FakeStore::failing_on(&["categories/details.png"]));
        let state = state_with(db, store.clone());

        let changes = AssetChanges::<category::Entity>::new()
            .field(
                category::Column::CardImageId,
                AssetAction::Detach(asset_row(1, "categories/card.png")),
            )
            .field(
                category::Column::DetailsImageId,
                AssetAction::Detach(asset_row(2, "categories/details.png")),
            );

        let err = release_strict(&state, category::Column::Id, 9, &changes)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RemoteAsset(_)));
        assert_eq!(
            store.attempts(),
            vec!["categories/card.png", "categories/details.png"]
        );

        let log = format!("{:?}", state.db.into_transaction_log());
        assert_eq!(log.matches("UPDATE").count(), 1);
        assert!(log.contains("card_image_id"));
        assert!(!log.contains("details_image_id"));
        assert_eq!(log.matches("DELETE").count(), 1);
    }

    #[tokio::test]
    async fn replacement_already_attached_elsewhere_deletes_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![asset_row(40, "people/taken.png")]])
            .into_connection();
        let store = Arc::new(FakeStore::new());
        let state = state_with(db, store.clone());

        let changes = AssetChanges::<testimonial::Entity>::new().field(
            testimonial::Column::ImageId,
            AssetAction::plan(
                Some(asset_row(1, "people/a.png")),
                Some(Some(meta("people/taken.png"))),
            ),
        );

        let err = release_strict(&state, testimonial::Column::Id, 5, &changes)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert!(store.attempts().is_empty());
    }

    #[tokio::test]
    async fn out_of_range_replacement_deletes_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let store = Arc::new(FakeStore::new());
        let state = state_with(db, store.clone());

        let mut huge = meta("people/b.png");
        huge.byte_size = u64::MAX;
        let changes = AssetChanges::<testimonial::Entity>::new().field(
            testimonial::Column::ImageId,
            AssetAction::plan(Some(asset_row(1, "people/a.png")), Some(Some(huge))),
        );

        let err = release_strict(&state, testimonial::Column::Id, 5, &changes)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.attempts().is_empty());
        assert!(state.db.into_transaction_log().is_empty());
    }

    #[test]
    fn asset_ids_skip_empty_columns() {
        let row = category::Model {
            id: 3,
            name: "Detailing".into(),
            description: None,
            position: 1,
            card_image_id: None,
            details_image_id: Some(12),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert_eq!(category::Entity::asset_ids(&row), vec![12]);
    }

    #[tokio::test]
    async fn late_assets_are_those_attached_since_the_first_read() {
        let now = chrono::Utc::now();
        let banner = slider::Model {
            id: 1,
            title: "Spring".into(),
            subtitle: None,
            link_url: None,
            position: 1,
            image_id: Some(11),
            created_at: now,
            updated_at: now,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![banner]])
            .append_query_results([vec![asset_row(11, "sliders/b.png")]])
            .into_connection();

        let known = [asset_row(10, "sliders/a.png")];
        let late = late_assets::<slider::Entity, _>(&db, slider::Column::Id, &[1], &known)
            .await
            .unwrap();

        assert_eq!(late.len(), 1);
        assert_eq!(late[0].remote_id, "sliders/b.png");
    }

    #[tokio::test]
    async fn late_assets_already_known_need_no_lookup() {
        let now = chrono::Utc::now();
        let banner = slider::Model {
            id: 1,
            title: "Spring".into(),
            subtitle: None,
            link_url: None,
            position: 1,
            image_id: Some(10),
            created_at: now,
            updated_at: now,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![banner]])
            .into_connection();

        let known = [asset_row(10, "sliders/a.png")];
        let late = late_assets::<slider::Entity, _>(&db, slider::Column::Id, &[1], &known)
            .await
            .unwrap();

        assert!(late.is_empty());
        assert_eq!(db.into_transaction_log().len(), 1);
    }
}

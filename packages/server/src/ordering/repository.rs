use std::marker::PhantomData;

use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityName, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Select,
};
use tracing::debug;

use super::ledger::{self, MutationPlan, PlanError, PositionView, Slot};
use crate::config::TransactionConfig;
use crate::database::{TxnProfile, begin, bounded, with_retry};
use crate::entity::parent::Parent;
use crate::error::AppError;
use crate::state::AppState;

/// Which sequence a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// One sequence for the whole table.
    Global,
    /// One sequence per owning row.
    Owner(i32),
}

/// An entity whose rows carry a dense `position` within a scope.
pub trait Positioned: EntityTrait {
    /// Name used in error messages.
    const LABEL: &'static str;

    fn id_column() -> Self::Column;
    fn position_column() -> Self::Column;

    /// Column holding the owner id, for per-owner sequences.
    fn scope_column() -> Option<Self::Column> {
        None
    }

    /// Row that owns scope `owner`. Checked in the writing transaction
    /// before rows are added to the scope.
    fn parent(_owner: i32) -> Option<Parent> {
        None
    }

    fn slot(model: &Self::Model) -> Slot;
}

/// Result of an insert: the new row, how many siblings moved, and the
/// refreshed scope.
#[derive(Debug)]
pub struct Inserted<M> {
    pub model: M,
    pub shifted: usize,
    pub siblings: Vec<M>,
}

/// Applies ledger plans to one ordered table.
///
/// Every operation reads its scope inside the transaction, plans against that
/// snapshot, writes the shifts, then re-reads the scope and refuses to commit
/// unless positions are still `1..=N`.
pub struct OrderedRepository<'a, E> {
    db: &'a DatabaseConnection,
    settings: &'a TransactionConfig,
    capacity: Option<usize>,
    entity: PhantomData<E>,
}

impl<'a, E> OrderedRepository<'a, E>
where
    E: Positioned,
    E::Model: IntoActiveModel<E::ActiveModel> + Sync,
    E::ActiveModel: Send + Sync,
{
    pub fn new(state: &'a AppState) -> Self {
        let capacity = state
            .config
            .ordering
            .capacity_for(E::default().table_name());
        Self::with_capacity(&state.db, &state.config.transactions, capacity)
    }

    pub fn with_capacity(
        db: &'a DatabaseConnection,
        settings: &'a TransactionConfig,
        capacity: Option<usize>,
    ) -> Self {
        Self {
            db,
            settings,
            capacity,
            entity: PhantomData,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn scoped(scope: Scope) -> Result<Select<E>, AppError> {
        match (scope, E::scope_column()) {
            (Scope::Global, None) => Ok(E::find()),
            (Scope::Owner(owner), Some(column)) => Ok(E::find().filter(column.eq(owner))),
            _ => Err(AppError::Internal(format!(
                "{} does not support {:?}",
                E::LABEL,
                scope
            ))),
        }
    }

    /// Rows of `scope` in position order.
    pub async fn list<C: ConnectionTrait>(conn: &C, scope: Scope) -> Result<Vec<E::Model>, AppError> {
        Ok(Self::scoped(scope)?
            .order_by_asc(E::position_column())
            .order_by_asc(E::id_column())
            .all(conn)
            .await?)
    }

    /// A row by id, only if it belongs to `scope`.
    pub async fn find<C: ConnectionTrait>(
        conn: &C,
        scope: Scope,
        id: i32,
    ) -> Result<E::Model, AppError> {
        Self::scoped(scope)?
            .filter(E::id_column().eq(id))
            .one(conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {id} not found", E::LABEL)))
    }

    async fn view<C: ConnectionTrait>(conn: &C, scope: Scope) -> Result<PositionView, AppError> {
        let rows = Self::list(conn, scope).await?;
        Ok(PositionView::new(rows.iter().map(E::slot).collect()))
    }

    fn plan_error(err: PlanError) -> AppError {
        match err {
            PlanError::CapacityExceeded { limit, .. } => AppError::CapacityExceeded {
                scope: E::LABEL.to_string(),
                limit,
            },
            PlanError::NotFound(id) => AppError::NotFound(format!("{} {id} not found", E::LABEL)),
            other => other.into(),
        }
    }

    /// One `UPDATE ... SET position = position + delta WHERE id IN (...)`
    /// per distinct delta.
    async fn write_shifts<C: ConnectionTrait>(conn: &C, plan: &MutationPlan) -> Result<(), AppError> {
        for (delta, ids) in plan.shifts_by_delta() {
            E::update_many()
                .col_expr(
                    E::position_column(),
                    Expr::col((E::default(), E::position_column())).add(delta),
                )
                .filter(E::id_column().is_in(ids))
                .exec(conn)
                .await?;
        }
        Ok(())
    }

    async fn remove_rows<C: ConnectionTrait>(conn: &C, ids: &[i32]) -> Result<(), AppError> {
        if !ids.is_empty() {
            E::delete_many()
                .filter(E::id_column().is_in(ids.iter().copied()))
                .exec(conn)
                .await?;
        }
        Ok(())
    }

    /// Re-read the scope and verify it is dense.
    async fn settle<C: ConnectionTrait>(conn: &C, scope: Scope) -> Result<Vec<E::Model>, AppError> {
        let rows = Self::list(conn, scope).await?;
        let view = PositionView::new(rows.iter().map(E::slot).collect());
        if let Err(e) = view.check_dense() {
            return Err(AppError::InvariantViolation(format!(
                "{} {:?}: {e}",
                E::LABEL,
                scope
            )));
        }
        Ok(rows)
    }

    async fn ensure_parent<C: ConnectionTrait>(conn: &C, scope: Scope) -> Result<(), AppError> {
        if let Scope::Owner(owner) = scope
            && let Some(parent) = E::parent(owner)
        {
            parent.ensure(conn).await?;
        }
        Ok(())
    }

    fn place(payload: &mut E::ActiveModel, scope: Scope, position: i32) {
        payload.set(E::position_column(), position.into());
        if let (Scope::Owner(owner), Some(column)) = (scope, E::scope_column()) {
            payload.set(column, owner.into());
        }
    }

    /// Insert inside the caller's transaction.
    pub async fn insert_in(
        &self,
        txn: &DatabaseTransaction,
        scope: Scope,
        position: Option<i32>,
        mut payload: E::ActiveModel,
    ) -> Result<Inserted<E::Model>, AppError> {
        Self::ensure_parent(txn, scope).await?;
        let view = Self::view(txn, scope).await?;
        let plan = ledger::plan_insert(&view, position, self.capacity).map_err(Self::plan_error)?;
        let assigned = plan
            .assigned
            .ok_or_else(|| AppError::Internal("insert plan without a position".into()))?;

        Self::write_shifts(txn, &plan).await?;
        Self::place(&mut payload, scope, assigned);
        let model = payload.insert(txn).await?;
        let siblings = Self::settle(txn, scope).await?;

        debug!(
            entity = E::LABEL,
            position = assigned,
            shifted = plan.shifts.len(),
            "Inserted ordered row"
        );
        Ok(Inserted {
            model,
            shifted: plan.shifts.len(),
            siblings,
        })
    }

    /// Delete inside the caller's transaction, closing the gap.
    pub async fn delete_in(
        &self,
        txn: &DatabaseTransaction,
        scope: Scope,
        id: i32,
    ) -> Result<Vec<E::Model>, AppError> {
        let view = Self::view(txn, scope).await?;
        let plan = ledger::plan_delete(&view, id).map_err(Self::plan_error)?;

        Self::remove_rows(txn, &plan.removed).await?;
        Self::write_shifts(txn, &plan).await?;
        Self::settle(txn, scope).await
    }

    /// Delete several rows inside the caller's transaction.
    pub async fn bulk_delete_in(
        &self,
        txn: &DatabaseTransaction,
        scope: Scope,
        ids: &[i32],
    ) -> Result<Vec<E::Model>, AppError> {
        let view = Self::view(txn, scope).await?;
        let plan = ledger::plan_bulk_delete(&view, ids).map_err(Self::plan_error)?;

        Self::remove_rows(txn, &plan.removed).await?;
        Self::write_shifts(txn, &plan).await?;
        Self::settle(txn, scope).await
    }

    async fn move_in(
        &self,
        txn: &DatabaseTransaction,
        scope: Scope,
        id: i32,
        position: i32,
    ) -> Result<Vec<E::Model>, AppError> {
        let view = Self::view(txn, scope).await?;
        let plan = ledger::plan_move(&view, id, position).map_err(Self::plan_error)?;

        Self::write_shifts(txn, &plan).await?;
        Self::settle(txn, scope).await
    }

    async fn swap_in(
        &self,
        txn: &DatabaseTransaction,
        scope: Scope,
        a: i32,
        b: i32,
    ) -> Result<Vec<E::Model>, AppError> {
        let view = Self::view(txn, scope).await?;
        let plan = ledger::plan_swap(&view, a, b).map_err(Self::plan_error)?;

        Self::write_shifts(txn, &plan).await?;
        Self::settle(txn, scope).await
    }

    async fn reorder_in(
        &self,
        txn: &DatabaseTransaction,
        scope: Scope,
        ids: &[i32],
    ) -> Result<Vec<E::Model>, AppError> {
        let view = Self::view(txn, scope).await?;
        let plan = ledger::plan_reorder(&view, ids).map_err(Self::plan_error)?;

        Self::write_shifts(txn, &plan).await?;
        Self::settle(txn, scope).await
    }

    /// Replace the whole scope with `payloads`, positioned `1..=M` in order.
    pub async fn replace_all_in(
        &self,
        txn: &DatabaseTransaction,
        scope: Scope,
        payloads: &[E::ActiveModel],
    ) -> Result<Vec<E::Model>, AppError> {
        if let Some(limit) = self.capacity
            && payloads.len() > limit
        {
            return Err(AppError::CapacityExceeded {
                scope: E::LABEL.to_string(),
                limit,
            });
        }

        Self::ensure_parent(txn, scope).await?;
        let view = Self::view(txn, scope).await?;
        let plan = ledger::plan_bulk_delete(&view, &view.ids()).map_err(Self::plan_error)?;
        Self::remove_rows(txn, &plan.removed).await?;

        for (payload, position) in payloads.iter().zip(1..) {
            let mut payload = payload.clone();
            Self::place(&mut payload, scope, position);
            payload.insert(txn).await?;
        }

        Self::settle(txn, scope).await
    }

    pub async fn insert(
        &self,
        scope: Scope,
        position: Option<i32>,
        payload: E::ActiveModel,
    ) -> Result<Inserted<E::Model>, AppError> {
        let payload = &payload;
        let profile = TxnProfile::Reorder;
        with_retry(profile, self.settings, move || async move {
            let txn = begin(self.db, profile).await?;
            bounded(profile, self.settings, async move {
                let inserted = self.insert_in(&txn, scope, position, payload.clone()).await?;
                txn.commit().await?;
                Ok(inserted)
            })
            .await
        })
        .await
    }

    pub async fn delete(&self, scope: Scope, id: i32) -> Result<Vec<E::Model>, AppError> {
        let profile = TxnProfile::Reorder;
        with_retry(profile, self.settings, move || async move {
            let txn = begin(self.db, profile).await?;
            bounded(profile, self.settings, async move {
                let remaining = self.delete_in(&txn, scope, id).await?;
                txn.commit().await?;
                Ok(remaining)
            })
            .await
        })
        .await
    }

    pub async fn move_to(
        &self,
        scope: Scope,
        id: i32,
        position: i32,
    ) -> Result<Vec<E::Model>, AppError> {
        let profile = TxnProfile::Reorder;
        with_retry(profile, self.settings, move || async move {
            let txn = begin(self.db, profile).await?;
            bounded(profile, self.settings, async move {
                let rows = self.move_in(&txn, scope, id, position).await?;
                txn.commit().await?;
                Ok(rows)
            })
            .await
        })
        .await
    }

    pub async fn swap(&self, scope: Scope, a: i32, b: i32) -> Result<Vec<E::Model>, AppError> {
        let profile = TxnProfile::Reorder;
        with_retry(profile, self.settings, move || async move {
            let txn = begin(self.db, profile).await?;
            bounded(profile, self.settings, async move {
                let rows = self.swap_in(&txn, scope, a, b).await?;
                txn.commit().await?;
                Ok(rows)
            })
            .await
        })
        .await
    }

    pub async fn bulk_delete(&self, scope: Scope, ids: &[i32]) -> Result<Vec<E::Model>, AppError> {
        let profile = TxnProfile::Bulk;
        with_retry(profile, self.settings, move || async move {
            let txn = begin(self.db, profile).await?;
            bounded(profile, self.settings, async move {
                let remaining = self.bulk_delete_in(&txn, scope, ids).await?;
                txn.commit().await?;
                Ok(remaining)
            })
            .await
        })
        .await
    }

    pub async fn reorder(&self, scope: Scope, ids: &[i32]) -> Result<Vec<E::Model>, AppError> {
        let profile = TxnProfile::Reorder;
        with_retry(profile, self.settings, move || async move {
            let txn = begin(self.db, profile).await?;
            bounded(profile, self.settings, async move {
                let rows = self.reorder_in(&txn, scope, ids).await?;
                txn.commit().await?;
                Ok(rows)
            })
            .await
        })
        .await
    }

    pub async fn replace_all(
        &self,
        scope: Scope,
        payloads: &[E::ActiveModel],
    ) -> Result<Vec<E::Model>, AppError> {
        let profile = TxnProfile::Bulk;
        with_retry(profile, self.settings, move || async move {
            let txn = begin(self.db, profile).await?;
            bounded(profile, self.settings, async move {
                let rows = self.replace_all_in(&txn, scope, payloads).await?;
                txn.commit().await?;
                Ok(rows)
            })
            .await
        })
        .await
    }
}

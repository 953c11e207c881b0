//! Pure planning over one scope's `(id, position)` slots.
//!
//! Every planner is a total function over the supplied [`PositionView`]: it
//! either returns the complete set of position changes that keeps the scope
//! dense (`1..=N`, no gaps, no duplicates) or a [`PlanError`] with nothing to
//! apply. Nothing here touches storage.

use std::collections::{BTreeMap, BTreeSet, HashSet};

/// One row's place in its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub id: i32,
    pub position: i32,
}

/// Snapshot of a scope, sorted by position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionView {
    slots: Vec<Slot>,
}

/// A single position change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub id: i32,
    pub from: i32,
    pub to: i32,
}

impl Shift {
    pub fn delta(&self) -> i32 {
        self.to - self.from
    }
}

/// Position changes required by one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationPlan {
    /// Rows that stay in the scope but change position.
    pub shifts: Vec<Shift>,
    /// Position for the inserted row, or the final position of a moved row.
    pub assigned: Option<i32>,
    /// Rows leaving the scope.
    pub removed: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("scope is full ({current} of {limit} items)")]
    CapacityExceeded { limit: usize, current: usize },
    #[error("item {0} not found")]
    NotFound(i32),
    #[error("cannot swap item {0} with itself")]
    SelfSwap(i32),
    #[error("reorder list must contain every item of the scope exactly once")]
    ReorderMismatch,
    #[error("positions are not dense: {0}")]
    NotDense(String),
}

impl PositionView {
    pub fn new(mut slots: Vec<Slot>) -> Self {
        slots.sort_by_key(|s| (s.position, s.id));
        Self { slots }
    }

    /// A dense view holding `ids` at positions `1..=ids.len()`.
    pub fn dense(ids: impl IntoIterator<Item = i32>) -> Self {
        let slots = ids
            .into_iter()
            .zip(1..)
            .map(|(id, position)| Slot { id, position })
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Ids in position order.
    pub fn ids(&self) -> Vec<i32> {
        self.slots.iter().map(|s| s.id).collect()
    }

    pub fn position_of(&self, id: i32) -> Option<i32> {
        self.slots.iter().find(|s| s.id == id).map(|s| s.position)
    }

    fn require(&self, id: i32) -> Result<i32, PlanError> {
        self.position_of(id).ok_or(PlanError::NotFound(id))
    }

    fn count(&self) -> i32 {
        i32::try_from(self.slots.len()).unwrap_or(i32::MAX)
    }

    /// Verify positions are exactly `1..=N`.
    pub fn check_dense(&self) -> Result<(), PlanError> {
        for (expected, slot) in (1..).zip(&self.slots) {
            if slot.position != expected {
                return Err(PlanError::NotDense(format!(
                    "item {} holds position {} where {} was expected",
                    slot.id, slot.position, expected
                )));
            }
        }
        Ok(())
    }

    /// Apply shifts and removals, returning the resulting view.
    ///
    /// Inserted rows are not part of the plan's shifts; add them with
    /// [`PositionView::push`].
    pub fn apply(&self, plan: &MutationPlan) -> PositionView {
        let removed: HashSet<i32> = plan.removed.iter().copied().collect();
        let moved: BTreeMap<i32, i32> = plan.shifts.iter().map(|s| (s.id, s.to)).collect();
        let slots = self
            .slots
            .iter()
            .filter(|s| !removed.contains(&s.id))
            .map(|s| Slot {
                id: s.id,
                position: moved.get(&s.id).copied().unwrap_or(s.position),
            })
            .collect();
        PositionView::new(slots)
    }

    pub fn push(&mut self, slot: Slot) {
        self.slots.push(slot);
        self.slots.sort_by_key(|s| (s.position, s.id));
    }
}

impl MutationPlan {
    pub fn is_noop(&self) -> bool {
        self.shifts.is_empty() && self.removed.is_empty()
    }

    /// Shifted ids grouped by delta, so each group becomes one batched update.
    pub fn shifts_by_delta(&self) -> BTreeMap<i32, Vec<i32>> {
        let mut groups: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
        for shift in &self.shifts {
            if shift.delta() != 0 {
                groups.entry(shift.delta()).or_default().push(shift.id);
            }
        }
        groups
    }
}

/// Plan an insert at `desired` (appending when absent).
///
/// Out-of-range positions are clamped into `[1, N+1]`; only a full scope is
/// an error.
pub fn plan_insert(
    view: &PositionView,
    desired: Option<i32>,
    capacity: Option<usize>,
) -> Result<MutationPlan, PlanError> {
    if let Some(limit) = capacity
        && view.len() >= limit
    {
        return Err(PlanError::CapacityExceeded {
            limit,
            current: view.len(),
        });
    }

    let tail = view.count().saturating_add(1);
    let target = desired.map_or(tail, |p| p.clamp(1, tail));

    let shifts = view
        .slots
        .iter()
        .filter(|s| s.position >= target)
        .map(|s| Shift {
            id: s.id,
            from: s.position,
            to: s.position + 1,
        })
        .collect();

    Ok(MutationPlan {
        shifts,
        assigned: Some(target),
        removed: Vec::new(),
    })
}

/// Plan removing `id`, closing the gap it leaves.
pub fn plan_delete(view: &PositionView, id: i32) -> Result<MutationPlan, PlanError> {
    let removed_position = view.require(id)?;

    let shifts = view
        .slots
        .iter()
        .filter(|s| s.position > removed_position)
        .map(|s| Shift {
            id: s.id,
            from: s.position,
            to: s.position - 1,
        })
        .collect();

    Ok(MutationPlan {
        shifts,
        assigned: None,
        removed: vec![id],
    })
}

/// Plan moving `id` to `new_position`, clamped into `[1, N]`.
pub fn plan_move(view: &PositionView, id: i32, new_position: i32) -> Result<MutationPlan, PlanError> {
    let old = view.require(id)?;
    let target = new_position.clamp(1, view.count());

    if target == old {
        return Ok(MutationPlan {
            assigned: Some(old),
            ..Default::default()
        });
    }

    let (range, step) = if target < old {
        (target..old, 1)
    } else {
        (old + 1..target + 1, -1)
    };

    let mut shifts: Vec<Shift> = view
        .slots
        .iter()
        .filter(|s| s.id != id && range.contains(&s.position))
        .map(|s| Shift {
            id: s.id,
            from: s.position,
            to: s.position + step,
        })
        .collect();
    shifts.push(Shift {
        id,
        from: old,
        to: target,
    });

    Ok(MutationPlan {
        shifts,
        assigned: Some(target),
        removed: Vec::new(),
    })
}

/// Plan exchanging the positions of `a` and `b`. No other row moves.
pub fn plan_swap(view: &PositionView, a: i32, b: i32) -> Result<MutationPlan, PlanError> {
    if a == b {
        return Err(PlanError::SelfSwap(a));
    }
    let pa = view.require(a)?;
    let pb = view.require(b)?;

    Ok(MutationPlan {
        shifts: vec![
            Shift {
                id: a,
                from: pa,
                to: pb,
            },
            Shift {
                id: b,
                from: pb,
                to: pa,
            },
        ],
        assigned: None,
        removed: Vec::new(),
    })
}

/// Plan removing every id in `ids` at once.
///
/// Each survivor moves down by the number of removed positions strictly
/// below its own, computed in a single pass over the sorted removals.
/// Applying single deletes one after another against the original
/// positions would shift some survivors twice.
pub fn plan_bulk_delete(view: &PositionView, ids: &[i32]) -> Result<MutationPlan, PlanError> {
    let targets: BTreeSet<i32> = ids.iter().copied().collect();

    let mut removed_positions = Vec::with_capacity(targets.len());
    for &id in &targets {
        removed_positions.push(view.require(id)?);
    }
    removed_positions.sort_unstable();

    let shifts = view
        .slots
        .iter()
        .filter(|s| !targets.contains(&s.id))
        .filter_map(|s| {
            let below = removed_positions.partition_point(|&p| p < s.position);
            let below = i32::try_from(below).unwrap_or(i32::MAX);
            (below > 0).then(|| Shift {
                id: s.id,
                from: s.position,
                to: s.position - below,
            })
        })
        .collect();

    Ok(MutationPlan {
        shifts,
        assigned: None,
        removed: targets.into_iter().collect(),
    })
}

/// Plan assigning positions `1..=N` in the order of `ordered_ids`.
///
/// The list must name every row in the scope exactly once.
pub fn plan_reorder(view: &PositionView, ordered_ids: &[i32]) -> Result<MutationPlan, PlanError> {
    let requested: HashSet<i32> = ordered_ids.iter().copied().collect();
    let current: HashSet<i32> = view.slots.iter().map(|s| s.id).collect();
    if requested.len() != ordered_ids.len() || requested != current {
        return Err(PlanError::ReorderMismatch);
    }

    let mut shifts = Vec::new();
    for (&id, target) in ordered_ids.iter().zip(1..) {
        let from = view.require(id)?;
        if from != target {
            shifts.push(Shift {
                id,
                from,
                to: target,
            });
        }
    }

    Ok(MutationPlan {
        shifts,
        assigned: None,
        removed: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn banners(n: i32) -> PositionView {
        PositionView::dense(1..=n)
    }

    fn insert_as(view: &PositionView, id: i32, plan: &MutationPlan) -> PositionView {
        let mut next = view.apply(plan);
        next.push(Slot {
            id,
            position: plan.assigned.unwrap(),
        });
        next
    }

    #[test]
    fn insert_at_front_shifts_everyone() {
        let view = banners(2);
        let plan = plan_insert(&view, Some(1), Some(15)).unwrap();

        assert_eq!(plan.assigned, Some(1));
        assert_eq!(plan.shifts.len(), 2);

        let next = insert_as(&view, 99, &plan);
        next.check_dense().unwrap();
        assert_eq!(next.ids(), vec![99, 1, 2]);
    }

    #[test]
    fn insert_without_position_appends() {
        let view = banners(3);
        let plan = plan_insert(&view, None, None).unwrap();
        assert_eq!(plan.assigned, Some(4));
        assert!(plan.shifts.is_empty());
    }

    #[test]
    fn insert_clamps_out_of_range_positions() {
        let view = banners(3);
        assert_eq!(plan_insert(&view, Some(50), None).unwrap().assigned, Some(4));
        assert_eq!(plan_insert(&view, Some(0), None).unwrap().assigned, Some(1));
        assert_eq!(plan_insert(&view, Some(-7), None).unwrap().assigned, Some(1));
    }

    #[test]
    fn insert_into_full_scope_is_rejected() {
        let view = banners(15);
        let err = plan_insert(&view, Some(1), Some(15)).unwrap_err();
        assert_eq!(
            err,
            PlanError::CapacityExceeded {
                limit: 15,
                current: 15
            }
        );
    }

    #[test]
    fn insert_into_empty_scope_takes_first_position() {
        let plan = plan_insert(&PositionView::default(), Some(8), Some(1)).unwrap();
        assert_eq!(plan.assigned, Some(1));
    }

    #[test]
    fn delete_middle_closes_gap_in_order() {
        let view = banners(3);
        let plan = plan_delete(&view, 2).unwrap();
        let next = view.apply(&plan);

        next.check_dense().unwrap();
        assert_eq!(next.ids(), vec![1, 3]);
    }

    #[test]
    fn delete_missing_item_is_not_found() {
        assert_eq!(
            plan_delete(&banners(3), 42).unwrap_err(),
            PlanError::NotFound(42)
        );
    }

    #[test]
    fn move_up_shifts_the_range_down_the_list() {
        let view = banners(5);
        let plan = plan_move(&view, 4, 2).unwrap();
        let next = view.apply(&plan);

        next.check_dense().unwrap();
        assert_eq!(next.ids(), vec![1, 4, 2, 3, 5]);
        assert_eq!(plan.assigned, Some(2));
    }

    #[test]
    fn move_down_shifts_the_range_up_the_list() {
        let view = banners(5);
        let plan = plan_move(&view, 2, 4).unwrap();
        let next = view.apply(&plan);

        next.check_dense().unwrap();
        assert_eq!(next.ids(), vec![1, 3, 4, 2, 5]);
    }

    #[test]
    fn move_clamps_to_last_position() {
        let view = banners(4);
        let plan = plan_move(&view, 1, 99).unwrap();
        assert_eq!(plan.assigned, Some(4));
        assert_eq!(view.apply(&plan).ids(), vec![2, 3, 4, 1]);
    }

    #[test]
    fn move_to_same_position_is_noop() {
        let plan = plan_move(&banners(4), 3, 3).unwrap();
        assert!(plan.is_noop());
    }

    #[test]
    fn swap_touches_only_the_pair() {
        let view = banners(4);
        let plan = plan_swap(&view, 1, 4).unwrap();
        assert_eq!(plan.shifts.len(), 2);
        assert_eq!(view.apply(&plan).ids(), vec![4, 2, 3, 1]);
    }

    #[test]
    fn swap_twice_restores_positions() {
        let view = banners(6);
        let once = view.apply(&plan_swap(&view, 2, 5).unwrap());
        let twice = once.apply(&plan_swap(&once, 2, 5).unwrap());
        assert_eq!(twice, view);
    }

    #[test]
    fn swap_with_self_is_rejected() {
        assert_eq!(
            plan_swap(&banners(3), 2, 2).unwrap_err(),
            PlanError::SelfSwap(2)
        );
    }

    #[test]
    fn bulk_delete_alternate_positions() {
        let view = banners(5);
        let plan = plan_bulk_delete(&view, &[2, 4]).unwrap();
        let next = view.apply(&plan);

        next.check_dense().unwrap();
        assert_eq!(next.ids(), vec![1, 3, 5]);
        assert_eq!(next.position_of(5), Some(3));
    }

    #[test]
    fn bulk_delete_adjacent_range() {
        let view = banners(6);
        let plan = plan_bulk_delete(&view, &[3, 2, 4]).unwrap();
        let next = view.apply(&plan);

        next.check_dense().unwrap();
        assert_eq!(next.ids(), vec![1, 5, 6]);
    }

    #[test]
    fn bulk_delete_differs_from_sequential_single_deletes() {
        // Single-delete plans computed against the original view and applied
        // in sequence would move item 5 down twice and item 3 once more
        // than it should.
        let view = banners(5);
        let plan = plan_bulk_delete(&view, &[2, 4]).unwrap();
        let shifted: BTreeMap<i32, i32> = plan.shifts.iter().map(|s| (s.id, s.to)).collect();
        assert_eq!(shifted.get(&3), Some(&2));
        assert_eq!(shifted.get(&5), Some(&3));
    }

    #[test]
    fn bulk_delete_with_unknown_id_plans_nothing() {
        assert_eq!(
            plan_bulk_delete(&banners(3), &[1, 9]).unwrap_err(),
            PlanError::NotFound(9)
        );
    }

    #[test]
    fn bulk_delete_ignores_duplicate_ids() {
        let view = banners(3);
        let plan = plan_bulk_delete(&view, &[2, 2]).unwrap();
        assert_eq!(plan.removed, vec![2]);
        assert_eq!(view.apply(&plan).ids(), vec![1, 3]);
    }

    #[test]
    fn reorder_assigns_positions_by_index() {
        let view = banners(3);
        let plan = plan_reorder(&view, &[3, 1, 2]).unwrap();
        let next = view.apply(&plan);
        next.check_dense().unwrap();
        assert_eq!(next.ids(), vec![3, 1, 2]);
    }

    #[test]
    fn reorder_rejects_partial_or_duplicated_lists() {
        let view = banners(3);
        assert_eq!(
            plan_reorder(&view, &[1, 2]).unwrap_err(),
            PlanError::ReorderMismatch
        );
        assert_eq!(
            plan_reorder(&view, &[1, 2, 2]).unwrap_err(),
            PlanError::ReorderMismatch
        );
        assert_eq!(
            plan_reorder(&view, &[1, 2, 7]).unwrap_err(),
            PlanError::ReorderMismatch
        );
    }

    #[test]
    fn check_dense_reports_gaps_and_duplicates() {
        let gap = PositionView::new(vec![
            Slot { id: 1, position: 1 },
            Slot { id: 2, position: 3 },
        ]);
        assert!(matches!(gap.check_dense(), Err(PlanError::NotDense(_))));

        let dup = PositionView::new(vec![
            Slot { id: 1, position: 1 },
            Slot { id: 2, position: 1 },
        ]);
        assert!(matches!(dup.check_dense(), Err(PlanError::NotDense(_))));
    }

    #[test]
    fn shifts_group_by_delta() {
        let view = banners(6);
        let plan = plan_bulk_delete(&view, &[2, 4]).unwrap();
        let groups = plan.shifts_by_delta();
        assert_eq!(groups.get(&-1), Some(&vec![3]));
        assert_eq!(groups.get(&-2), Some(&vec![5, 6]));
    }
}

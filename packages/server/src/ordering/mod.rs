//! Dense, scoped position sequences.
//!
//! [`ledger`] plans position changes as pure functions; [`repository`]
//! applies them to the database inside one transaction per command.

pub mod ledger;
pub mod repository;

pub use ledger::{MutationPlan, PlanError, PositionView, Shift, Slot};
pub use repository::{Inserted, OrderedRepository, Positioned, Scope};

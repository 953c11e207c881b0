//! Asset rows and the policy for keeping them in step with the remote store.

pub mod coordinator;
pub mod records;

pub use coordinator::{AssetAction, AssetChanges, AssetOwner};

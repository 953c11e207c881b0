use std::fmt;

use sea_orm::{ConnectionTrait, EntityTrait};

use super::{category, service};
use crate::error::AppError;

/// A row other rows point at by plain id column.
///
/// There are no database foreign keys, so writers check the parent inside
/// the same transaction that adds the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    Category(i32),
    Service(i32),
}

impl fmt::Display for Parent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parent::Category(id) => write!(f, "Category {id}"),
            Parent::Service(id) => write!(f, "Service {id}"),
        }
    }
}

impl Parent {
    /// `NotFound` unless the row is visible to `conn`.
    pub async fn ensure<C: ConnectionTrait>(self, conn: &C) -> Result<(), AppError> {
        let found = match self {
            Parent::Category(id) => category::Entity::find_by_id(id).one(conn).await?.is_some(),
            Parent::Service(id) => service::Entity::find_by_id(id).one(conn).await?.is_some(),
        };
        if found {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("{self} not found")))
        }
    }
}

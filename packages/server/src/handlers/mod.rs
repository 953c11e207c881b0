pub mod about;
pub mod addons;
pub mod assets;
pub mod category;
pub mod gallery;
pub mod health;
pub mod service;
pub mod settings;
pub mod slider;
pub mod testimonial;

use std::collections::HashSet;

use crate::error::AppError;

/// Fail with `NotFound` naming every requested id that was not loaded.
pub(crate) fn ensure_all_found(
    label: &str,
    requested: &[i32],
    found: impl IntoIterator<Item = i32>,
) -> Result<(), AppError> {
    let found: HashSet<i32> = found.into_iter().collect();
    let missing: Vec<String> = requested
        .iter()
        .filter(|id| !found.contains(*id))
        .map(|id| id.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::NotFound(format!(
            "{label} not found: {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ids_are_listed_in_request_order() {
        let err = ensure_all_found("Slider", &[4, 1, 9], [1]).unwrap_err();
        match err {
            AppError::NotFound(msg) => assert_eq!(msg, "Slider not found: 4, 9"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(ensure_all_found("Slider", &[1, 2], [2, 1]).is_ok());
    }
}

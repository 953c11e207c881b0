use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::shared::{validate_position, validate_text};
use crate::error::AppError;

/// Largest add-on set accepted by a full replace.
pub const MAX_ADDONS: usize = 100;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateAddonRequest {
    #[schema(example = "Ceramic coating")]
    pub name: String,
    /// 1-based position; omitted appends.
    pub position: Option<i32>,
}

/// The complete desired add-on list, in order.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct ReplaceAddonsRequest {
    #[schema(example = json!(["Wax", "Polish", "Interior clean"]))]
    pub names: Vec<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AddonResponse {
    pub id: i32,
    pub name: String,
    #[schema(example = 1)]
    pub position: i32,
}

pub fn validate_create_addon(req: &CreateAddonRequest) -> Result<(), AppError> {
    validate_text("Add-on name", &req.name, 128)?;
    validate_position(req.position)
}

pub fn validate_replace_addons(req: &ReplaceAddonsRequest) -> Result<(), AppError> {
    if req.names.len() > MAX_ADDONS {
        return Err(AppError::Validation(format!(
            "Too many add-ons: max {MAX_ADDONS}"
        )));
    }
    for name in &req.names {
        validate_text("Add-on name", name, 128)?;
    }
    Ok(())
}

/// Trim names and drop repeats, keeping the first occurrence.
///
/// Comparison is case-sensitive: `Wax` and `wax` are distinct add-ons.
pub fn dedupe_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| n.trim().to_string())
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn dedupe_keeps_first_occurrence_in_order() {
        let deduped = dedupe_names(&names(&["Wax", "Polish", "Wax", "Tint", "Polish"]));
        assert_eq!(deduped, names(&["Wax", "Polish", "Tint"]));
    }

    #[test]
    fn dedupe_is_case_sensitive() {
        let deduped = dedupe_names(&names(&["Wax", "wax", "WAX"]));
        assert_eq!(deduped.len(), 3);
    }

    #[test]
    fn dedupe_compares_trimmed_names() {
        let deduped = dedupe_names(&names(&["Wax", " Wax "]));
        assert_eq!(deduped, names(&["Wax"]));
    }

    #[test]
    fn blank_names_are_rejected() {
        let req = ReplaceAddonsRequest {
            names: names(&["Wax", "  "]),
        };
        assert!(validate_replace_addons(&req).is_err());
    }
}

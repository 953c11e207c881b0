use uuid::Uuid;

use super::error::StorageError;

const MAX_FOLDER_DEPTH: usize = 4;

/// Validate an upload folder such as `cms/sliders`.
///
/// Segments are non-empty and limited to `[a-z0-9_-]`.
pub fn validate_folder(folder: &str) -> Result<(), StorageError> {
    let segments: Vec<&str> = folder.split('/').collect();
    if segments.len() > MAX_FOLDER_DEPTH {
        return Err(StorageError::InvalidKey(format!(
            "folder nesting exceeds {MAX_FOLDER_DEPTH} levels"
        )));
    }
    for segment in segments {
        if !valid_segment(segment) {
            return Err(StorageError::InvalidKey(format!(
                "invalid folder segment '{segment}'"
            )));
        }
    }
    Ok(())
}

/// Validate a remote id before it is turned into a path or object key.
pub fn validate_remote_id(remote_id: &str) -> Result<(), StorageError> {
    let Some((folder, file)) = remote_id.rsplit_once('/') else {
        return Err(StorageError::InvalidKey(format!(
            "remote id '{remote_id}' has no folder"
        )));
    };
    validate_folder(folder)?;

    let (stem, ext) = file
        .split_once('.')
        .ok_or_else(|| StorageError::InvalidKey(format!("remote id '{remote_id}' has no extension")))?;
    if !valid_segment(stem) || !valid_segment(ext) {
        return Err(StorageError::InvalidKey(format!(
            "invalid remote id '{remote_id}'"
        )));
    }
    Ok(())
}

/// Build a fresh, never-reused object key: `{folder}/{uuid}.{ext}`.
///
/// Keys are not content-addressed so two owners uploading identical bytes
/// never share a remote object.
pub fn new_object_key(folder: &str, ext: &str) -> Result<String, StorageError> {
    validate_folder(folder)?;
    Ok(format!("{folder}/{}.{ext}", Uuid::now_v7().simple()))
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}

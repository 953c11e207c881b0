use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::StorageError;

/// Metadata the remote store reports for a freshly uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    /// Identifier needed to issue a matching delete.
    pub remote_id: String,
    /// Public URL the front ends render.
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Lowercase file extension of the detected format (`png`, `jpg`, ...).
    pub format: String,
    pub byte_size: u64,
}

/// Result of a remote delete. Deleting a missing object is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub found: bool,
}

/// Remote binary store holding uploaded images.
///
/// Calls have no transactional semantics and no internal timeout; callers
/// decide how a failure interacts with their database work.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Store an image under `folder` and return its metadata.
    async fn upload(&self, data: &[u8], folder: &str) -> Result<UploadedAsset, StorageError>;

    /// Delete an object by its remote id.
    async fn delete(&self, remote_id: &str) -> Result<DeleteOutcome, StorageError>;
}

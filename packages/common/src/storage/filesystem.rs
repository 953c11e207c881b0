use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use super::error::StorageError;
use super::key::{new_object_key, validate_remote_id};
use super::inspect::inspect_image;
use super::traits::{AssetStore, DeleteOutcome, UploadedAsset};

/// Filesystem-backed asset store, served by a static file handler.
///
/// Objects live at `{base_path}/{remote_id}` and are published under
/// `{public_base_url}/{remote_id}`.
pub struct FilesystemAssetStore {
    base_path: PathBuf,
    public_base_url: String,
    max_size: u64,
}

impl FilesystemAssetStore {
    /// Create a new filesystem asset store.
    pub async fn new(
        base_path: PathBuf,
        public_base_url: impl Into<String>,
        max_size: u64,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            max_size,
        })
    }

    fn object_path(&self, remote_id: &str) -> PathBuf {
        self.base_path.join(remote_id)
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl AssetStore for FilesystemAssetStore {
    async fn upload(&self, data: &[u8], folder: &str) -> Result<UploadedAsset, StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let info = inspect_image(data)?;
        let remote_id = new_object_key(folder, info.extension)?;
        let object_path = self.object_path(&remote_id);

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &object_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(UploadedAsset {
            url: format!("{}/{remote_id}", self.public_base_url),
            remote_id,
            width: info.width,
            height: info.height,
            format: info.extension.to_string(),
            byte_size: data.len() as u64,
        })
    }

    async fn delete(&self, remote_id: &str) -> Result<DeleteOutcome, StorageError> {
        validate_remote_id(remote_id)?;
        match fs::remove_file(self.object_path(remote_id)).await {
            Ok(()) => Ok(DeleteOutcome { found: true }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(DeleteOutcome { found: false })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::inspect::tests::png_bytes;

    async fn temp_store() -> (FilesystemAssetStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemAssetStore::new(
            dir.path().join("assets"),
            "https://cdn.example.com/assets/",
            1024 * 1024,
        )
        .await
        .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn upload_writes_object_and_reports_metadata() {
        let (store, dir) = temp_store().await;
        let data = png_bytes(16, 9);

        let uploaded = store.upload(&data, "cms/sliders").await.unwrap();

        assert!(uploaded.remote_id.starts_with("cms/sliders/"));
        assert_eq!(
            uploaded.url,
            format!("https://cdn.example.com/assets/{}", uploaded.remote_id)
        );
        assert_eq!((uploaded.width, uploaded.height), (16, 9));
        assert_eq!(uploaded.format, "png");
        assert_eq!(uploaded.byte_size, data.len() as u64);

        let on_disk = std::fs::read(dir.path().join("assets").join(&uploaded.remote_id)).unwrap();
        assert_eq!(on_disk, data);
    }

    #[tokio::test]
    async fn identical_uploads_get_distinct_objects() {
        let (store, _dir) = temp_store().await;
        let data = png_bytes(2, 2);
        let a = store.upload(&data, "cms").await.unwrap();
        let b = store.upload(&data, "cms").await.unwrap();
        assert_ne!(a.remote_id, b.remote_id);
    }

    #[tokio::test]
    async fn size_limit_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemAssetStore::new(dir.path().join("assets"), "/a", 10)
            .await
            .unwrap();

        let result = store.upload(&png_bytes(8, 8), "cms").await;
        assert!(matches!(
            result,
            Err(StorageError::SizeLimitExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_non_image_upload() {
        let (store, _dir) = temp_store().await;
        let result = store.upload(b"plain text", "cms").await;
        assert!(matches!(result, Err(StorageError::InvalidImage(_))));
    }

    #[tokio::test]
    async fn delete_removes_object() {
        let (store, dir) = temp_store().await;
        let uploaded = store.upload(&png_bytes(1, 1), "cms").await.unwrap();

        let outcome = store.delete(&uploaded.remote_id).await.unwrap();
        assert!(outcome.found);
        assert!(!dir.path().join("assets").join(&uploaded.remote_id).exists());
    }

    #[tokio::test]
    async fn delete_missing_object_is_success() {
        let (store, _dir) = temp_store().await;
        let outcome = store.delete("cms/never-uploaded.png").await.unwrap();
        assert!(!outcome.found);
    }

    #[tokio::test]
    async fn delete_rejects_traversal() {
        let (store, _dir) = temp_store().await;
        assert!(matches!(
            store.delete("../outside.png").await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn constructor_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("deep/nested/assets");
        assert!(!base.exists());

        let _store = FilesystemAssetStore::new(base.clone(), "/a", 1024)
            .await
            .unwrap();

        assert!(base.exists());
        assert!(base.join(".tmp").exists());
    }
}

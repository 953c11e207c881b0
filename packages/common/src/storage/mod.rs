mod error;
mod key;
mod inspect;
mod traits;

pub mod filesystem;
#[cfg(feature = "object-storage")]
pub mod bucket;

use std::sync::Arc;

pub use error::StorageError;
pub use key::{validate_folder, validate_remote_id};
pub use inspect::{ImageInfo, inspect_image};
pub use traits::{AssetStore, DeleteOutcome, UploadedAsset};

use crate::config::{StorageBackend, StorageConfig};

/// Build the configured asset store.
pub async fn build_asset_store(config: &StorageConfig) -> Result<Arc<dyn AssetStore>, StorageError> {
    match config.backend {
        StorageBackend::Filesystem => {
            let store = filesystem::FilesystemAssetStore::new(
                config.root.clone(),
                config.public_base_url.clone(),
                config.max_upload_size,
            )
            .await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "object-storage")]
        StorageBackend::S3 => {
            let s3_config = config.s3.as_ref().ok_or_else(|| {
                StorageError::Remote("storage.backend = \"s3\" requires a [storage.s3] section".into())
            })?;
            let store = bucket::S3AssetStore::new(
                s3_config,
                config.public_base_url.clone(),
                config.max_upload_size,
            )?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "object-storage"))]
        StorageBackend::S3 => Err(StorageError::Remote(
            "S3 backend requires the `object-storage` feature".into(),
        )),
    }
}

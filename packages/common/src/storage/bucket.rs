use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use tracing::debug;

use super::error::StorageError;
use super::key::{new_object_key, validate_remote_id};
use super::inspect::inspect_image;
use super::traits::{AssetStore, DeleteOutcome, UploadedAsset};
use crate::config::S3Config;

/// S3-compatible asset store.
pub struct S3AssetStore {
    bucket: Box<Bucket>,
    public_base_url: String,
    max_size: u64,
}

impl S3AssetStore {
    pub fn new(
        config: &S3Config,
        public_base_url: impl Into<String>,
        max_size: u64,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.resolved_endpoint(),
        };
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Remote(format!("invalid S3 credentials: {e}")))?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| StorageError::Remote(format!("failed to open bucket: {e}")))?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self {
            bucket,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            max_size,
        })
    }
}

fn check_status(op: &str, key: &str, status: u16) -> Result<(), StorageError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(StorageError::Remote(format!(
            "{op} of '{key}' returned HTTP {status}"
        )))
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn upload(&self, data: &[u8], folder: &str) -> Result<UploadedAsset, StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let info = inspect_image(data)?;
        let remote_id = new_object_key(folder, info.extension)?;

        let response = self
            .bucket
            .put_object_with_content_type(&remote_id, data, info.mime)
            .await
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        check_status("upload", &remote_id, response.status_code())?;
        debug!(remote_id = %remote_id, size = data.len(), "Uploaded object to S3");

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

        let response = self
            .bucket
            .delete_object(remote_id)
            .await
            .map_err(|e| StorageError::Remote(e.to_string()))?;

        // S3 answers 204 whether or not the key existed; some compatible
        // stores answer 404 for a missing key instead.
        match response.status_code() {
            404 => Ok(DeleteOutcome { found: false }),
            status => {
                check_status("delete", remote_id, status)?;
                Ok(DeleteOutcome { found: true })
            }
        }
    }
}

use std::path::PathBuf;

use serde::Deserialize;

/// Which remote store holds uploaded assets.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    S3,
}

/// Asset storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Default: filesystem.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory for the filesystem backend. Default: "./data/assets".
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Public URL prefix prepended to object keys. Default: "/static/assets".
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Maximum upload size in bytes. Default: 10 MB.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
    /// Required when `backend = "s3"`.
    #[serde(default)]
    pub s3: Option<S3Config>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...).
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    /// Path-style addressing, needed by most self-hosted stores. Default: true.
    #[serde(default = "default_path_style")]
    pub path_style: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from("./data/assets")
}
fn default_public_base_url() -> String {
    "/static/assets".into()
}
fn default_max_upload_size() -> u64 {
    10 * 1024 * 1024
}
fn default_region() -> String {
    "us-east-1".into()
}
fn default_path_style() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root: default_root(),
            public_base_url: default_public_base_url(),
            max_upload_size: default_max_upload_size(),
            s3: None,
        }
    }
}

impl S3Config {
    /// Endpoint to talk to, falling back to the AWS regional endpoint.
    pub fn resolved_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.region))
    }
}

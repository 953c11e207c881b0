//! Fixtures shared by unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use common::StorageConfig;
use common::storage::{AssetStore, DeleteOutcome, StorageError, UploadedAsset};
use sea_orm::DatabaseConnection;

use crate::config::{
    AppConfig, CorsConfig, DatabaseConfig, OrderingConfig, ServerConfig, TransactionConfig,
};
use crate::entity::asset;
use crate::models::asset::AssetMetadata;
use crate::state::AppState;

/// In-memory asset store that fails deletes for chosen remote ids.
#[derive(Default)]
pub struct FakeStore {
    failing: HashSet<String>,
    attempts: Mutex<Vec<String>>,
    uploads: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(remote_ids: &[&str]) -> Self {
        Self {
            failing: remote_ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Remote ids passed to `delete`, in call order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetStore for FakeStore {
    async fn upload(&self, data: &[u8], folder: &str) -> Result<UploadedAsset, StorageError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        let remote_id = format!("{folder}/fake{n}.png");
        Ok(UploadedAsset {
            url: format!("/static/assets/{remote_id}"),
            remote_id,
            width: 1,
            height: 1,
            format: "png".into(),
            byte_size: data.len() as u64,
        })
    }

    async fn delete(&self, remote_id: &str) -> Result<DeleteOutcome, StorageError> {
        self.attempts.lock().unwrap().push(remote_id.to_string());
        if self.failing.contains(remote_id) {
            return Err(StorageError::Remote("store unavailable".into()));
        }
        Ok(DeleteOutcome { found: true })
    }
}

pub fn config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors: CorsConfig {
                allow_origins: Vec::new(),
                max_age: 0,
            },
        },
        database: DatabaseConfig { url: String::new() },
        storage: StorageConfig::default(),
        ordering: OrderingConfig::default(),
        transactions: TransactionConfig {
            retry_base_ms: 1,
            ..Default::default()
        },
    }
}

pub fn state_with(db: DatabaseConnection, store: Arc<FakeStore>) -> AppState {
    AppState {
        db,
        config: Arc::new(config()),
        assets: store,
    }
}

pub fn meta(remote_id: &str) -> AssetMetadata {
    AssetMetadata {
        remote_id: remote_id.to_string(),
        url: format!("/static/assets/{remote_id}"),
        width: 800,
        height: 600,
        format: "png".into(),
        byte_size: 2048,
    }
}

/// Row matching [`meta`] for the same remote id.
pub fn asset_row(id: i32, remote_id: &str) -> asset::Model {
    asset::Model {
        id,
        remote_id: remote_id.to_string(),
        url: format!("/static/assets/{remote_id}"),
        width: 800,
        height: 600,
        format: "png".into(),
        byte_size: 2048,
        created_at: Utc::now(),
    }
}

pub mod config;
pub mod retry;
pub mod storage;

pub use config::{S3Config, StorageBackend, StorageConfig};

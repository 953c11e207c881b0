use std::collections::HashMap;

use common::StorageConfig;
use common::retry::RetryPolicy;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Per-scope size limits for ordered collections, keyed by table name.
#[derive(Debug, Deserialize, Clone)]
pub struct OrderingConfig {
    #[serde(default = "default_capacity")]
    pub capacity: HashMap<String, usize>,
}

fn default_capacity() -> HashMap<String, usize> {
    HashMap::from([("slider".to_string(), 15)])
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl OrderingConfig {
    /// Capacity for a table; `None` means unbounded.
    pub fn capacity_for(&self, table: &str) -> Option<usize> {
        self.capacity.get(table).copied()
    }
}

/// Timeouts and retry budget for the named transaction profiles.
#[derive(Debug, Deserialize, Clone)]
pub struct TransactionConfig {
    /// Default: 5.
    #[serde(default = "default_reorder_timeout")]
    pub reorder_timeout_secs: u64,
    /// Default: 15.
    #[serde(default = "default_asset_timeout")]
    pub asset_timeout_secs: u64,
    /// Default: 10.
    #[serde(default = "default_bulk_timeout")]
    pub bulk_timeout_secs: u64,
    /// Retries after a serialization conflict. Default: 3.
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
    /// Default: 25.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

fn default_reorder_timeout() -> u64 {
    5
}
fn default_asset_timeout() -> u64 {
    15
}
fn default_bulk_timeout() -> u64 {
    10
}
fn default_max_retries() -> u8 {
    3
}
fn default_retry_base_ms() -> u64 {
    25
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            reorder_timeout_secs: default_reorder_timeout(),
            asset_timeout_secs: default_asset_timeout(),
            bulk_timeout_secs: default_bulk_timeout(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

impl TransactionConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_ms: self.retry_base_ms,
            max_ms: self.retry_base_ms.saturating_mul(40),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ordering: OrderingConfig,
    #[serde(default)]
    pub transactions: TransactionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., CMS__DATABASE__URL)
            .add_source(Environment::with_prefix("CMS").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

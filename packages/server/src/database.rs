use std::future::Future;
use std::time::Duration;

use common::retry::RetryPolicy;
use sea_orm::{
    ConnectOptions, Database, DatabaseConnection, DatabaseTransaction, DbErr, IsolationLevel,
    TransactionTrait,
};
use tracing::warn;

use crate::config::TransactionConfig;
use crate::error::AppError;

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    // Set connection pool options
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("cms_server::entity::*")
        .sync(&db)
        .await?;

    Ok(db)
}

/// Named transaction settings. Every mutating command runs under one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnProfile {
    /// Single-scope position changes.
    Reorder,
    /// Owner rows together with their asset rows.
    AssetReplace,
    /// Multi-row deletes and full add-on set replacement.
    Bulk,
}

impl TxnProfile {
    pub fn name(self) -> &'static str {
        match self {
            TxnProfile::Reorder => "reorder",
            TxnProfile::AssetReplace => "asset_replace",
            TxnProfile::Bulk => "bulk",
        }
    }

    pub fn isolation(self) -> IsolationLevel {
        IsolationLevel::Serializable
    }

    pub fn timeout(self, settings: &TransactionConfig) -> Duration {
        let secs = match self {
            TxnProfile::Reorder => settings.reorder_timeout_secs,
            TxnProfile::AssetReplace => settings.asset_timeout_secs,
            TxnProfile::Bulk => settings.bulk_timeout_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Open a transaction with the profile's isolation level.
pub async fn begin(
    db: &DatabaseConnection,
    profile: TxnProfile,
) -> Result<DatabaseTransaction, AppError> {
    Ok(db
        .begin_with_config(Some(profile.isolation()), None)
        .await?)
}

/// Run `work` under the profile's timeout.
///
/// Dropping an uncommitted transaction rolls it back, so a timed out body
/// leaves nothing behind.
pub async fn bounded<T>(
    profile: TxnProfile,
    settings: &TransactionConfig,
    work: impl Future<Output = Result<T, AppError>>,
) -> Result<T, AppError> {
    let limit = profile.timeout(settings);
    tokio::time::timeout(limit, work).await.map_err(|_| {
        AppError::Timeout(format!(
            "{} transaction exceeded {}s",
            profile.name(),
            limit.as_secs()
        ))
    })?
}

/// Re-run `attempt` while it fails with a transient storage error.
///
/// Each attempt must open its own transaction; a serialization failure
/// poisons the transaction it happened in.
pub async fn with_retry<T, F, Fut>(
    profile: TxnProfile,
    settings: &TransactionConfig,
    mut attempt: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let policy: RetryPolicy = settings.retry_policy();
    let mut tries: u8 = 0;
    loop {
        tries = tries.saturating_add(1);
        match attempt().await {
            Err(e) if e.is_transient() && policy.should_retry(tries) => {
                let delay = policy.backoff(tries);
                warn!(
                    profile = profile.name(),
                    attempt = tries,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after serialization conflict: {:?}",
                    e
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_settings() -> TransactionConfig {
        TransactionConfig {
            max_retries: 2,
            retry_base_ms: 1,
            ..Default::default()
        }
    }

    #[test]
    fn profiles_follow_configured_timeouts() {
        let settings = TransactionConfig::default();
        assert_eq!(
            TxnProfile::Reorder.timeout(&settings),
            Duration::from_secs(5)
        );
        assert_eq!(
            TxnProfile::AssetReplace.timeout(&settings),
            Duration::from_secs(15)
        );
        assert_eq!(TxnProfile::Bulk.timeout(&settings), Duration::from_secs(10));
        assert_eq!(
            TxnProfile::Bulk.isolation(),
            IsolationLevel::Serializable
        );
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let calls = &AtomicU32::new(0);
        let result = with_retry(TxnProfile::Reorder, &fast_settings(), || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AppError::TransientStorage("40001".into()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert!(matches!(result, Ok(7)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = with_retry(TxnProfile::Bulk, &fast_settings(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::TransientStorage("40001".into()))
        })
        .await;

        assert!(matches!(result, Err(AppError::TransientStorage(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = with_retry(TxnProfile::Reorder, &fast_settings(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::NotFound("gone".into()))
        })
        .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_work_times_out() {
        let settings = TransactionConfig {
            reorder_timeout_secs: 0,
            ..Default::default()
        };
        let result: Result<(), _> = bounded(TxnProfile::Reorder, &settings, async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(AppError::Timeout(_))));
    }
}

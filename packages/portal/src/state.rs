use std::sync::Arc;

use common::RetryPolicy;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::notification::{Notifier, TimeLimited};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    /// Every send is capped at `notification.delivery_timeout_ms`.
    pub notifier: Arc<dyn Notifier>,
    /// Applied to idempotent store reads on the authentication path.
    pub store_retry: RetryPolicy,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        let store_retry = RetryPolicy::from(&config.retry);
        let notifier = Arc::new(TimeLimited::new(
            notifier,
            config.notification.delivery_timeout(),
        ));
        Self {
            db,
            config: Arc::new(config),
            notifier,
            store_retry,
        }
    }
}

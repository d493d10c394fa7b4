use std::time::Duration;

use chrono::Utc;
use common::{SessionConfig, SweeperConfig};
use sea_orm::DatabaseConnection;
use tracing::{error, info};

use super::SessionService;

/// Periodically purge expired sessions and stale passcodes.
pub async fn run_sweeper(db: DatabaseConnection, session: SessionConfig, config: SweeperConfig) {
    let scan_interval = Duration::from_secs(config.interval_secs.max(1));

    info!(interval_secs = config.interval_secs, "Starting session sweeper");

    let mut interval = tokio::time::interval(scan_interval);

    loop {
        interval.tick().await;

        match SessionService::new(&db, &session)
            .purge_expired(Utc::now())
            .await
        {
            Ok(stats) if stats.sessions > 0 || stats.otps > 0 => {
                info!(
                    sessions = stats.sessions,
                    otps = stats.otps,
                    "Purged expired credentials"
                );
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "Session sweep failed"),
        }
    }
}

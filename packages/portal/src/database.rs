use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

use crate::config::DatabaseConfig;
use crate::seed;

/// Connect using the configured pool bounds and bring the schema up to date.
pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.to_owned());

    // Acquire timeouts surface as STORE_UNAVAILABLE
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    connect_with(opt).await
}

/// Connect with explicit options, then sync the schema and indexes.
pub async fn connect_with(opt: ConnectOptions) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(opt).await?;
    prepare(&db).await?;
    Ok(db)
}

/// Create missing tables and indexes. Safe to run on every start.
pub async fn prepare(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.get_schema_registry("portal::entity::*").sync(db).await?;
    seed::ensure_indexes(db).await
}

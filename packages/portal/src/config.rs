use std::time::Duration;

use common::{OtpConfig, RetryConfig, SessionConfig, SweeperConfig};
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
    /// Upper bound on a single request, store calls included.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    /// Seeded on startup when both are set.
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

/// Which notifier backs the dispatcher.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMode {
    /// Write messages to the log only.
    #[default]
    Log,
    /// POST messages to `webhook_url`.
    Webhook,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    #[serde(default)]
    pub mode: NotificationMode,
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Cap on one send, transport retries included. Default: 10000.
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
    /// Cap on a whole broadcast. Recipients not reached in time are logged as failed. Default: 20000.
    #[serde(default = "default_broadcast_budget_ms")]
    pub broadcast_budget_ms: u64,
    /// Sends in flight at once during a broadcast. Default: 8.
    #[serde(default = "default_broadcast_concurrency")]
    pub broadcast_concurrency: usize,
}

fn default_delivery_timeout_ms() -> u64 {
    10_000
}
fn default_broadcast_budget_ms() -> u64 {
    20_000
}
fn default_broadcast_concurrency() -> usize {
    8
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            mode: NotificationMode::default(),
            webhook_url: None,
            delivery_timeout_ms: default_delivery_timeout_ms(),
            broadcast_budget_ms: default_broadcast_budget_ms(),
            broadcast_concurrency: default_broadcast_concurrency(),
        }
    }
}

impl NotificationConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    pub fn broadcast_budget(&self) -> Duration {
        Duration::from_millis(self.broadcast_budget_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub otp: OtpConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 2)?
            .set_default("database.connect_timeout_secs", 8)?
            .set_default("database.acquire_timeout_secs", 8)?
            .set_default("auth.jwt_ttl_hours", 12)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., PORTAL__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("PORTAL").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Notification work runs inside the request, so it must finish before the request times out.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let request_ms = self.server.request_timeout_secs.saturating_mul(1000);
        let n = &self.notification;
        if n.delivery_timeout_ms == 0 || n.delivery_timeout_ms >= request_ms {
            return Err(ConfigError::Message(format!(
                "notification.delivery_timeout_ms must be between 1 and {} (below server.request_timeout_secs)",
                request_ms.saturating_sub(1)
            )));
        }
        if n.broadcast_budget_ms == 0 || n.broadcast_budget_ms >= request_ms {
            return Err(ConfigError::Message(format!(
                "notification.broadcast_budget_ms must be between 1 and {} (below server.request_timeout_secs)",
                request_ms.saturating_sub(1)
            )));
        }
        if n.broadcast_concurrency == 0 {
            return Err(ConfigError::Message(
                "notification.broadcast_concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

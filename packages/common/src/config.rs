use serde::Deserialize;

/// One-time passcode settings.
#[derive(Debug, Deserialize, Clone)]
pub struct OtpConfig {
    /// Number of digits in a code. Default: 6.
    #[serde(default = "default_otp_code_length")]
    pub code_length: usize,
    /// Lifetime of a code in seconds. Default: 600.
    #[serde(default = "default_otp_ttl_secs")]
    pub ttl_secs: u64,
    /// Wrong guesses allowed before a code is locked. Default: 5.
    #[serde(default = "default_otp_max_attempts")]
    pub max_attempts: i32,
    /// Minimum gap between two requests for the same identifier and purpose. Default: 60.
    #[serde(default = "default_otp_min_interval_secs")]
    pub min_interval_secs: u64,
    /// Requests allowed per identifier and purpose in a rolling hour. Default: 10.
    #[serde(default = "default_otp_max_per_hour")]
    pub max_per_hour: u64,
}

fn default_otp_code_length() -> usize {
    6
}
fn default_otp_ttl_secs() -> u64 {
    600
}
fn default_otp_max_attempts() -> i32 {
    5
}
fn default_otp_min_interval_secs() -> u64 {
    60
}
fn default_otp_max_per_hour() -> u64 {
    10
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: default_otp_code_length(),
            ttl_secs: default_otp_ttl_secs(),
            max_attempts: default_otp_max_attempts(),
            min_interval_secs: default_otp_min_interval_secs(),
            max_per_hour: default_otp_max_per_hour(),
        }
    }
}

/// Applicant session settings.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Session lifetime in hours, fixed at creation. Default: 24.
    #[serde(default = "default_session_ttl_hours")]
    pub ttl_hours: i64,
    /// Cookie carrying the session token. Default: "portal_session".
    #[serde(default = "default_session_cookie_name")]
    pub cookie_name: String,
    /// Mark the cookie `Secure`. Default: false.
    #[serde(default)]
    pub secure_cookie: bool,
}

fn default_session_ttl_hours() -> i64 {
    24
}
fn default_session_cookie_name() -> String {
    "portal_session".into()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_session_ttl_hours(),
            cookie_name: default_session_cookie_name(),
            secure_cookie: false,
        }
    }
}

/// Retry settings for idempotent collaborator calls.
#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first. Default: 3.
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u8,
    /// Default: 100.
    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Default: 2000.
    #[serde(default = "default_retry_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_retry_max_attempts() -> u8 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    100
}
fn default_retry_max_delay_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            base_delay_ms: default_retry_base_delay_ms(),
            max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

/// Background cleanup of expired sessions and passcodes.
#[derive(Debug, Deserialize, Clone)]
pub struct SweeperConfig {
    /// Default: true.
    #[serde(default = "default_sweeper_enabled")]
    pub enabled: bool,
    /// Default: 300.
    #[serde(default = "default_sweeper_interval_secs")]
    pub interval_secs: u64,
}

fn default_sweeper_enabled() -> bool {
    true
}
fn default_sweeper_interval_secs() -> u64 {
    300
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweeper_enabled(),
            interval_secs: default_sweeper_interval_secs(),
        }
    }
}

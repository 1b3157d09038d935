//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Public origin used when building download links and checkout redirects.
    pub base_url: String,
    /// Secret keying the HMAC over signed download tokens.
    pub download_secret: String,
    /// Shared secret for verifying inbound payment-provider webhooks.
    pub webhook_secret: String,
    pub stripe_secret_key: String,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    /// Root directory holding the downloadable artifacts.
    pub storage_root: PathBuf,
    /// Bearer secret for the administrative endpoints. Deliberately has no
    /// default: unset means admin routes reject everything.
    pub admin_token: Option<String>,
    pub download_rate_window_secs: u64,
    pub download_rate_max: u32,
    pub download_link_ttl_days: i64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let base_url =
            std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        // --- Load Secrets ---
        let download_secret = std::env::var("DOWNLOAD_URL_SECRET")
            .or_else(|_| std::env::var("AUTH_SECRET"))
            .map_err(|_| ConfigError::MissingVar("DOWNLOAD_URL_SECRET".to_string()))?;

        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| ConfigError::MissingVar("STRIPE_WEBHOOK_SECRET".to_string()))?;

        let stripe_secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| ConfigError::MissingVar("STRIPE_SECRET_KEY".to_string()))?;

        let resend_api_key = std::env::var("RESEND_API_KEY").ok();
        let email_from =
            std::env::var("EMAIL_FROM").unwrap_or_else(|_| "noreply@example.com".to_string());

        let storage_root = std::env::var("STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./storage"));

        let admin_token = std::env::var("ADMIN_TOKEN").ok();

        // --- Download Gate Tuning ---
        let download_rate_window_secs =
            parse_var("DOWNLOAD_RATE_WINDOW_SECS", 60u64)?;
        let download_rate_max = parse_var("DOWNLOAD_RATE_MAX", 5u32)?;
        let download_link_ttl_days = parse_var("DOWNLOAD_LINK_TTL_DAYS", 7i64)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            base_url,
            download_secret,
            webhook_secret,
            stripe_secret_key,
            resend_api_key,
            email_from,
            storage_root,
            admin_token,
            download_rate_window_secs,
            download_rate_max,
            download_link_ttl_days,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(name.to_string(), format!("'{}' is not a valid value", raw))
        }),
        Err(_) => Ok(default),
    }
}

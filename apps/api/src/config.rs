use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::masonry::MasonryConfig;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    pub masonry: MasonryConfig,
    pub image_probe_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = MasonryConfig::default();
        let masonry = MasonryConfig {
            min_column_width: optional_env("MASONRY_MIN_COLUMN_WIDTH", defaults.min_column_width)?,
            gap: optional_env("MASONRY_GAP", defaults.gap)?,
            placeholder_height: optional_env(
                "MASONRY_PLACEHOLDER_HEIGHT",
                defaults.placeholder_height,
            )?,
            max_width_retries: optional_env("MASONRY_MAX_WIDTH_RETRIES", defaults.max_width_retries)?,
            retry_base_delay: Duration::from_millis(optional_env(
                "MASONRY_RETRY_BASE_MS",
                defaults.retry_base_delay.as_millis() as u64,
            )?),
            retry_max_delay: Duration::from_millis(optional_env(
                "MASONRY_RETRY_MAX_MS",
                defaults.retry_max_delay.as_millis() as u64,
            )?),
            resize_debounce: Duration::from_millis(optional_env(
                "MASONRY_RESIZE_DEBOUNCE_MS",
                defaults.resize_debounce.as_millis() as u64,
            )?),
        };
        masonry.validate()?;

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            port: optional_env("PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            masonry,
            image_probe_timeout: Duration::from_secs(optional_env("IMAGE_PROBE_TIMEOUT_SECS", 10)?),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

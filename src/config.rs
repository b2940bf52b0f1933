use std::env;
use std::time::Duration;
use log::warn;

use crate::error::ConfigError;

// Server Configuration
pub const DEFAULT_API_BIND_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8081";
pub const STATS_INTERVAL_SECS: u64 = 60;

// NSE Configuration
pub const DEFAULT_NSE_BASE_URL: &str = "https://www.nseindia.com";
pub const DEFAULT_LANDING_PATH: &str = "/get-quotes/equity?symbol=SBIN";
pub const DEFAULT_INDEX_NAME: &str = "NIFTY 500";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;

// Polling Configuration
pub const DEFAULT_POLL_INITIAL_DELAY_MS: u64 = 1000;
pub const DEFAULT_POLL_MIN_DELAY_MS: u64 = 60_000;
pub const DEFAULT_POLL_MAX_DELAY_MS: u64 = 90_000;

// Portfolio Configuration
pub const DEFAULT_PORTFOLIO_FILE: &str = "portfolio.json";

// Broadcast Configuration
pub const BROADCAST_CHANNEL_SIZE: usize = 16;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_bind_address: String,
    pub bind_address: String,
    pub nse_base_url: String,
    pub landing_path: String,
    pub index_name: String,
    pub http_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub poll_initial_delay_ms: u64,
    pub poll_min_delay_ms: u64,
    pub poll_max_delay_ms: u64,
    pub portfolio_file: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_bind_address: DEFAULT_API_BIND_ADDRESS.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            nse_base_url: DEFAULT_NSE_BASE_URL.to_string(),
            landing_path: DEFAULT_LANDING_PATH.to_string(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            poll_initial_delay_ms: DEFAULT_POLL_INITIAL_DELAY_MS,
            poll_min_delay_ms: DEFAULT_POLL_MIN_DELAY_MS,
            poll_max_delay_ms: DEFAULT_POLL_MAX_DELAY_MS,
            portfolio_file: DEFAULT_PORTFOLIO_FILE.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_bind_address: env::var("API_BIND_ADDRESS")
                .unwrap_or(defaults.api_bind_address),
            bind_address: env::var("BIND_ADDRESS")
                .unwrap_or(defaults.bind_address),
            nse_base_url: env::var("NSE_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.nse_base_url),
            landing_path: env::var("NSE_LANDING_PATH")
                .unwrap_or(defaults.landing_path),
            index_name: env::var("NSE_INDEX")
                .unwrap_or(defaults.index_name),
            http_timeout_secs: env_u64("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs),
            settle_delay_ms: env_u64("SESSION_SETTLE_DELAY_MS", defaults.settle_delay_ms),
            poll_initial_delay_ms: env_u64("POLL_INITIAL_DELAY_MS", defaults.poll_initial_delay_ms),
            poll_min_delay_ms: env_u64("POLL_MIN_DELAY_MS", defaults.poll_min_delay_ms),
            poll_max_delay_ms: env_u64("POLL_MAX_DELAY_MS", defaults.poll_max_delay_ms),
            portfolio_file: env::var("PORTFOLIO_FILE")
                .unwrap_or(defaults.portfolio_file),
            log_level: env::var("RUST_LOG")
                .unwrap_or(defaults.log_level),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_min_delay_ms == 0 {
            return Err(ConfigError::Invalid("POLL_MIN_DELAY_MS must be greater than zero".to_string()));
        }

        if self.poll_min_delay_ms > self.poll_max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "POLL_MIN_DELAY_MS ({}) exceeds POLL_MAX_DELAY_MS ({})",
                self.poll_min_delay_ms, self.poll_max_delay_ms
            )));
        }

        if self.index_name.trim().is_empty() {
            return Err(ConfigError::Invalid("NSE_INDEX must not be empty".to_string()));
        }

        reqwest::Url::parse(&self.nse_base_url)
            .map_err(|e| ConfigError::Invalid(format!("Invalid NSE_BASE_URL {}: {}", self.nse_base_url, e)))?;

        if !self.landing_path.starts_with('/') {
            return Err(ConfigError::Invalid("NSE_LANDING_PATH must start with '/'".to_string()));
        }

        Ok(())
    }

    pub fn landing_url(&self) -> String {
        format!("{}{}", self.nse_base_url, self.landing_path)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn log_config(&self) {
        println!("Server Configuration:");
        println!("  API Bind Address: {}", self.api_bind_address);
        println!("  WebSocket Bind Address: {}", self.bind_address);
        println!("  NSE Base URL: {}", self.nse_base_url);
        println!("  Index: {}", self.index_name);
        println!("  Poll Delay: {}-{} ms (first after {} ms)",
                 self.poll_min_delay_ms, self.poll_max_delay_ms, self.poll_initial_delay_ms);
        println!("  Portfolio File: {}", self.portfolio_file);
        println!("  Log Level: {}", self.log_level);
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} is not a valid number ({}), using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        let config = Config::from_env();
        assert!(!config.api_bind_address.is_empty());
        assert!(!config.bind_address.is_empty());
        assert!(!config.portfolio_file.is_empty());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_min_delay_ms, 60_000);
        assert_eq!(config.poll_max_delay_ms, 90_000);
        assert_eq!(config.landing_url(), "https://www.nseindia.com/get-quotes/equity?symbol=SBIN");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.poll_min_delay_ms = 95_000;
        assert!(config.validate().is_err());

        config.poll_min_delay_ms = 0;
        assert!(config.validate().is_err());

        config.poll_min_delay_ms = 5_000;
        config.index_name = "  ".to_string();
        assert!(config.validate().is_err());

        config.index_name = "NIFTY 50".to_string();
        config.nse_base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.nse_base_url = DEFAULT_NSE_BASE_URL.to_string();
        assert!(config.validate().is_ok());
    }
}

use anyhow::{bail, Context, Result};
use std::time::Duration;

use crate::util::{is_local_endpoint_url, non_empty_env, parse_secs};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
const API_URL_ENV: &str = "CHATSTREAM_API_URL";
const ACCESS_TOKEN_ENV: &str = "CHATSTREAM_ACCESS_TOKEN";
const IDLE_TIMEOUT_ENV: &str = "CHATSTREAM_IDLE_TIMEOUT_SECS";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub access_token: Option<String>,
    /// Abort a stream that delivers no bytes for this long. `None` waits forever.
    pub idle_timeout: Option<Duration>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let api_url = non_empty_env(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let access_token = non_empty_env(ACCESS_TOKEN_ENV);
        let idle_timeout = match non_empty_env(IDLE_TIMEOUT_ENV) {
            Some(raw) => Some(parse_secs(&raw).with_context(|| {
                format!("Invalid {IDLE_TIMEOUT_ENV} '{raw}': expected whole seconds")
            })?),
            None => None,
        };

        Ok(Self {
            api_url,
            access_token,
            idle_timeout,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!(
                "Invalid {API_URL_ENV} '{}': expected http:// or https:// URL",
                self.api_url
            );
        }

        if !is_local_endpoint_url(&self.api_url) && self.access_token.is_none() {
            bail!(
                "{ACCESS_TOKEN_ENV} must be set for non-local endpoints (url: '{}')",
                self.api_url
            );
        }

        if self.idle_timeout == Some(Duration::ZERO) {
            bail!("{IDLE_TIMEOUT_ENV} must be greater than zero; unset it to disable the timeout");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_reads_environment() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(API_URL_ENV, "https://analytics.example.com");
        std::env::set_var(ACCESS_TOKEN_ENV, "tok");
        std::env::set_var(IDLE_TIMEOUT_ENV, "45");

        let config = Config::load().expect("config should load");
        assert_eq!(config.api_url, "https://analytics.example.com");
        assert_eq!(config.access_token.as_deref(), Some("tok"));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(45)));

        std::env::remove_var(API_URL_ENV);
        std::env::remove_var(ACCESS_TOKEN_ENV);
        std::env::remove_var(IDLE_TIMEOUT_ENV);
    }

    #[test]
    fn test_load_defaults_and_rejects_bad_timeout() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::remove_var(API_URL_ENV);
        std::env::remove_var(ACCESS_TOKEN_ENV);
        std::env::set_var(IDLE_TIMEOUT_ENV, "soon");
        assert!(Config::load().is_err());

        std::env::remove_var(IDLE_TIMEOUT_ENV);
        let config = Config::load().expect("config should load");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.access_token.is_none());
        assert!(config.idle_timeout.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_idle_timeout() {
        let config = Config {
            api_url: DEFAULT_API_URL.to_string(),
            access_token: None,
            idle_timeout: Some(Duration::ZERO),
        };
        assert!(config.validate().is_err());
    }
}

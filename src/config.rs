use std::collections::HashMap;
use std::env;
use std::time::Duration;

use reqwest::Url;

use crate::error::{D3Error, Result};

/// Endpoint used when no base URL is configured
pub const DEFAULT_BASE_URL: &str = "https://api-dev.dragdropdo.com";

/// Request timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a [`crate::D3Client`]
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    /// Extra headers merged over the defaults; these win on conflict
    pub headers: HashMap<String, String>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Load configuration from environment variables and .env file
    ///
    /// Reads `D3_API_KEY` (required), `D3_BASE_URL` and `D3_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if required variables are missing or invalid
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if it exists

        let api_key = env::var("D3_API_KEY").map_err(|_| {
            D3Error::validation("D3_API_KEY not found in environment. Please set it in .env file")
        })?;

        let base_url = env::var("D3_BASE_URL").ok().filter(|v| !v.trim().is_empty());

        let timeout = match env::var("D3_TIMEOUT_SECS") {
            Ok(raw) => Some(Self::parse_timeout_secs(&raw)?),
            Err(_) => None,
        };

        Ok(Self {
            api_key,
            base_url,
            timeout,
            headers: HashMap::new(),
        })
    }

    /// Validated API key
    pub(crate) fn resolved_api_key(&self) -> Result<&str> {
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(D3Error::validation("API key is required"));
        }
        Ok(key)
    }

    /// Base URL with defaults applied and trailing slashes removed
    pub(crate) fn resolved_base_url(&self) -> Result<String> {
        let raw = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_BASE_URL);
        let base_url = raw.trim_end_matches('/').to_string();
        Self::validate_base_url(&base_url)?;
        Ok(base_url)
    }

    pub(crate) fn resolved_timeout(&self) -> Duration {
        self.timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    fn validate_base_url(base_url: &str) -> Result<()> {
        let url = Url::parse(base_url).map_err(|e| {
            D3Error::validation(format!("base URL '{}' is not a valid URL: {}", base_url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(D3Error::validation(format!(
                "base URL '{}' must use http or https",
                base_url
            )));
        }

        if url.query().is_some() || url.fragment().is_some() {
            return Err(D3Error::validation(format!(
                "base URL '{}' must not carry a query string or fragment",
                base_url
            )));
        }

        Ok(())
    }

    fn parse_timeout_secs(raw: &str) -> Result<Duration> {
        match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(D3Error::validation(format!(
                "D3_TIMEOUT_SECS '{}' must be a positive number of seconds",
                raw
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_validation() {
        assert!(ClientConfig::new("key").resolved_api_key().is_ok());
        assert!(ClientConfig::new("").resolved_api_key().is_err());
        assert!(ClientConfig::new("   ").resolved_api_key().is_err());
    }

    #[test]
    fn test_base_url_defaults_and_normalization() {
        let config = ClientConfig::new("key");
        assert_eq!(config.resolved_base_url().unwrap(), DEFAULT_BASE_URL);

        let config = ClientConfig::new("key").base_url("https://example.com/api//");
        assert_eq!(
            config.resolved_base_url().unwrap(),
            "https://example.com/api"
        );

        let config = ClientConfig::new("key").base_url("");
        assert_eq!(config.resolved_base_url().unwrap(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_base_url_validation() {
        assert!(ClientConfig::validate_base_url("http://localhost:8080").is_ok());
        assert!(ClientConfig::validate_base_url("https://api.example.com/v2").is_ok());

        assert!(ClientConfig::validate_base_url("not a url").is_err());
        assert!(ClientConfig::validate_base_url("ftp://example.com").is_err());
        assert!(ClientConfig::validate_base_url("https://example.com?x=1").is_err());
    }

    #[test]
    fn test_timeout_defaults() {
        assert_eq!(ClientConfig::new("k").resolved_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(
            ClientConfig::new("k")
                .timeout(Duration::ZERO)
                .resolved_timeout(),
            DEFAULT_TIMEOUT
        );
        assert_eq!(
            ClientConfig::new("k")
                .timeout(Duration::from_secs(5))
                .resolved_timeout(),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_parse_timeout_secs() {
        assert_eq!(
            ClientConfig::parse_timeout_secs("120").unwrap(),
            Duration::from_secs(120)
        );
        assert!(ClientConfig::parse_timeout_secs("0").is_err());
        assert!(ClientConfig::parse_timeout_secs("soon").is_err());
    }
}

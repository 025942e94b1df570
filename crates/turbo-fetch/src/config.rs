//! Client configuration.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`FetchConfig::base_url`].
pub const BASE_URL_ENV: &str = "TURBO_FETCH_BASE_URL";

/// Environment variable overriding [`FetchConfig::user_agent`].
pub const USER_AGENT_ENV: &str = "TURBO_FETCH_USER_AGENT";

/// Settings for building a [`FetchClient`](crate::FetchClient).
///
/// ```toml
/// base_url = "https://api.example.com"
/// user_agent = "storefront/1.0"
///
/// [default_headers]
/// Accept = "application/json"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Prefix for relative request URLs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Headers sent with every request.
    #[serde(default)]
    pub default_headers: HashMap<String, String>,

    /// User-Agent for the native transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl FetchConfig {
    /// Load config from a file. `.json` files are JSON, everything else TOML.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }

    /// Parse config from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `TURBO_FETCH_*` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.base_url = Some(base_url);
        }
        if let Some(user_agent) = lookup(USER_AGENT_ENV).filter(|v| !v.is_empty()) {
            self.user_agent = Some(user_agent);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml() {
        let config = FetchConfig::from_toml_str(
            r#"
            base_url = "https://api.example.com"
            user_agent = "storefront/1.0"

            [default_headers]
            Accept = "application/json"
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.user_agent.as_deref(), Some("storefront/1.0"));
        assert_eq!(config.default_headers["Accept"], "application/json");
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(FetchConfig::from_toml_str("").unwrap(), FetchConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(FetchConfig::from_toml_str("base_url = [").is_err());
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let err = FetchConfig::load("/nonexistent/turbo-fetch.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/turbo-fetch.toml"));
    }

    #[test]
    fn test_load_json_file() {
        let path = std::env::temp_dir().join(format!("turbo-fetch-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"base_url": "http://localhost:3000"}"#).unwrap();

        let config = FetchConfig::load(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.base_url.as_deref(), Some("http://localhost:3000"));
        assert!(config.default_headers.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = FetchConfig {
            base_url: Some("https://api.example.com".to_string()),
            ..Default::default()
        }
        .with_overrides_from(|key| match key {
            BASE_URL_ENV => Some("http://localhost:8080".to_string()),
            USER_AGENT_ENV => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.user_agent, None);
    }
}

//! Environment-driven client configuration.

use std::time::Duration;

use crate::error::ConfigError;

pub const API_URL_VAR: &str = "API_URL";
pub const API_TIMEOUT_VAR: &str = "API_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Applied to every request that does not set its own timeout.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
        }
    }

    /// Read `API_URL` (required) and `API_TIMEOUT_MS` (optional).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(API_URL_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(API_URL_VAR))?;

        let timeout = match lookup(API_TIMEOUT_VAR) {
            Some(raw) => {
                let millis: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    name: API_TIMEOUT_VAR,
                    value: raw.clone(),
                })?;
                Some(Duration::from_millis(millis))
            }
            None => None,
        };

        Ok(Self { base_url, timeout })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn reads_url_and_timeout() {
        let config =
            ClientConfig::from_lookup(lookup(&[("API_URL", "http://api"), ("API_TIMEOUT_MS", "250")]))
                .unwrap();
        assert_eq!(config.base_url, "http://api");
        assert_eq!(config.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn timeout_is_optional() {
        let config = ClientConfig::from_lookup(lookup(&[("API_URL", "http://api")])).unwrap();
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn missing_url_is_an_error() {
        let err = ClientConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("API_URL"));

        let err = ClientConfig::from_lookup(lookup(&[("API_URL", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("API_URL"));
    }

    #[test]
    fn bad_timeout_is_an_error() {
        let err =
            ClientConfig::from_lookup(lookup(&[("API_URL", "http://api"), ("API_TIMEOUT_MS", "soon")]))
                .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "API_TIMEOUT_MS", .. }));
    }
}

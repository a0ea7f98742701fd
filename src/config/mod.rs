//! Service configuration
//!
//! Read from the process environment, with an optional `.env` file loaded
//! first.

use std::env;

use thiserror::Error;
use url::Url;

pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Settings for the proxy service binary.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Upstream API root, without a trailing slash.
    pub base_url: String,
    pub proxies: Vec<String>,
    pub port: u16,
}

impl ServiceConfig {
    /// Loads `.env` if present, then reads `BASE_URL`, `PROXY_LIST` and `PORT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("BASE_URL")
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .ok_or(ConfigError::Missing("BASE_URL"))?;
        Url::parse(&base_url).map_err(|err| ConfigError::Invalid {
            key: "BASE_URL",
            reason: err.to_string(),
        })?;

        let proxies = lookup("PROXY_LIST")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let port = match lookup("PORT") {
            Some(raw) if !raw.trim().is_empty() => {
                raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    key: "PORT",
                    reason: format!("'{raw}' is not a port number"),
                })?
            }
            _ => DEFAULT_PORT,
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            proxies,
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_all_settings() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("BASE_URL", "https://api.prizepicks.com/"),
            ("PROXY_LIST", "http://10.0.0.1:8080, ,socks5://10.0.0.2:1080"),
            ("PORT", "9000"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://api.prizepicks.com");
        assert_eq!(config.proxies.len(), 2);
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn port_defaults_and_base_url_is_required() {
        let config =
            ServiceConfig::from_lookup(lookup(&[("BASE_URL", "https://api.prizepicks.com")]))
                .unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.proxies.is_empty());

        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("BASE_URL"))
        ));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[("BASE_URL", "not a url")])),
            Err(ConfigError::Invalid { key: "BASE_URL", .. })
        ));
        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[
                ("BASE_URL", "https://api.prizepicks.com"),
                ("PORT", "eighty")
            ])),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));
    }
}

// API server configuration loaded from the environment

use anyhow::{Context, Result};
use telemetry_core::DEFAULT_GET_LIMIT;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Postgres URL of the record store
    pub database_url: String,
    /// Record limit passed to every store query
    pub get_limit: usize,
    /// Path prefix for the device routes (e.g. "/api/v1")
    pub api_prefix: String,
    pub bind_addr: String,
}

impl ApiConfig {
    /// Create from environment variables.
    /// - DATABASE_URL: record store connection (required)
    /// - GET_LIMIT: records per query (default: 50)
    /// - API_PREFIX: route prefix (default: empty)
    /// - BIND_ADDR: listen address (default: 0.0.0.0:9000)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url =
            lookup("DATABASE_URL").context("DATABASE_URL environment variable required")?;

        let get_limit = match lookup("GET_LIMIT").filter(|s| !s.is_empty()) {
            Some(value) => {
                let limit = value
                    .parse::<usize>()
                    .with_context(|| format!("Invalid GET_LIMIT value: {}", value))?;
                if limit == 0 {
                    anyhow::bail!("GET_LIMIT must be greater than zero");
                }
                limit
            }
            None => DEFAULT_GET_LIMIT,
        };

        let api_prefix = lookup("API_PREFIX")
            .map(|prefix| prefix.trim_end_matches('/').to_string())
            .unwrap_or_default();
        if !api_prefix.is_empty() && !api_prefix.starts_with('/') {
            anyhow::bail!("API_PREFIX must start with '/': {}", api_prefix);
        }

        let bind_addr = lookup("BIND_ADDR")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        Ok(Self {
            database_url,
            get_limit,
            api_prefix,
            bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ApiConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/telemetry")]).unwrap();

        assert_eq!(config.get_limit, DEFAULT_GET_LIMIT);
        assert_eq!(config.api_prefix, "");
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
    }

    #[test]
    fn test_database_url_required() {
        assert!(load(&[]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/telemetry"),
            ("GET_LIMIT", "200"),
            ("API_PREFIX", "/api/v1/"),
            ("BIND_ADDR", "127.0.0.1:8080"),
        ])
        .unwrap();

        assert_eq!(config.get_limit, 200);
        assert_eq!(config.api_prefix, "/api/v1");
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn test_invalid_values() {
        let url = ("DATABASE_URL", "postgres://localhost/telemetry");
        assert!(load(&[url, ("GET_LIMIT", "lots")]).is_err());
        assert!(load(&[url, ("GET_LIMIT", "0")]).is_err());
        assert!(load(&[url, ("API_PREFIX", "api")]).is_err());
    }
}

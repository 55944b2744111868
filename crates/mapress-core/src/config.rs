use std::env;
use std::str::FromStr;

use crate::errors::ConfigError;

pub const DEFAULT_MAX_URLS: usize = 8;
pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 8;
pub const DEFAULT_FETCH_MAX_BYTES: usize = 2_000_000;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 12_000;

/// Runtime configuration loaded from environment variables
///
/// Passed explicitly to adapters and pipelines; nothing reads the process
/// environment after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapressConfig {
    pub search_url: Option<String>,
    pub fetch_url: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub model: Option<String>,
    pub max_urls: usize,
    pub max_nodes: usize,
    pub max_tool_iterations: usize,
    pub fetch_max_bytes: usize,
    pub fetch_timeout_ms: u64,
}

impl Default for MapressConfig {
    fn default() -> Self {
        Self {
            search_url: None,
            fetch_url: None,
            openrouter_api_key: None,
            model: None,
            max_urls: DEFAULT_MAX_URLS,
            max_nodes: crate::prune::DEFAULT_MAX_NODES,
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            fetch_max_bytes: DEFAULT_FETCH_MAX_BYTES,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}

impl MapressConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(lookup(key));
        let defaults = Self::default();

        Ok(Self {
            search_url: get("MCP_SEARCH_URL"),
            fetch_url: get("MCP_FETCH_URL"),
            openrouter_api_key: get("OPENROUTER_API_KEY"),
            model: get("MODEL"),
            max_urls: parse_or(get("MAX_URLS"), "MAX_URLS", defaults.max_urls)?,
            max_nodes: parse_or(get("MAX_NODES"), "MAX_NODES", defaults.max_nodes)?,
            max_tool_iterations: parse_or(
                get("MAX_TOOL_ITERATIONS"),
                "MAX_TOOL_ITERATIONS",
                defaults.max_tool_iterations,
            )?,
            fetch_max_bytes: parse_or(
                get("FETCH_MAX_BYTES"),
                "FETCH_MAX_BYTES",
                defaults.fetch_max_bytes,
            )?,
            fetch_timeout_ms: parse_or(
                get("FETCH_TIMEOUT_MS"),
                "FETCH_TIMEOUT_MS",
                defaults.fetch_timeout_ms,
            )?,
        })
    }
}

/// Node budget alone, for callers that never touch the network
///
/// Other keys are not read, so a bad `MAX_URLS` cannot fail an offline run.
pub fn max_nodes_from_env() -> Result<usize, ConfigError> {
    max_nodes_from_lookup(|key| env::var(key).ok())
}

pub fn max_nodes_from_lookup<F>(lookup: F) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(
        non_empty(lookup("MAX_NODES")),
        "MAX_NODES",
        crate::prune::DEFAULT_MAX_NODES,
    )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|err: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            value: raw.clone(),
            reason: err.to_string(),
        }),
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
    fn empty_environment_uses_defaults() {
        let config = MapressConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, MapressConfig::default());
        assert_eq!(config.max_urls, 8);
        assert_eq!(config.max_nodes, 16);
        assert_eq!(config.max_tool_iterations, 8);
        assert_eq!(config.fetch_max_bytes, 2_000_000);
        assert_eq!(config.fetch_timeout_ms, 12_000);
        assert!(config.openrouter_api_key.is_none());
    }

    #[test]
    fn reads_all_keys() {
        let config = MapressConfig::from_lookup(lookup(&[
            ("MCP_SEARCH_URL", "http://localhost:7072"),
            ("MCP_FETCH_URL", "http://localhost:7071"),
            ("OPENROUTER_API_KEY", "sk-test"),
            ("MODEL", "x-ai/grok-4"),
            ("MAX_URLS", "5"),
            ("MAX_NODES", " 12 "),
            ("MAX_TOOL_ITERATIONS", "3"),
            ("FETCH_MAX_BYTES", "1000"),
            ("FETCH_TIMEOUT_MS", "500"),
        ]))
        .unwrap();

        assert_eq!(config.search_url.as_deref(), Some("http://localhost:7072"));
        assert_eq!(config.fetch_url.as_deref(), Some("http://localhost:7071"));
        assert_eq!(config.openrouter_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model.as_deref(), Some("x-ai/grok-4"));
        assert_eq!(config.max_urls, 5);
        assert_eq!(config.max_nodes, 12);
        assert_eq!(config.max_tool_iterations, 3);
        assert_eq!(config.fetch_max_bytes, 1000);
        assert_eq!(config.fetch_timeout_ms, 500);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config =
            MapressConfig::from_lookup(lookup(&[("MODEL", "  "), ("MAX_NODES", "")])).unwrap();
        assert!(config.model.is_none());
        assert_eq!(config.max_nodes, 16);
    }

    #[test]
    fn node_budget_ignores_unrelated_bad_keys() {
        let env = lookup(&[("MAX_URLS", "many"), ("FETCH_TIMEOUT_MS", "soon")]);
        assert!(MapressConfig::from_lookup(&env).is_err());
        assert_eq!(max_nodes_from_lookup(&env).unwrap(), 16);

        let env = lookup(&[("MAX_URLS", "many"), ("MAX_NODES", " 10 ")]);
        assert_eq!(max_nodes_from_lookup(&env).unwrap(), 10);

        assert!(max_nodes_from_lookup(lookup(&[("MAX_NODES", "lots")])).is_err());
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = MapressConfig::from_lookup(lookup(&[("MAX_NODES", "lots")])).unwrap_err();
        match err {
            ConfigError::Invalid { key, value, .. } => {
                assert_eq!(key, "MAX_NODES");
                assert_eq!(value, "lots");
            }
        }
    }
}

use std::{net::SocketAddr, num::NonZeroUsize};

use crate::error::ConfigError;

pub const ADDR_VAR: &str = "PACER_ADDR";
pub const CACHE_CAPACITY_VAR: &str = "PACER_CACHE_CAPACITY";
pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub cache_capacity: NonZeroUsize,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; unset or blank values fall
    /// back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let addr = match read(ADDR_VAR) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: ADDR_VAR,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let cache_capacity = match read(CACHE_CAPACITY_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<NonZeroUsize>()
                .map_err(|e| ConfigError::Invalid {
                    name: CACHE_CAPACITY_VAR,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?,
            None => NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
        };

        Ok(Self { addr, cache_capacity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.addr, DEFAULT_ADDR.parse().unwrap());
        assert_eq!(config.cache_capacity.get(), DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            (ADDR_VAR, "127.0.0.1:3000"),
            (CACHE_CAPACITY_VAR, " 8 "),
        ]))
        .unwrap();
        assert_eq!(config.addr, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.cache_capacity.get(), 8);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[(ADDR_VAR, "  ")])).unwrap();
        assert_eq!(config.addr.port(), 8080);
    }

    #[test]
    fn test_rejects_malformed_values() {
        let err = ServerConfig::from_lookup(lookup(&[(CACHE_CAPACITY_VAR, "0")])).unwrap_err();
        assert!(err.to_string().contains(CACHE_CAPACITY_VAR));

        let err = ServerConfig::from_lookup(lookup(&[(ADDR_VAR, "localhost")])).unwrap_err();
        assert!(err.to_string().contains("localhost"));
    }
}

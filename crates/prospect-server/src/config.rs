use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

const DEV_JWT_SECRET: &str = "prospect-dev-secret-change-me";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub database_path: String,
    pub jwt_secret: String,
    pub token_ttl: Duration,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_path", &self.database_path)
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "PROSPECT_BIND_ADDR", "127.0.0.1:3000");
        let database_path = value_or_default(&lookup, "PROSPECT_DATABASE_PATH", "prospect.db");

        let jwt_secret = optional_trimmed(&lookup, "PROSPECT_JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("PROSPECT_JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.to_string()
        });

        // 7 days, matching the token lifetime the clients expect
        let token_ttl_secs = value_or_default(&lookup, "PROSPECT_TOKEN_TTL_SECS", "604800")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "PROSPECT_TOKEN_TTL_SECS must be an integer in [60, 2592000]".to_string(),
                )
            })?;
        if !(60..=2_592_000).contains(&token_ttl_secs) {
            return Err(ConfigError::Invalid(
                "PROSPECT_TOKEN_TTL_SECS must be in [60, 2592000]".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            database_path,
            jwt_secret,
            token_ttl: Duration::from_secs(token_ttl_secs),
        })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_config_uses_defaults_when_unset() {
        let map: HashMap<&str, &str> = HashMap::new();
        let config =
            ServerConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
                .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
        assert_eq!(config.token_ttl, Duration::from_secs(604_800));
    }

    #[test]
    fn test_config_rejects_out_of_range_ttl() {
        let mut map = HashMap::new();
        map.insert("PROSPECT_TOKEN_TTL_SECS", "5");
        let err = ServerConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("PROSPECT_TOKEN_TTL_SECS"));
    }

    #[test]
    fn test_config_redacts_jwt_secret_in_debug() {
        let mut map = HashMap::new();
        map.insert("PROSPECT_JWT_SECRET", "sensitive-signing-key");
        let config =
            ServerConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
                .unwrap();

        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("sensitive-signing-key"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}

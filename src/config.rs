use std::{env, path::PathBuf};

use thiserror::Error;
use tracing::Level;

use crate::repositories::MongoDbInitializationInfo;

pub const DEFAULT_DATABASE: &str = "funkoFanfare";
pub const DEFAULT_COLLECTION: &str = "products";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {details}")]
    Invalid { key: &'static str, details: String },
}

#[derive(Debug)]
pub struct Config {
    pub mongodb: MongoDbInitializationInfo,
    pub token_secret: String,
    pub port: u16,
    pub log_path: Option<PathBuf>,
    pub log_level: Level,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                details: format!("{}", e),
            })?,
            None => DEFAULT_PORT,
        };

        let log_level = match lookup("LOG_LEVEL") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "LOG_LEVEL",
                details: format!("{}", e),
            })?,
            None => Level::INFO,
        };

        Ok(Config {
            mongodb: MongoDbInitializationInfo {
                uri: required("MONGODB_URI")?,
                database: lookup("MONGODB_DB").unwrap_or_else(|| String::from(DEFAULT_DATABASE)),
                collection: lookup("MONGODB_COLLECTION")
                    .unwrap_or_else(|| String::from(DEFAULT_COLLECTION)),
            },
            token_secret: required("ACCESS_TOKEN_SECRET")?,
            port,
            log_path: lookup("LOG_PATH").map(PathBuf::from),
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_fill_optional_values() {
        let config = Config::from_lookup(lookup_from(&[
            ("MONGODB_URI", "mongodb://localhost:27017"),
            ("ACCESS_TOKEN_SECRET", "shh"),
        ]))
        .unwrap();

        assert_eq!(config.mongodb.uri, "mongodb://localhost:27017");
        assert_eq!(config.mongodb.database, DEFAULT_DATABASE);
        assert_eq!(config.mongodb.collection, DEFAULT_COLLECTION);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.log_path.is_none());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("MONGODB_URI", "mongodb://db:27017"),
            ("MONGODB_DB", "catalog"),
            ("MONGODB_COLLECTION", "toys"),
            ("ACCESS_TOKEN_SECRET", "shh"),
            ("PORT", "8080"),
            ("LOG_PATH", "/tmp/toys.log"),
            ("LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.mongodb.database, "catalog");
        assert_eq!(config.mongodb.collection, "toys");
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_path, Some(PathBuf::from("/tmp/toys.log")));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn missing_secret_is_reported() {
        let result = Config::from_lookup(lookup_from(&[("MONGODB_URI", "mongodb://db")]));

        assert_eq!(result.unwrap_err(), ConfigError::Missing("ACCESS_TOKEN_SECRET"));
    }

    #[test]
    fn blank_uri_counts_as_missing() {
        let result = Config::from_lookup(lookup_from(&[
            ("MONGODB_URI", "  "),
            ("ACCESS_TOKEN_SECRET", "shh"),
        ]));

        assert_eq!(result.unwrap_err(), ConfigError::Missing("MONGODB_URI"));
    }

    #[test]
    fn bad_port_is_invalid() {
        let result = Config::from_lookup(lookup_from(&[
            ("MONGODB_URI", "mongodb://db"),
            ("ACCESS_TOKEN_SECRET", "shh"),
            ("PORT", "eighty"),
        ]));

        assert!(matches!(result, Err(ConfigError::Invalid { key: "PORT", .. })));
    }
}

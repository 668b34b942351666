use crate::constants::*;
use std::env;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: String,
    pub data_path: String,
    pub session_secret: String,
    pub log_filter: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("SESSION_SECRET environment variable is required")]
    MissingSessionSecret,
    #[error("Invalid session secret: {0}")]
    InvalidSessionSecret(String),
    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("SERVER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = lookup("SERVER_PORT").unwrap_or_else(|| DEFAULT_PORT.to_string());
        let data_path = lookup("DATABASE_PATH").unwrap_or_else(|| DEFAULT_DATA_PATH.to_string());
        let log_filter = lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        if port.parse::<u16>().is_err() {
            return Err(ConfigError::InvalidPort(port));
        }

        let session_secret = lookup("SESSION_SECRET").ok_or(ConfigError::MissingSessionSecret)?;

        if session_secret.len() < MIN_SESSION_SECRET_LENGTH {
            return Err(ConfigError::InvalidSessionSecret(format!(
                "must be at least {} bytes long",
                MIN_SESSION_SECRET_LENGTH
            )));
        }

        Ok(Config {
            host,
            port,
            data_path,
            session_secret,
            log_filter,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let secret = "s".repeat(64);
        let config = Config::from_lookup(lookup_from(&[("SESSION_SECRET", secret.as_str())])).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.data_path, DEFAULT_DATA_PATH);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn missing_secret_is_rejected() {
        let result = Config::from_lookup(lookup_from(&[]));
        assert_eq!(result.unwrap_err(), ConfigError::MissingSessionSecret);
    }

    #[test]
    fn short_secret_is_rejected() {
        let result = Config::from_lookup(lookup_from(&[("SESSION_SECRET", "short")]));
        assert!(matches!(result, Err(ConfigError::InvalidSessionSecret(_))));
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        let secret = "s".repeat(64);
        let result = Config::from_lookup(lookup_from(&[
            ("SESSION_SECRET", secret.as_str()),
            ("SERVER_PORT", "http"),
        ]));
        assert_eq!(result.unwrap_err(), ConfigError::InvalidPort("http".to_string()));
    }
}

//! Server configuration from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `TIMETABLE_BASE_URL` | RTA download servlet |
//! | `TIMETABLE_TIMEOUT_SECS` | 90 |
//! | `TIMETABLE_CACHE_DIR` | `<user cache dir>/dubai-timetables` |
//! | `TIMETABLE_BIND` | `0.0.0.0:8000` |
//! | `TIMETABLE_ACCEPT_INVALID_CERTS` | false |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::documents::TimetableClientConfig;

const CACHE_DIR_NAME: &str = "dubai-timetables";

/// Errors from reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed
    #[error("invalid value for {variable}: {value:?} ({reason})")]
    Invalid {
        variable: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration for the timetable server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub client: TimetableClientConfig,
    pub cache_dir: PathBuf,
    pub bind: SocketAddr,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self {
            client: TimetableClientConfig::new(),
            cache_dir: default_cache_dir(),
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
        }
    }

    /// Read configuration from `TIMETABLE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through a variable lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Some(url) = lookup("TIMETABLE_BASE_URL") {
            config.client = config.client.with_base_url(url);
        }

        if let Some(value) = lookup("TIMETABLE_TIMEOUT_SECS") {
            let secs: u64 = value
                .trim()
                .parse()
                .map_err(|e| invalid("TIMETABLE_TIMEOUT_SECS", &value, e))?;
            if secs == 0 {
                return Err(invalid(
                    "TIMETABLE_TIMEOUT_SECS",
                    &value,
                    "must be at least 1",
                ));
            }
            config.client = config.client.with_timeout(Duration::from_secs(secs));
        }

        if let Some(dir) = lookup("TIMETABLE_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }

        if let Some(value) = lookup("TIMETABLE_BIND") {
            config.bind = value
                .trim()
                .parse()
                .map_err(|e| invalid("TIMETABLE_BIND", &value, e))?;
        }

        if let Some(value) = lookup("TIMETABLE_ACCEPT_INVALID_CERTS") {
            let accept = parse_flag(&value).ok_or_else(|| {
                invalid("TIMETABLE_ACCEPT_INVALID_CERTS", &value, "expected a boolean")
            })?;
            config.client = config.client.with_accept_invalid_certs(accept);
        }

        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Platform cache directory, or `.cache` under the working directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join(CACHE_DIR_NAME)
}

fn invalid(variable: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        variable,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::documents::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};

    fn from_vars(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let config = from_vars(&[]).unwrap();
        assert_eq!(config.client.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.client.timeout, DEFAULT_TIMEOUT);
        assert!(!config.client.accept_invalid_certs);
        assert_eq!(config.bind, "0.0.0.0:8000".parse().unwrap());
        assert!(config.cache_dir.ends_with(CACHE_DIR_NAME));
    }

    #[test]
    fn variables_override_defaults() {
        let config = from_vars(&[
            ("TIMETABLE_BASE_URL", "http://localhost:9000/pdf"),
            ("TIMETABLE_TIMEOUT_SECS", "15"),
            ("TIMETABLE_CACHE_DIR", "/tmp/timetables"),
            ("TIMETABLE_BIND", "127.0.0.1:3000"),
            ("TIMETABLE_ACCEPT_INVALID_CERTS", "true"),
        ])
        .unwrap();

        assert_eq!(config.client.base_url, "http://localhost:9000/pdf");
        assert_eq!(config.client.timeout, Duration::from_secs(15));
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/timetables"));
        assert_eq!(config.bind, "127.0.0.1:3000".parse().unwrap());
        assert!(config.client.accept_invalid_certs);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = from_vars(&[("TIMETABLE_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("TIMETABLE_TIMEOUT_SECS"));

        let err = from_vars(&[("TIMETABLE_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(err.to_string().contains("at least 1"));

        let err = from_vars(&[("TIMETABLE_BIND", "localhost")]).unwrap_err();
        assert!(err.to_string().contains("TIMETABLE_BIND"));

        let err = from_vars(&[("TIMETABLE_ACCEPT_INVALID_CERTS", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("TIMETABLE_ACCEPT_INVALID_CERTS"));
    }

    #[test]
    fn flags() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("2"), None);
    }
}

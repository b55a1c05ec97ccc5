//! Service configuration
//!
//! Read from `SIDESHOW_*` environment variables. Every setting has a
//! default; a value that is set but unparsable is an error rather than
//! silently replaced.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

use crate::keys::KeySource;

/// Google's OpenID 2.0 identifier
pub const DEFAULT_PROVIDER: &str = "https://www.google.com/accounts/o8/id";

/// One day
pub const DEFAULT_CERT_MAX_DURATION_MS: i64 = 24 * 60 * 60 * 1000;

pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// One day
pub const DEFAULT_SESSION_DURATION_SECS: u64 = 24 * 60 * 60;

/// Path of the verification callback, relative to the public URL
pub const VERIFY_PATH: &str = "/authenticate/verify";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// URL under which browsers reach this service
    pub public_url: String,
    /// Hostname written into certificates
    pub issuer: String,
    pub cert_max_duration: chrono::Duration,
    /// OpenID identifier of the federated provider
    pub provider: String,
    pub key_path: Option<PathBuf>,
    pub provider_timeout: Duration,
    /// How long an unwritten session keeps its trust state
    pub session_duration: Duration,
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            public_url: "http://localhost:8080".into(),
            issuer: "localhost".into(),
            cert_max_duration: chrono::Duration::milliseconds(DEFAULT_CERT_MAX_DURATION_MS),
            provider: DEFAULT_PROVIDER.into(),
            key_path: None,
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            session_duration: Duration::from_secs(DEFAULT_SESSION_DURATION_SECS),
            log_level: Level::INFO,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup`, which maps variable names to values
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let public_url = get("SIDESHOW_PUBLIC_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.public_url);
        if !public_url.starts_with("http://") && !public_url.starts_with("https://") {
            return Err(invalid("SIDESHOW_PUBLIC_URL", "an http(s) URL", &public_url));
        }

        let issuer = get("SIDESHOW_ISSUER")
            .or_else(|| host_of(&public_url))
            .unwrap_or(defaults.issuer);

        let port = match get("SIDESHOW_PORT") {
            Some(v) => v
                .parse()
                .map_err(|_| invalid("SIDESHOW_PORT", "a valid port number", &v))?,
            None => defaults.port,
        };

        let cert_max_duration = match get("SIDESHOW_CERT_MAX_DURATION_MS") {
            Some(v) => match v.parse::<i64>() {
                Ok(ms) if ms > 0 => chrono::Duration::milliseconds(ms),
                _ => {
                    return Err(invalid(
                        "SIDESHOW_CERT_MAX_DURATION_MS",
                        "a positive number of milliseconds",
                        &v,
                    ))
                }
            },
            None => defaults.cert_max_duration,
        };

        let provider_timeout = match get("SIDESHOW_PROVIDER_TIMEOUT_SECS") {
            Some(v) => match v.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(invalid(
                        "SIDESHOW_PROVIDER_TIMEOUT_SECS",
                        "a positive number of seconds",
                        &v,
                    ))
                }
            },
            None => defaults.provider_timeout,
        };

        let session_duration = match get("SIDESHOW_SESSION_DURATION_SECS") {
            Some(v) => match v.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(invalid(
                        "SIDESHOW_SESSION_DURATION_SECS",
                        "a positive number of seconds",
                        &v,
                    ))
                }
            },
            None => defaults.session_duration,
        };

        let log_level = match get("SIDESHOW_LOG_LEVEL") {
            Some(v) => v
                .parse()
                .map_err(|_| invalid("SIDESHOW_LOG_LEVEL", "a log level", &v))?,
            None => defaults.log_level,
        };

        Ok(Self {
            host: get("SIDESHOW_HOST").unwrap_or(defaults.host),
            port,
            public_url,
            issuer,
            cert_max_duration,
            provider: get("SIDESHOW_PROVIDER").unwrap_or(defaults.provider),
            key_path: get("SIDESHOW_KEY_PATH").map(PathBuf::from),
            provider_timeout,
            session_duration,
            log_level,
        })
    }

    /// Whether browsers reach the service over https
    pub fn is_secure(&self) -> bool {
        self.public_url.starts_with("https://")
    }

    /// Absolute URL the provider sends the browser back to
    pub fn verify_url(&self) -> String {
        format!("{}{}", self.public_url, VERIFY_PATH)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn key_source(&self) -> KeySource {
        match &self.key_path {
            Some(path) => KeySource::File(path.clone()),
            None => KeySource::Ephemeral,
        }
    }
}

fn invalid(var: &'static str, expected: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        expected,
        value: value.to_string(),
    }
}

/// Host part of an http(s) URL, without port or path
fn host_of(url: &str) -> Option<String> {
    let rest = url.split_once("://")?.1;
    let authority = rest.split('/').next()?;
    let host = authority.rsplit_once(':').map_or(authority, |(host, _)| host);
    (!host.is_empty()).then(|| host.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.provider, DEFAULT_PROVIDER);
        assert_eq!(config.cert_max_duration.num_milliseconds(), 86_400_000);
        assert_eq!(config.issuer, "localhost");
        assert_eq!(config.key_source(), KeySource::Ephemeral);
        assert_eq!(config.session_duration, Duration::from_secs(86_400));
        assert!(!config.is_secure());
    }

    #[test]
    fn test_session_duration() {
        let config = config(&[("SIDESHOW_SESSION_DURATION_SECS", "900")]).unwrap();
        assert_eq!(config.session_duration, Duration::from_secs(900));

        assert!(matches!(
            self::config(&[("SIDESHOW_SESSION_DURATION_SECS", "0")]),
            Err(ConfigError::Invalid {
                var: "SIDESHOW_SESSION_DURATION_SECS",
                ..
            })
        ));
    }

    #[test]
    fn test_public_url() {
        let config = config(&[("SIDESHOW_PUBLIC_URL", "https://id.example.com:8443/")]).unwrap();
        assert!(config.is_secure());
        assert_eq!(config.issuer, "id.example.com");
        assert_eq!(
            config.verify_url(),
            "https://id.example.com:8443/authenticate/verify"
        );
    }

    #[test]
    fn test_explicit_issuer_wins() {
        let config = config(&[
            ("SIDESHOW_PUBLIC_URL", "https://id.example.com"),
            ("SIDESHOW_ISSUER", "example.com"),
        ])
        .unwrap();
        assert_eq!(config.issuer, "example.com");
    }

    #[test]
    fn test_key_path() {
        let config = config(&[("SIDESHOW_KEY_PATH", "/etc/sideshow/key")]).unwrap();
        assert_eq!(
            config.key_source(),
            KeySource::File(PathBuf::from("/etc/sideshow/key"))
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[("SIDESHOW_PORT", "eighty")]),
            Err(ConfigError::Invalid { var: "SIDESHOW_PORT", .. })
        ));
        assert!(config(&[("SIDESHOW_CERT_MAX_DURATION_MS", "-5")]).is_err());
        assert!(config(&[("SIDESHOW_PROVIDER_TIMEOUT_SECS", "0")]).is_err());
        assert!(config(&[("SIDESHOW_LOG_LEVEL", "loud")]).is_err());
        assert!(config(&[("SIDESHOW_PUBLIC_URL", "id.example.com")]).is_err());
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = config(&[("SIDESHOW_PORT", "  ")]).unwrap();
        assert_eq!(config.port, 8080);
    }
}

//! Runtime configuration read from the environment.

use thiserror::Error;

/// Default path to webhook TLS certificate
pub const DEFAULT_WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const DEFAULT_WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const DEFAULT_WEBHOOK_PORT: u16 = 9443;
/// Default health server port
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Configuration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable holds a value that cannot be parsed
    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Process configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub webhook_cert_path: String,
    pub webhook_key_path: String,
    pub webhook_port: u16,
    pub health_port: u16,
    /// Event reporter instance, usually the pod name
    pub pod_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhook_cert_path: DEFAULT_WEBHOOK_CERT_PATH.to_string(),
            webhook_key_path: DEFAULT_WEBHOOK_KEY_PATH.to_string(),
            webhook_port: DEFAULT_WEBHOOK_PORT,
            health_port: DEFAULT_HEALTH_PORT,
            pod_name: None,
        }
    }
}

impl Config {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            webhook_cert_path: lookup("WEBHOOK_CERT_PATH").unwrap_or(defaults.webhook_cert_path),
            webhook_key_path: lookup("WEBHOOK_KEY_PATH").unwrap_or(defaults.webhook_key_path),
            webhook_port: parse_port(&lookup, "WEBHOOK_PORT", defaults.webhook_port)?,
            health_port: parse_port(&lookup, "HEALTH_PORT", defaults.health_port)?,
            pod_name: lookup("POD_NAME").filter(|name| !name.is_empty()),
        })
    }
}

fn parse_port<F>(lookup: &F, name: &'static str, default: u16) -> Result<u16, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidValue {
                name,
                value: value.clone(),
                reason: e.to_string(),
            }),
    }
}

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
/// Minimum length of a cookie signing key
pub const SESSION_KEY_MIN_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must be true or false, got {value:?}")]
    InvalidBool { name: &'static str, value: String },
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("SESSION_KEY must be at least {min} bytes, got {0}", min = SESSION_KEY_MIN_LEN)]
    SessionKeyTooShort(usize),
}

/// Runtime settings, read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub bind_addr: String,
    pub admin_username: String,
    pub admin_password: String,
    pub data_dir: PathBuf,
    pub generator_url: Option<String>,
    pub generator_timeout: Duration,
    pub batch_delay: Duration,
    pub session_key: Option<Vec<u8>>,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let admin_password = match lookup("ADMIN_PASSWORD") {
            Some(password) if password.trim().is_empty() => return Err(ConfigError::Empty("ADMIN_PASSWORD")),
            Some(password) => password,
            None => {
                log::warn!("ADMIN_PASSWORD not set, using the default password. Change it!");
                DEFAULT_ADMIN_PASSWORD.to_string()
            }
        };

        let session_key = match get("SESSION_KEY") {
            Some(key) if key.len() < SESSION_KEY_MIN_LEN => {
                return Err(ConfigError::SessionKeyTooShort(key.len()))
            }
            Some(key) => Some(key.into_bytes()),
            None => None,
        };

        Ok(Self {
            port: parse_number("PORT", get("PORT"), DEFAULT_PORT)?,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            admin_username: get("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
            admin_password,
            data_dir: PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "data".to_string())),
            generator_url: get("GENERATOR_URL"),
            generator_timeout: Duration::from_secs(parse_number(
                "GENERATOR_TIMEOUT_SECS",
                get("GENERATOR_TIMEOUT_SECS"),
                60,
            )?),
            batch_delay: Duration::from_millis(parse_number("BATCH_DELAY_MS", get("BATCH_DELAY_MS"), 200)?),
            session_key,
            secure_cookies: parse_bool("SECURE_COOKIES", get("SECURE_COOKIES"), true)?,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        None => Ok(default),
    }
}

fn parse_bool(name: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let lowered = value.as_deref().map(str::to_ascii_lowercase);
    match lowered.as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(_) => Err(ConfigError::InvalidBool {
            name,
            value: value.unwrap_or_default(),
        }),
    }
}

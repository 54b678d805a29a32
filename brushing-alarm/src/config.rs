//! Runtime configuration, read from the environment.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;

use crate::alarm::DEFAULT_VERIFY_TIMEOUT;

pub const ENV_API_ADDR: &str = "BRUSHING_ALARM_API_ADDR";
pub const ENV_VERIFY_TIMEOUT_SECS: &str = "BRUSHING_ALARM_VERIFY_TIMEOUT_SECS";
pub const ENV_SOUND: &str = "BRUSHING_ALARM_SOUND";
pub const ENV_PLAYER: &str = "BRUSHING_ALARM_PLAYER";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_GEMINI_MODEL: &str = "GEMINI_MODEL";
pub const ENV_GEMINI_BASE_URL: &str = "GEMINI_BASE_URL";

pub const DEFAULT_API_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 7786));
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_PLAYER: &str = "aplay";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is not set")]
    Missing { name: &'static str },

    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for the image verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address the HTTP API listens on.
    pub api_addr: SocketAddr,

    /// Upper bound on a single verifier round trip. A verifier that does
    /// not answer in time counts as a service failure and the alarm keeps
    /// ringing.
    pub verify_timeout: Duration,

    /// Sound file handed to the player. Without one the player is started
    /// with no arguments, which is only useful for custom player scripts.
    pub sound_path: Option<PathBuf>,

    /// Executable that plays `sound_path` once per invocation.
    pub player: String,

    /// `None` when no API key is configured.
    pub verifier: Option<VerifierConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_addr: DEFAULT_API_ADDR,
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
            sound_path: None,
            player: DEFAULT_PLAYER.to_string(),
            verifier: None,
        }
    }
}

impl Config {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration using `lookup` to resolve variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(value) = lookup(ENV_API_ADDR) {
            config.api_addr = value.parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::Invalid {
                    name: ENV_API_ADDR,
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        if let Some(value) = lookup(ENV_VERIFY_TIMEOUT_SECS) {
            let secs: u64 = value.parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    name: ENV_VERIFY_TIMEOUT_SECS,
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    name: ENV_VERIFY_TIMEOUT_SECS,
                    value,
                    reason: "must be at least one second".into(),
                });
            }
            config.verify_timeout = Duration::from_secs(secs);
        }

        config.sound_path = lookup(ENV_SOUND)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        if let Some(player) = lookup(ENV_PLAYER).filter(|s| !s.is_empty()) {
            config.player = player;
        }

        config.verifier = lookup(ENV_GEMINI_API_KEY)
            .filter(|s| !s.is_empty())
            .map(|api_key| VerifierConfig {
                api_key,
                model: lookup(ENV_GEMINI_MODEL)
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                base_url: lookup(ENV_GEMINI_BASE_URL)
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            });

        Ok(config)
    }

    /// Verifier settings, failing if no API key was configured.
    pub fn require_verifier(&self) -> Result<&VerifierConfig, ConfigError> {
        self.verifier.as_ref().ok_or(ConfigError::Missing {
            name: ENV_GEMINI_API_KEY,
        })
    }
}

//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! `SESSION_API_BASE_URL` overrides `api.base_url` so one file can serve
//! several environments.

use serde::Deserialize;
use session_lifecycle::SessionConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Env var that overrides `api.base_url`.
pub const BASE_URL_ENV: &str = "SESSION_API_BASE_URL";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionSettings,
}

/// Agent listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Auth API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Session timing, all in seconds
#[derive(Debug, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_refresh_threshold")]
    pub refresh_threshold_secs: u64,
    #[serde(default = "default_failure_cooldown")]
    pub failure_cooldown_secs: u64,
    #[serde(default = "default_max_refresh_wait")]
    pub max_refresh_wait_secs: u64,
    #[serde(default = "default_renewal_interval")]
    pub renewal_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_threshold_secs: default_refresh_threshold(),
            failure_cooldown_secs: default_failure_cooldown(),
            max_refresh_wait_secs: default_max_refresh_wait(),
            renewal_interval_secs: default_renewal_interval(),
        }
    }
}

impl SessionSettings {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            refresh_threshold: Duration::from_secs(self.refresh_threshold_secs),
            failure_cooldown: Duration::from_secs(self.failure_cooldown_secs),
            max_refresh_wait: Duration::from_secs(self.max_refresh_wait_secs),
        }
    }

    pub fn renewal_interval(&self) -> Duration {
        Duration::from_secs(self.renewal_interval_secs)
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_max_connections() -> usize {
    256
}

fn default_timeout() -> u64 {
    30
}

fn default_refresh_threshold() -> u64 {
    session_lifecycle::config::DEFAULT_REFRESH_THRESHOLD.as_secs()
}

fn default_failure_cooldown() -> u64 {
    session_lifecycle::config::DEFAULT_FAILURE_COOLDOWN.as_secs()
}

fn default_max_refresh_wait() -> u64 {
    session_lifecycle::config::DEFAULT_MAX_REFRESH_WAIT.as_secs()
}

fn default_renewal_interval() -> u64 {
    60
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let mut config: Config = common::load_toml(path)?;

        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            config.api.base_url = base_url;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        let nonzero = [
            ("timeout_secs", self.api.timeout_secs),
            ("max_connections", self.server.max_connections as u64),
            ("max_refresh_wait_secs", self.session.max_refresh_wait_secs),
            ("renewal_interval_secs", self.session.renewal_interval_secs),
        ];
        for (name, value) in nonzero {
            if value == 0 {
                return Err(common::Error::Config(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("session-agent.toml")
    }
}

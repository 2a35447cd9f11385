//! Client configuration
//!
//! Loaded from a YAML file, from `FLEET_*` environment variables, or built in
//! code. The mode is read once at client construction and never changes.

use crate::error::{Error, Result};
use crate::gate::ClientMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_ENDPOINT: &str = "FLEET_ENDPOINT";
pub const ENV_READ_ONLY: &str = "FLEET_READ_ONLY";
pub const ENV_TIMEOUT: &str = "FLEET_TIMEOUT";
pub const ENV_NAMESPACE: &str = "FLEET_NAMESPACE";
pub const ENV_LOG_LEVEL: &str = "FLEET_LOG_LEVEL";
pub const ENV_LOG_JSON: &str = "FLEET_LOG_JSON";

/// Upper bound on the per-call timeout
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// =============================================================================
// TLS
// =============================================================================

/// TLS settings handed to the transport connector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    #[serde(default)]
    pub insecure_skip_verify: bool,

    #[serde(default)]
    pub ca_file: Option<PathBuf>,

    #[serde(default)]
    pub server_name: Option<String>,
}

// =============================================================================
// Logging
// =============================================================================

/// Logging settings used by [`crate::telemetry::init_tracing`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output logs as JSON
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for [`crate::client::ResourceClient`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Service endpoint, e.g. `https://fleet.example.dev:443`
    pub endpoint: String,

    #[serde(default)]
    pub mode: ClientMode,

    /// Per-call timeout; every call's deadline is derived from it
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    #[serde(default)]
    pub tls: TlsConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            mode: ClientMode::default(),
            timeout: default_timeout(),
            default_namespace: default_namespace(),
            tls: TlsConfig::default(),
            log: LogConfig::default(),
        }
    }

    pub fn read_only(mut self) -> Self {
        self.mode = ClientMode::ReadOnly;
        self
    }

    pub fn with_mode(mut self, mode: ClientMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self =
            serde_yaml::from_str(&raw).map_err(|e| Error::parse(path.display().to_string(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `FLEET_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let endpoint = lookup(ENV_ENDPOINT)
            .ok_or_else(|| Error::Configuration(format!("{} is not set", ENV_ENDPOINT)))?;
        let mut config = Self::new(endpoint);

        if let Some(read_only) = lookup(ENV_READ_ONLY) {
            config.mode = match read_only.to_lowercase().as_str() {
                "1" | "true" | "yes" => ClientMode::ReadOnly,
                "0" | "false" | "no" | "" => ClientMode::ReadWrite,
                other => {
                    return Err(Error::Configuration(format!(
                        "invalid {} value: {}",
                        ENV_READ_ONLY, other
                    )))
                }
            };
        }

        if let Some(timeout) = lookup(ENV_TIMEOUT) {
            config.timeout = humantime_serde::re::humantime::parse_duration(&timeout)
                .map_err(|e| Error::Configuration(format!("invalid {}: {}", ENV_TIMEOUT, e)))?;
        }

        if let Some(namespace) = lookup(ENV_NAMESPACE) {
            config.default_namespace = namespace;
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.log.level = level;
        }

        if let Some(json) = lookup(ENV_LOG_JSON) {
            config.log.json = matches!(json.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::Configuration("endpoint must not be empty".into()));
        }
        if self.timeout.is_zero() {
            return Err(Error::Configuration("timeout must be greater than zero".into()));
        }
        if self.timeout > MAX_TIMEOUT {
            return Err(Error::Configuration(format!(
                "timeout must not exceed {}",
                humantime_serde::re::humantime::format_duration(MAX_TIMEOUT)
            )));
        }
        if self.default_namespace.trim().is_empty() {
            return Err(Error::Configuration("default namespace must not be empty".into()));
        }
        Ok(())
    }
}

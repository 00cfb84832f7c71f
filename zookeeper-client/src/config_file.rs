//! Declarative configuration loading from YAML, TOML, and environment variables.
//!
//! [`FileConfig`] mirrors [`ClientConfig`](crate::config::ClientConfig) with
//! serde-friendly fields and converts into it through the builder, so file
//! and programmatic configuration share the same validation.
//!
//! # Supported Formats
//!
//! - **YAML** (requires `config-file` feature): `ClientConfig::from_yaml("zk.yaml")`
//! - **TOML** (requires `config-file` feature): `ClientConfig::from_toml("zk.toml")`
//! - **Environment Variables** (always available): `ClientConfig::from_env()`
//!
//! # Example YAML
//!
//! ```yaml
//! connect-string: "zk1:2181,zk2:2181,zk3:2181/app"
//! session-timeout-ms: 15000
//! spin-delay-ms: 500
//! retry:
//!   retries: 3
//!   initial-backoff-ms: 1000
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ClientConfig, ClientConfigBuilder, ConfigError};

/// Top-level file-based configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileConfig {
    /// Comma-separated `host:port` list with an optional chroot suffix.
    pub connect_string: Option<String>,
    /// Requested session timeout in milliseconds.
    pub session_timeout_ms: Option<u64>,
    /// Delay between attempts to reach successive servers, in milliseconds.
    pub spin_delay_ms: Option<u64>,
    /// Retry configuration.
    pub retry: Option<FileRetryConfig>,
}

/// File-based retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileRetryConfig {
    /// Number of retries after a lost connection.
    pub retries: Option<u32>,
    /// Delay before the first retry in milliseconds.
    pub initial_backoff_ms: Option<u64>,
}

impl TryFrom<FileConfig> for ClientConfig {
    type Error = ConfigError;

    fn try_from(file: FileConfig) -> Result<Self, Self::Error> {
        let mut builder = ClientConfigBuilder::new();

        if let Some(connect_string) = file.connect_string {
            builder = builder.connect_string(connect_string);
        }

        if let Some(ms) = file.session_timeout_ms {
            builder = builder.session_timeout(Duration::from_millis(ms));
        }

        if let Some(ms) = file.spin_delay_ms {
            builder = builder.spin_delay(Duration::from_millis(ms));
        }

        if let Some(retry) = file.retry {
            builder = builder.retry(|mut r| {
                if let Some(n) = retry.retries {
                    r = r.retries(n);
                }
                if let Some(ms) = retry.initial_backoff_ms {
                    r = r.initial_backoff(Duration::from_millis(ms));
                }
                r
            });
        }

        builder.build()
    }
}

fn env_millis(name: &str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::new(format!("{name} must be an integer, got {val:?}"))),
        Err(_) => Ok(None),
    }
}

impl ClientConfig {
    /// Loads configuration from a YAML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_yaml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::new(format!("failed to read YAML config file: {e}"))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parses configuration from YAML text.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let file_config: FileConfig = serde_yaml::from_str(content).map_err(|e| {
            ConfigError::new(format!("failed to parse YAML config: {e}"))
        })?;
        file_config.try_into()
    }

    /// Loads configuration from a TOML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::new(format!("failed to read TOML config file: {e}"))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file_config: FileConfig = toml_crate::from_str(content).map_err(|e| {
            ConfigError::new(format!("failed to parse TOML config: {e}"))
        })?;
        file_config.try_into()
    }

    /// Loads configuration from environment variables.
    ///
    /// | Variable | Maps to |
    /// |----------|---------|
    /// | `ZK_CONNECT_STRING` | `connect_string` |
    /// | `ZK_SESSION_TIMEOUT_MS` | Session timeout in milliseconds |
    /// | `ZK_SPIN_DELAY_MS` | Spin delay in milliseconds |
    /// | `ZK_RETRIES` | Retries after a lost connection |
    ///
    /// Unset variables keep their defaults; malformed numbers are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut file_config = FileConfig::default();

        if let Ok(val) = std::env::var("ZK_CONNECT_STRING") {
            file_config.connect_string = Some(val);
        }

        file_config.session_timeout_ms = env_millis("ZK_SESSION_TIMEOUT_MS")?;
        file_config.spin_delay_ms = env_millis("ZK_SPIN_DELAY_MS")?;

        if let Ok(val) = std::env::var("ZK_RETRIES") {
            let retries = val
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::new(format!("ZK_RETRIES must be an integer, got {val:?}")))?;
            file_config.retry.get_or_insert_with(Default::default).retries = Some(retries);
        }

        file_config.try_into()
    }
}

/// Loads a configuration file, detecting the format by extension.
///
/// Supports `.yaml`, `.yml`, and `.toml` extensions.
/// Requires the `config-file` feature.
#[cfg(feature = "config-file")]
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> Result<ClientConfig, ConfigError> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => ClientConfig::from_yaml(path),
        Some("toml") => ClientConfig::from_toml(path),
        Some(ext) => Err(ConfigError::new(format!(
            "unsupported config file extension: .{ext} (expected .yaml, .yml, or .toml)"
        ))),
        None => Err(ConfigError::new(
            "config file has no extension; expected .yaml, .yml, or .toml",
        )),
    }
}

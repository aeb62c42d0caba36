//! Configuration.
//!
//! Layered: optional TOML file, then environment variables with a
//! `TOPICFS__` prefix (double underscore for nesting), then CLI flags
//! applied by `main`. Examples:
//!
//! - `TOPICFS__MQTT__HOST=broker.local`
//! - `TOPICFS__MQTT__HOLDBACK_MS=500`
//! - `TOPICFS__LOG__LEVEL=debug`

use std::path::PathBuf;

use config::{Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::Error;

/// Default broker host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default broker port.
pub const DEFAULT_PORT: u16 = 1883;

/// Default CONNECT keepalive in seconds.
pub const DEFAULT_KEEPALIVE: u16 = 60;

/// Default config file looked up when no `-c` is given.
pub const DEFAULT_CONFIG_PATH: &str = "topicfs.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration.
    pub log: LogConfig,
    /// Broker connection configuration.
    pub mqtt: MqttConfig,
    /// Mount configuration.
    pub mount: MountConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: error, warn, info, debug, trace.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Broker connection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host (hostname or IP literal).
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// CONNECT keepalive in seconds.
    pub keepalive: u16,
    /// Delay between a write and the matching PUBLISH, in
    /// milliseconds.
    pub holdback_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            keepalive: DEFAULT_KEEPALIVE,
            holdback_ms: 0,
        }
    }
}

/// Mount configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    /// Where to attach the filesystem. Usually supplied on the
    /// command line.
    pub mountpoint: Option<PathBuf>,
    /// Pass `allow_other` to the kernel.
    pub allow_other: bool,
}

impl Config {
    /// Load configuration from a TOML file (optional unless named
    /// explicitly) and the environment.
    pub fn load(path: Option<&str>) -> Result<Self, Error> {
        let file = match path {
            Some(path) => File::new(path, FileFormat::Toml),
            None => File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(false),
        };
        let loaded = config::Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("TOPICFS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;
        loaded
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject values outside their domain before anything connects or
    /// mounts.
    pub fn validate(&self) -> Result<(), Error> {
        if self.mqtt.port == 0 {
            return Err(Error::Config("port must be in 1..=65535".to_string()));
        }
        if self.mqtt.keepalive == 0 {
            return Err(Error::Config("keepalive must be in 1..=65535".to_string()));
        }
        if self.mount.mountpoint.is_none() {
            return Err(Error::Config("mountpoint is required".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        let mut config = Config::default();
        config.mount.mountpoint = Some(PathBuf::from("/mnt/topics"));
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.mqtt.host, "127.0.0.1");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.keepalive, 60);
        assert_eq!(config.mqtt.holdback_ms, 0);
        assert_eq!(config.log.level, "info");
        assert!(config.mount.mountpoint.is_none());
        assert!(!config.mount.allow_other);
    }

    #[test]
    fn test_validate_accepts_good_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_port_zero() {
        let mut config = valid();
        config.mqtt.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_keepalive_zero() {
        let mut config = valid();
        config.mqtt.keepalive = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_mountpoint() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("TOPICFS__MQTT__PORT", "2883");
        let config = Config::load(None).unwrap();
        std::env::remove_var("TOPICFS__MQTT__PORT");
        assert_eq!(config.mqtt.port, 2883);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        assert!(Config::load(Some("/nonexistent/topicfs.toml")).is_err());
    }
}

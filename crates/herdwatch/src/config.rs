//! Application Configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `HERDWATCH_` environment variables (`__` separates sections, e.g.
//! `HERDWATCH_UPSTREAM__HOST`). CLI flags are applied on top by the binary.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::bridge::{BridgeConfig, MqttConfig};
use crate::geofence::GeofenceConfig;
use crate::simulator::SimulatorConfig;

/// Config file read when no `--config` path is given
pub const DEFAULT_CONFIG_FILE: &str = "herdwatch.toml";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "HERDWATCH_";

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server address {}:{}: {}", self.host, self.port, e)))
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: MqttConfig,
    pub bridge: BridgeConfig,
    pub geofence: GeofenceConfig,
    pub simulator: SimulatorConfig,
}

impl AppConfig {
    /// Load configuration from `path` (or `herdwatch.toml` if present) and the environment
    ///
    /// An explicit path that does not exist is an error; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
        }
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        Self::from_figment(Self::figment(file).merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Defaults merged with a TOML file; a missing file contributes nothing
    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::file(file))
    }

    /// Extract and validate a config from an assembled figment
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the type system does not
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.host.trim().is_empty() {
            return Err(ConfigError::Invalid("upstream.host must not be empty".into()));
        }
        if self.upstream.topic.trim().is_empty() {
            return Err(ConfigError::Invalid("upstream.topic must not be empty".into()));
        }
        if self.upstream.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid("upstream.connect_timeout_secs must be positive".into()));
        }
        if self.upstream.reconnect_min_ms == 0 || self.upstream.reconnect_min_ms > self.upstream.reconnect_max_ms {
            return Err(ConfigError::Invalid(
                "upstream.reconnect_min_ms must be positive and not exceed reconnect_max_ms".into(),
            ));
        }
        if self.bridge.write_timeout_ms == 0 {
            return Err(ConfigError::Invalid("bridge.write_timeout_ms must be positive".into()));
        }
        if self.simulator.interval_secs == 0 {
            return Err(ConfigError::Invalid("simulator.interval_secs must be positive".into()));
        }
        self.geofence
            .generator
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("geofence.generator: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_figment(AppConfig::figment(Path::new("does-not-exist.toml"))).unwrap();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.upstream.topic, "livestock/data");
        assert_eq!(config.upstream.port, 1883);
        assert_eq!(config.bridge.write_timeout_ms, 2_000);
        assert_eq!(config.geofence.fence_key, "savedFence");
        assert_eq!(config.geofence.generator.count, 15);
        assert_eq!(config.simulator.interval_secs, 5);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = toml_file(
            r#"
            [server]
            port = 8080

            [upstream]
            host = "broker.hivemq.com"
            topic = "farm/+/data"

            [geofence.generator]
            count = 20
            "#,
        );

        let config = AppConfig::from_figment(AppConfig::figment(file.path())).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.upstream.host, "broker.hivemq.com");
        assert_eq!(config.upstream.topic, "farm/+/data");
        assert_eq!(config.upstream.keep_alive_secs, 30);
        assert_eq!(config.geofence.generator.count, 20);
        assert_eq!(config.geofence.generator.inside_fraction, 0.7);
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/herdwatch.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_invalid_values() {
        let file = toml_file("[upstream]\ntopic = \"\"\n");
        let err = AppConfig::from_figment(AppConfig::figment(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let file = toml_file("[geofence.generator]\ninside_fraction = 1.5\n");
        let err = AppConfig::from_figment(AppConfig::figment(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_type_mismatch() {
        let file = toml_file("[server]\nport = \"not a port\"\n");
        let err = AppConfig::from_figment(AppConfig::figment(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Extract(_)));
    }

    #[test]
    fn test_server_addr() {
        let server = ServerConfig {
            host: "127.0.0.1".into(),
            port: 3001,
        };
        assert_eq!(server.addr().unwrap().port(), 3001);

        let server = ServerConfig {
            host: "not a host".into(),
            port: 3001,
        };
        assert!(server.addr().is_err());
    }
}

//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: Hardcoded in struct `Default` implementations
//! 2. **Config file**: TOML file specified by `FEEWATCH_CONFIG` env var
//! 3. **Environment variables**: `FEEWATCH__*` env vars override fields
//!
//! # Example
//!
//! ```toml
//! [connection]
//! network = "mainnet"
//! poll_interval_ms = 4000
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

use std::{path::Path, time::Duration};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::connection::resolver::{ConnectionSpec, NetworkRef};

/// Node connection settings.
///
/// The fields describe alternative ways to reach a node; exactly one
/// takes effect, in priority order: explicit `url`, Infura credentials,
/// Alchemy credentials, named `network`/`chain_id`, public mainnet
/// default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Named network (e.g., "mainnet", "sepolia").
    #[serde(default)]
    pub network: Option<String>,

    /// Network selected by chain id instead of name.
    #[serde(default)]
    pub chain_id: Option<u64>,

    /// Explicit JSON-RPC endpoint URL. Must start with `http`, `https`,
    /// `ws`, or `wss`.
    #[serde(default)]
    pub url: Option<String>,

    /// Infura project id; selects the Infura endpoint for the network.
    #[serde(default)]
    pub infura_project_id: Option<String>,

    /// Optional Infura project secret, sent as basic auth.
    #[serde(default)]
    pub infura_project_secret: Option<String>,

    /// Alchemy API key; selects the Alchemy endpoint for the network.
    #[serde(default)]
    pub alchemy_api_key: Option<String>,

    /// Polling cadence in milliseconds for endpoints without a WebSocket
    /// feed. Defaults to `4000`.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    4000
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            network: None,
            chain_id: None,
            url: None,
            infura_project_id: None,
            infura_project_secret: None,
            alchemy_api_key: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "feewatch_core=debug"). Defaults
    /// to `"info"`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format, `"pretty"` or `"json"`. Defaults to `"pretty"`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Node connection settings.
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable
    /// overrides.
    ///
    /// Environment variables with the `FEEWATCH__` prefix override any
    /// value, with `__` separating nested fields (e.g.,
    /// `FEEWATCH__CONNECTION__NETWORK=sepolia`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or
    /// deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("connection.poll_interval_ms", 4000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("FEEWATCH").separator("__"))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads configuration from `config/config.toml` with fallback to
    /// defaults. The path can be overridden via `FEEWATCH_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("FEEWATCH_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        let c = &self.connection;

        if let Some(url) = &c.url {
            let ok = ["http://", "https://", "ws://", "wss://"]
                .iter()
                .any(|scheme| url.starts_with(scheme));
            if !ok {
                return Err(format!("Invalid endpoint URL: {url}"));
            }
        }

        if c.network.is_some() && c.chain_id.is_some() {
            return Err("Specify either network or chain_id, not both".to_string());
        }

        if c.infura_project_id.is_some() && c.alchemy_api_key.is_some() {
            return Err("Specify either Infura or Alchemy credentials, not both".to_string());
        }

        if c.poll_interval_ms == 0 {
            return Err("Poll interval must be greater than 0".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }

    /// Returns the polling cadence as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.connection.poll_interval_ms)
    }

    /// Builds the connection spec the settings describe.
    #[must_use]
    pub fn connection_spec(&self) -> ConnectionSpec {
        let c = &self.connection;

        let network_ref = match (&c.network, c.chain_id) {
            (Some(name), _) => Some(NetworkRef::Name(name.clone())),
            (None, Some(chain_id)) => Some(NetworkRef::ChainId(chain_id)),
            (None, None) => None,
        };

        if let Some(url) = &c.url {
            return ConnectionSpec::Url { url: url.clone() };
        }
        if let Some(project_id) = &c.infura_project_id {
            return ConnectionSpec::Infura {
                network: network_ref
                    .unwrap_or_else(|| NetworkRef::Name("mainnet".to_string())),
                project_id: project_id.clone(),
                project_secret: c.infura_project_secret.clone(),
            };
        }
        if let Some(api_key) = &c.alchemy_api_key {
            return ConnectionSpec::Alchemy {
                network: network_ref
                    .unwrap_or_else(|| NetworkRef::Name("mainnet".to_string())),
                api_key: api_key.clone(),
            };
        }
        match network_ref {
            Some(network) => ConnectionSpec::Named(network),
            None => ConnectionSpec::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_millis(4000));
        assert_eq!(config.connection_spec(), ConnectionSpec::Default);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_connection_spec_priority() {
        let mut config = AppConfig::default();
        config.connection.network = Some("sepolia".to_string());
        config.connection.alchemy_api_key = Some("key".to_string());
        config.connection.url = Some("https://rpc.example.com".to_string());

        // Explicit URL wins over credentials and named network.
        assert_eq!(
            config.connection_spec(),
            ConnectionSpec::Url { url: "https://rpc.example.com".to_string() }
        );

        config.connection.url = None;
        assert_eq!(
            config.connection_spec(),
            ConnectionSpec::Alchemy {
                network: NetworkRef::Name("sepolia".to_string()),
                api_key: "key".to_string(),
            }
        );

        config.connection.alchemy_api_key = None;
        assert_eq!(
            config.connection_spec(),
            ConnectionSpec::Named(NetworkRef::Name("sepolia".to_string()))
        );
    }

    #[test]
    fn test_infura_spec_defaults_to_mainnet() {
        let mut config = AppConfig::default();
        config.connection.infura_project_id = Some("abc".to_string());

        assert_eq!(
            config.connection_spec(),
            ConnectionSpec::Infura {
                network: NetworkRef::Name("mainnet".to_string()),
                project_id: "abc".to_string(),
                project_secret: None,
            }
        );
    }

    #[test]
    fn test_chain_id_selects_network() {
        let mut config = AppConfig::default();
        config.connection.chain_id = Some(137);

        assert_eq!(config.connection_spec(), ConnectionSpec::Named(NetworkRef::ChainId(137)));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = AppConfig::default();
        config.connection.url = Some("ftp://example.com".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_conflicting_selectors() {
        let mut config = AppConfig::default();
        config.connection.network = Some("mainnet".to_string());
        config.connection.chain_id = Some(1);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.connection.infura_project_id = Some("a".to_string());
        config.connection.alchemy_api_key = Some("b".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_logging_format() {
        let mut config = AppConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [connection]
            network = "sepolia"
            poll_interval_ms = 1000

            [logging]
            level = "debug"
            format = "json"
        "#;
        let config: AppConfig = toml::from_str(toml_str).expect("valid toml");

        assert_eq!(config.connection.network.as_deref(), Some("sepolia"));
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.logging.format, "json");
        assert!(config.validate().is_ok());
    }
}

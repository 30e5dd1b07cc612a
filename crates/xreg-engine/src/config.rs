//! Registry configuration
//!
//! Loaded from, in increasing precedence:
//! - built-in defaults
//! - an optional TOML file
//! - `XREG_*` environment variables (`__` separates nested keys)
//!
//! ```toml
//! base_url = "https://registry.example.com"
//! registry_id = "main"
//! database = "/var/lib/xreg/registry.db"
//! log_profile = "production"
//! request_timeout_ms = 2000
//! model_path = "model.json"
//!
//! [capabilities]
//! filter = true
//! inline = true
//! ```

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use xreg_core::logging_facility::{self, Profile};
use xreg_core::CapabilitySet;

use crate::errors::EngineError;

/// Value of `database` selecting the in-memory store
pub const IN_MEMORY: &str = ":memory:";

const ENV_PREFIX: &str = "XREG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegistryConfig {
    /// Prefix of every rendered URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_registry_id")]
    pub registry_id: String,

    /// `:memory:` or a SQLite file path
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default)]
    pub log_profile: Profile,

    /// Per-request deadline; none when unset
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    #[serde(default)]
    pub capabilities: CapabilitySet,

    /// JSON model document; the default model has no groups
    #[serde(default)]
    pub model_path: Option<PathBuf>,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_registry_id() -> String {
    "xRegistry".to_string()
}

fn default_database() -> String {
    IN_MEMORY.to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            registry_id: default_registry_id(),
            database: default_database(),
            log_profile: Profile::default(),
            request_timeout_ms: None,
            capabilities: CapabilitySet::default(),
            model_path: None,
        }
    }
}

impl RegistryConfig {
    /// Load from an optional file plus the process environment
    ///
    /// # Errors
    ///
    /// Returns `Config` when the file is missing or a value has the wrong
    /// shape.
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    /// Load with an explicit environment source
    ///
    /// # Errors
    ///
    /// As [`RegistryConfig::load`].
    pub fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, EngineError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            env.prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        tracing::debug!(database = %config.database, base_url = %config.base_url, "configuration loaded");
        Ok(config)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn is_in_memory(&self) -> bool {
        self.database == IN_MEMORY
    }

    /// Install the process-wide subscriber for `log_profile`
    pub fn init_logging(&self) {
        logging_facility::init(self.log_profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.registry_id, "xRegistry");
        assert!(config.is_in_memory());
        assert_eq!(config.request_timeout(), None);
        assert!(config.capabilities.filter && config.capabilities.inline);
    }

    #[test]
    fn test_empty_environment_yields_defaults() {
        let env = Environment::with_prefix(ENV_PREFIX).source(Some(config::Map::new()));
        let config = RegistryConfig::load_with_env(None, env).unwrap();
        assert_eq!(config, RegistryConfig::default());
    }
}

//! Startup errors for the engine
//!
//! Request failures stay `RegistryError` and become HTTP responses; these
//! cover building a [`crate::Registry`] from configuration.

use thiserror::Error;
use xreg_core::RegistryError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

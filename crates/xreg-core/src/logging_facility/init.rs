//! Logging initialization module

use serde::Deserialize;
use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Logging profile configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Human-readable output for development
    #[default]
    Development,
    /// JSON structured output for production
    Production,
    /// No output; tests install a capture layer instead
    Test,
}

impl Profile {
    /// Filter used when `RUST_LOG` is unset
    fn default_directive(self) -> &'static str {
        match self {
            Profile::Development => "xreg=debug",
            Profile::Production => "xreg=info",
            Profile::Test => "off",
        }
    }
}

static INSTALLED: Once = Once::new();

/// Install the process-wide subscriber for `profile`
///
/// Only the first call has an effect. `RUST_LOG` takes precedence over the
/// profile's default filter. Development prints human-readable lines,
/// production prints one JSON object per event, and the test profile
/// installs a bare registry so `init_test_capture` can attach its layer.
pub fn init(profile: Profile) {
    INSTALLED.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(profile.default_directive()));
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        let _ = match profile {
            Profile::Development => builder.try_init(),
            Profile::Production => builder.json().try_init(),
            Profile::Test => tracing_subscriber::registry().try_init().map_err(Into::into),
        };
    });
}

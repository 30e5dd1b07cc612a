//! Feature flags negotiated with clients

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const FEATURE_FILTER: &str = "filter";
pub const FEATURE_INLINE: &str = "inline";

pub const SPEC_VERSION: &str = "1.0-rc1";

pub trait Capabilities: Send + Sync {
    fn is_feature_enabled(&self, flag: &str) -> bool;

    /// Document rendered under `capabilities`
    fn document(&self) -> Value;
}

/// Static capability set taken from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    #[serde(default = "enabled")]
    pub filter: bool,
    #[serde(default = "enabled")]
    pub inline: bool,
}

fn enabled() -> bool {
    true
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self {
            filter: true,
            inline: true,
        }
    }
}

impl Capabilities for CapabilitySet {
    fn is_feature_enabled(&self, flag: &str) -> bool {
        match flag {
            FEATURE_FILTER => self.filter,
            FEATURE_INLINE => self.inline,
            _ => false,
        }
    }

    fn document(&self) -> Value {
        let flags: Vec<&str> = [(FEATURE_FILTER, self.filter), (FEATURE_INLINE, self.inline)]
            .into_iter()
            .filter_map(|(name, on)| on.then_some(name))
            .collect();
        json!({
            "flags": flags,
            "specversions": [SPEC_VERSION],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_flag_is_reported_off() {
        let caps = CapabilitySet {
            filter: false,
            inline: true,
        };
        assert!(!caps.is_feature_enabled(FEATURE_FILTER));
        assert!(caps.is_feature_enabled(FEATURE_INLINE));
        assert!(!caps.is_feature_enabled("pagination"));
        assert_eq!(caps.document()["flags"], json!(["inline"]));
    }

    #[test]
    fn test_missing_keys_default_on() {
        let caps: CapabilitySet = serde_json::from_str("{}").unwrap();
        assert_eq!(caps, CapabilitySet::default());
    }
}

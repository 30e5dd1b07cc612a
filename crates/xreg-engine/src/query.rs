//! Query parameters understood by the engine

use xreg_core::capabilities::{FEATURE_FILTER, FEATURE_INLINE};
use xreg_core::{Capabilities, RegistryError, Result, SetDefault};

pub const INLINE: &str = "inline";
pub const FILTER: &str = "filter";
pub const EXPORT: &str = "export";
pub const NESTED: &str = "nested";
pub const EPOCH: &str = "epoch";
pub const SET_DEFAULT_VERSION_ID: &str = "setdefaultversionid";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Combined `inline` directive; `Some("")` embeds everything
    pub inline: Option<String>,
    /// One entry per `filter` parameter (OR'd)
    pub filters: Vec<String>,
    pub export: bool,
    /// Process nested collections in a write body
    pub nested: bool,
    pub set_default: Option<SetDefault>,
    /// Expected epoch for a DELETE
    pub epoch: Option<i64>,
}

/// A bare flag (`?nested`) or any value but `false` turns it on
fn flag(value: &str) -> bool {
    !value.eq_ignore_ascii_case("false")
}

impl RequestOptions {
    /// Collect options from query pairs; parameters whose capability is
    /// disabled are ignored
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` for a non-integer `epoch` or an empty
    /// `setdefaultversionid`.
    pub fn from_query(query: &[(String, String)], capabilities: &dyn Capabilities) -> Result<Self> {
        let mut opts = Self::default();
        let mut inlines: Vec<&str> = Vec::new();

        for (key, value) in query {
            match key.as_str() {
                INLINE if capabilities.is_feature_enabled(FEATURE_INLINE) => inlines.push(value.as_str()),
                FILTER if capabilities.is_feature_enabled(FEATURE_FILTER) => {
                    opts.filters.push(value.clone())
                }
                EXPORT => opts.export = flag(value),
                NESTED => opts.nested = flag(value),
                EPOCH => {
                    let epoch = value.trim().parse::<i64>().map_err(|_| {
                        RegistryError::invalid_data(format!("Invalid 'epoch' value: {}", value))
                    })?;
                    opts.epoch = Some(epoch);
                }
                SET_DEFAULT_VERSION_ID => {
                    if value.is_empty() {
                        return Err(RegistryError::invalid_data(
                            "\"setdefaultversionid\" must not be empty",
                        ));
                    }
                    opts.set_default = Some(SetDefault::parse(value));
                }
                _ => {}
            }
        }

        if !inlines.is_empty() {
            opts.inline = Some(if inlines.iter().any(|v| v.trim().is_empty()) {
                String::new()
            } else {
                inlines.join(",")
            });
        }
        Ok(opts)
    }
}

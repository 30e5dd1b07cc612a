//! Command inventory for the write path
//!
//! A write request is first planned into an ordered list of commands (pure,
//! no store access), then every command is applied inside one transaction
//! by [`crate::apply::apply`].

use serde_json::{Map, Value};
use xreg_core_types::attrs::{SET_DEFAULT_NULL, SET_DEFAULT_REQUEST};

use crate::codec::DocumentInput;
use crate::model::EntityPath;

/// How a write combines with what is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// PUT / POST: attributes not supplied are removed
    Replace,
    /// PATCH: attributes not supplied are kept, `null` removes
    Merge,
}

/// Value of the `setdefaultversionid` option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetDefault {
    /// Pin this version
    Version(String),
    /// The version this request wrote last
    Request,
    /// Stop pinning and track the newest version
    Float,
}

impl SetDefault {
    pub fn parse(value: &str) -> Self {
        match value {
            SET_DEFAULT_REQUEST => SetDefault::Request,
            SET_DEFAULT_NULL => SetDefault::Float,
            id => SetDefault::Version(id.to_string()),
        }
    }
}

/// Client attributes for one entity, with `epoch` pulled out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrWrite {
    pub epoch: Option<i64>,
    pub attrs: Map<String, Value>,
}

/// Content for one version
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionWrite {
    /// Version id named by the client, if any
    pub vid: Option<String>,
    pub epoch: Option<i64>,
    pub attrs: Map<String, Value>,
    pub doc: Option<DocumentInput>,
}

impl VersionWrite {
    pub fn is_empty(&self) -> bool {
        self.vid.is_none() && self.epoch.is_none() && self.attrs.is_empty() && self.doc.is_none()
    }
}

/// Meta fields other than the default-version pointer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaWrite {
    pub epoch: Option<i64>,
    /// `Some(None)` is an explicit `null`
    pub xref: Option<Option<String>>,
    pub attrs: Map<String, Value>,
}

/// Explicit default-version fields from a meta body
///
/// Outer `None` means "not supplied", `Some(None)` an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultWrite {
    pub id: Option<Option<String>>,
    pub sticky: Option<Option<bool>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Create the group if it is missing (implicit ancestor)
    EnsureGroup { path: EntityPath },

    UpsertRegistry { write: AttrWrite, mode: WriteMode },

    UpsertGroup {
        path: EntityPath,
        write: AttrWrite,
        mode: WriteMode,
    },

    /// Create the resource if needed, apply meta fields (incl. xref) and
    /// write resource-level attributes to the target version
    UpsertResource {
        path: EntityPath,
        mode: WriteMode,
        version: Option<VersionWrite>,
        meta: Option<MetaWrite>,
    },

    UpsertVersion {
        resource: EntityPath,
        write: VersionWrite,
        mode: WriteMode,
    },

    /// Ensure a version exists, run the default-version state machine and
    /// enforce `maxversions`
    SettleResource {
        path: EntityPath,
        default: DefaultWrite,
        set_default: Option<SetDefault>,
    },

    DeleteEntity {
        path: EntityPath,
        epoch: Option<i64>,
        set_default: Option<SetDefault>,
        /// A missing entity is `NotFound` rather than skipped
        must_exist: bool,
    },
}

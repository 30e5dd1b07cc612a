//! Well-known attribute names on the wire
//!
//! Collection-specific names (`<singular>id`, `<plural>url`, `<plural>count`)
//! are built from the model at runtime; everything fixed lives here.

pub const SPECVERSION: &str = "specversion";
pub const REGISTRYID: &str = "registryid";
pub const VERSIONID: &str = "versionid";
pub const SELF: &str = "self";
pub const XID: &str = "xid";
pub const EPOCH: &str = "epoch";
pub const NAME: &str = "name";
pub const ISDEFAULT: &str = "isdefault";
pub const DESCRIPTION: &str = "description";
pub const DOCUMENTATION: &str = "documentation";
pub const TAGS: &str = "tags";
pub const CREATEDAT: &str = "createdat";
pub const MODIFIEDAT: &str = "modifiedat";
pub const CONTENTTYPE: &str = "contenttype";
pub const READONLY: &str = "readonly";
pub const XREF: &str = "xref";
pub const DEFAULTVERSIONID: &str = "defaultversionid";
pub const DEFAULTVERSIONURL: &str = "defaultversionurl";
pub const DEFAULTVERSIONSTICKY: &str = "defaultversionsticky";
pub const META: &str = "meta";
pub const METAURL: &str = "metaurl";
pub const VERSIONS: &str = "versions";
pub const MODEL: &str = "model";
pub const CAPABILITIES: &str = "capabilities";

/// Query-parameter / delete-option value meaning "the version this call wrote"
pub const SET_DEFAULT_REQUEST: &str = "request";
/// Query-parameter value meaning "stop pinning; track the newest version"
pub const SET_DEFAULT_NULL: &str = "null";

/// Prefix reserved for hidden bookkeeping properties
pub const HIDDEN_PREFIX: char = '#';
pub const HIDDEN_NEXT_VERSION_ID: &str = "#nextversionid";
pub const HIDDEN_EPOCH: &str = "#epoch";
pub const HIDDEN_CREATEDAT: &str = "#createdat";
pub const HIDDEN_DOCUMENT: &str = "#document";

/// Dotted sub-namespace for free-form user tags
pub const TAGS_PREFIX: &str = "tags.";

/// Header prefix used for attributes on raw document requests/responses
pub const HEADER_PREFIX: &str = "xRegistry-";

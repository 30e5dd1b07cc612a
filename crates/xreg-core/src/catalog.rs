//! Model catalog: group/resource types and attribute definitions
//!
//! The catalog answers three questions for the core: which collections
//! exist at a level, what flags a resource type carries, and whether a
//! property value is acceptable for an entity.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use xreg_core_types::attrs::{
    CONTENTTYPE, CREATEDAT, DEFAULTVERSIONID, DEFAULTVERSIONSTICKY, DESCRIPTION, DOCUMENTATION,
    EPOCH, META, MODIFIEDAT, NAME, VERSIONS, XREF,
};

use crate::errors::{RegistryError, Result};
use crate::model::{EntityKind, EntityPath};

/// Attribute name that admits arbitrary extensions at a level
pub const WILDCARD_ATTR: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    String,
    Integer,
    UInteger,
    Decimal,
    Boolean,
    Timestamp,
    Url,
    Uri,
    Map,
    Object,
    Array,
    Any,
}

impl AttrType {
    /// True when `value` is acceptable for this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            AttrType::String | AttrType::Url | AttrType::Uri => value.is_string(),
            AttrType::Integer => value.is_i64(),
            AttrType::UInteger => value.is_u64(),
            AttrType::Decimal => value.is_number(),
            AttrType::Boolean => value.is_boolean(),
            AttrType::Timestamp => value
                .as_str()
                .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok()),
            AttrType::Map | AttrType::Object => value.is_object(),
            AttrType::Array => value.is_array(),
            AttrType::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    #[serde(rename = "type")]
    pub attr_type: AttrType,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

fn is_true(b: &bool) -> bool {
    *b
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceModel {
    pub plural: String,
    pub singular: String,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub hasdocument: bool,
    /// 0 means unlimited
    #[serde(default, skip_serializing_if = "is_zero")]
    pub maxversions: u64,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub setversionid: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub readonly: bool,
    /// content-type pattern -> `json` | `string` | `binary`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub typemap: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeDef>,
}

impl ResourceModel {
    pub fn flags(&self) -> ResourceFlags {
        ResourceFlags {
            has_document: self.hasdocument,
            max_versions: self.maxversions,
            set_version_id: self.setversionid,
            read_only: self.readonly,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupModel {
    pub plural: String,
    pub singular: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeDef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, ResourceModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeDef>,
    #[serde(default)]
    pub groups: BTreeMap<String, GroupModel>,
}

impl Model {
    /// Parse a model document
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` when the JSON does not describe a model or a
    /// plural/singular name is not a legal collection name.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let model: Model = serde_json::from_slice(bytes)
            .map_err(|e| RegistryError::invalid_data(format!("Invalid model: {}", e)))?;
        model.check()?;
        Ok(model)
    }

    fn check(&self) -> Result<()> {
        let bad = |name: &str| {
            RegistryError::invalid_data(format!("Invalid model: bad collection name \"{}\"", name))
        };
        for (key, g) in &self.groups {
            if key != &g.plural || !crate::model::props::is_valid_attr_name(&g.singular) {
                return Err(bad(key));
            }
            for (rkey, r) in &g.resources {
                if rkey != &r.plural
                    || rkey == META
                    || rkey == VERSIONS
                    || !crate::model::props::is_valid_attr_name(&r.singular)
                {
                    return Err(bad(rkey));
                }
            }
        }
        Ok(())
    }
}

/// Per-resource-type behavior switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceFlags {
    pub has_document: bool,
    pub max_versions: u64,
    pub set_version_id: bool,
    pub read_only: bool,
}

/// Read-only view of the registry model consumed by the core
pub trait ModelCatalog: Send + Sync {
    fn group(&self, plural: &str) -> Option<&GroupModel>;

    fn resource(&self, group_plural: &str, plural: &str) -> Option<&ResourceModel>;

    /// The full model document (rendered under `model`)
    fn document(&self) -> &Model;

    /// Child collection names of the entity at `parent`, in output order
    fn collections(&self, parent: &EntityPath) -> Vec<String> {
        match parent.kind() {
            EntityKind::Registry => self.document().groups.keys().cloned().collect(),
            EntityKind::Group => parent
                .group_type()
                .and_then(|g| self.group(g))
                .map(|g| g.resources.keys().cloned().collect())
                .unwrap_or_default(),
            EntityKind::Resource => vec![VERSIONS.to_string()],
            EntityKind::Meta | EntityKind::Version => Vec::new(),
        }
    }

    fn is_known_collection(&self, parent: &EntityPath, name: &str) -> bool {
        self.collections(parent).iter().any(|c| c == name)
    }

    /// Flags of the resource type `path` belongs to
    fn resource_flags(&self, path: &EntityPath) -> Option<ResourceFlags> {
        self.resource_model(path).map(ResourceModel::flags)
    }

    fn resource_model(&self, path: &EntityPath) -> Option<&ResourceModel> {
        self.resource(path.group_type()?, path.resource_type()?)
    }

    /// Singular name used for `<singular>id` at `path`'s level
    fn singular(&self, path: &EntityPath) -> Option<&str> {
        match path.kind() {
            EntityKind::Registry => None,
            EntityKind::Group => path
                .group_type()
                .and_then(|g| self.group(g))
                .map(|g| g.singular.as_str()),
            _ => self.resource_model(path).map(|r| r.singular.as_str()),
        }
    }

    /// Check one client-supplied property for the entity at `path`
    ///
    /// # Errors
    ///
    /// Returns `InvalidExtension` for names the model does not know and
    /// `InvalidData` for values of the wrong type.
    fn validate(&self, path: &EntityPath, name: &str, value: &Value) -> Result<()> {
        let wrong_type = || {
            RegistryError::invalid_data(format!(
                "Attribute \"{}\" has an invalid value: {}",
                name, value
            ))
        };
        if let Some(t) = core_attribute_type(path.kind(), name) {
            if !t.accepts(value) {
                return Err(wrong_type());
            }
            return Ok(());
        }
        if path.kind() == EntityKind::Meta {
            return Err(RegistryError::InvalidExtension {
                name: name.to_string(),
            });
        }
        let defs = match path.kind() {
            EntityKind::Registry => Some(&self.document().attributes),
            EntityKind::Group => path
                .group_type()
                .and_then(|g| self.group(g))
                .map(|g| &g.attributes),
            _ => self.resource_model(path).map(|r| &r.attributes),
        };
        let def = defs.and_then(|d| d.get(name).or_else(|| d.get(WILDCARD_ATTR)));
        match def {
            Some(def) if def.attr_type.accepts(value) => Ok(()),
            Some(_) => Err(wrong_type()),
            None => Err(RegistryError::InvalidExtension {
                name: name.to_string(),
            }),
        }
    }
}

/// Types of the attributes every entity of `kind` understands
fn core_attribute_type(kind: EntityKind, name: &str) -> Option<AttrType> {
    let common = match name {
        EPOCH => Some(AttrType::UInteger),
        CREATEDAT | MODIFIEDAT => Some(AttrType::Timestamp),
        _ => None,
    };
    if common.is_some() {
        return common;
    }
    match kind {
        EntityKind::Meta => match name {
            XREF => Some(AttrType::String),
            DEFAULTVERSIONID => Some(AttrType::String),
            DEFAULTVERSIONSTICKY => Some(AttrType::Boolean),
            _ => None,
        },
        _ => match name {
            NAME | DESCRIPTION => Some(AttrType::String),
            DOCUMENTATION => Some(AttrType::Url),
            CONTENTTYPE if matches!(kind, EntityKind::Resource | EntityKind::Version) => {
                Some(AttrType::String)
            }
            _ => None,
        },
    }
}

impl ModelCatalog for Model {
    fn group(&self, plural: &str) -> Option<&GroupModel> {
        self.groups.get(plural)
    }

    fn resource(&self, group_plural: &str, plural: &str) -> Option<&ResourceModel> {
        self.groups.get(group_plural)?.resources.get(plural)
    }

    fn document(&self) -> &Model {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> Model {
        Model::from_json(
            br#"{
              "groups": {
                "dirs": {
                  "plural": "dirs", "singular": "dir",
                  "attributes": {"owner": {"type": "string"}},
                  "resources": {
                    "files": {"plural": "files", "singular": "file", "maxversions": 2,
                              "attributes": {"*": {"type": "any"}}}
                  }
                }
              }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let m = model();
        let r = m.resource("dirs", "files").unwrap();
        assert!(r.hasdocument);
        assert!(r.setversionid);
        assert_eq!(r.flags().max_versions, 2);
    }

    #[test]
    fn test_collections_per_level() {
        let m = model();
        assert_eq!(m.collections(&EntityPath::root()), vec!["dirs"]);
        assert_eq!(m.collections(&EntityPath::group("dirs", "d1")), vec!["files"]);
        assert!(m.is_known_collection(
            &EntityPath::resource("dirs", "d1", "files", "f1"),
            "versions"
        ));
    }

    #[test]
    fn test_validate_extensions() {
        let m = model();
        let g = EntityPath::group("dirs", "d1");
        assert!(m.validate(&g, "owner", &json!("me")).is_ok());
        assert!(matches!(
            m.validate(&g, "owner", &json!(1)),
            Err(RegistryError::InvalidData { .. })
        ));
        assert!(matches!(
            m.validate(&g, "color", &json!("red")),
            Err(RegistryError::InvalidExtension { .. })
        ));
        let f = EntityPath::resource("dirs", "d1", "files", "f1").version("1");
        assert!(m.validate(&f, "anything", &json!([1, 2])).is_ok());
    }

    #[test]
    fn test_validate_core_attribute_types() {
        let m = model();
        let g = EntityPath::group("dirs", "d1");
        assert!(m.validate(&g, "name", &json!("x")).is_ok());
        assert!(m.validate(&g, "name", &json!(5)).is_err());
        assert!(m.validate(&g, "createdat", &json!("2024-01-01T00:00:00Z")).is_ok());
        assert!(m.validate(&g, "createdat", &json!("yesterday")).is_err());
    }

    #[test]
    fn test_reserved_resource_plural_rejected() {
        let err = Model::from_json(
            br#"{"groups": {"dirs": {"plural": "dirs", "singular": "dir",
                 "resources": {"meta": {"plural": "meta", "singular": "m"}}}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidData { .. }));
    }
}

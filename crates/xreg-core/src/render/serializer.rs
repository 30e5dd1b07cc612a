//! Entity tree -> wire JSON
//!
//! Attribute order is fixed: identity, `self`/`xid`, the core attributes,
//! extensions alphabetically, the external document URL, then the embedded
//! document. Collections follow as `<name>url`, `<name>count` and, when
//! inlined, the `<name>` map in ascending id order. Counts reflect the
//! filtered tree.

use serde_json::{json, Map, Value};
use xreg_core_types::attrs::{
    CAPABILITIES, CONTENTTYPE, CREATEDAT, DEFAULTVERSIONID, DEFAULTVERSIONSTICKY,
    DEFAULTVERSIONURL, DESCRIPTION, DOCUMENTATION, EPOCH, HEADER_PREFIX, ISDEFAULT, META,
    METAURL, MODEL, MODIFIEDAT, NAME, READONLY, REGISTRYID, SELF, SPECVERSION, TAGS, VERSIONID,
    XID, XREF,
};

use super::inline::Inline;
use crate::capabilities::Capabilities;
use crate::catalog::{ModelCatalog, ResourceFlags};
use crate::codec::{render_document, DocumentKeys};
use crate::errors::{RegistryError, Result};
use crate::filter::Selection;
use crate::model::{EntityKind, EntityPath, Target};
use crate::model::path::STRUCTURE_SUFFIX;
use crate::tree::{EntityTree, Node};

/// Properties rendered in fixed positions rather than as extensions
const PLACED: &[&str] = &[
    SPECVERSION,
    REGISTRYID,
    EPOCH,
    NAME,
    DESCRIPTION,
    DOCUMENTATION,
    CREATEDAT,
    MODIFIEDAT,
    CONTENTTYPE,
    XREF,
    DEFAULTVERSIONID,
    DEFAULTVERSIONSTICKY,
];

pub struct Serializer<'a> {
    tree: &'a EntityTree,
    model: &'a dyn ModelCatalog,
    capabilities: &'a dyn Capabilities,
    base_url: &'a str,
    selection: Option<&'a Selection>,
}

impl<'a> Serializer<'a> {
    pub fn new(
        tree: &'a EntityTree,
        model: &'a dyn ModelCatalog,
        capabilities: &'a dyn Capabilities,
        base_url: &'a str,
    ) -> Self {
        Self {
            tree,
            model,
            capabilities,
            base_url: base_url.trim_end_matches('/'),
            selection: None,
        }
    }

    /// Render only what `selection` keeps
    pub fn with_selection(mut self, selection: &'a Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    fn keeps(&self, path: &EntityPath) -> bool {
        self.selection.map_or(true, |s| s.keeps(path))
    }

    fn node(&self, path: &EntityPath) -> Result<&'a Node> {
        self.tree
            .get(path)
            .ok_or_else(|| RegistryError::not_found(path.key()))
    }

    fn flags(&self, path: &EntityPath) -> Option<ResourceFlags> {
        self.model.resource_flags(path)
    }

    fn has_document(&self, path: &EntityPath) -> bool {
        self.flags(path).is_some_and(|f| f.has_document)
    }

    pub fn url(&self, path: &EntityPath) -> String {
        format!("{}{}", self.base_url, path.key())
    }

    /// URL used for `self`: the `$structure` form for document-bearing
    /// resources and versions
    pub fn self_url(&self, path: &EntityPath) -> String {
        let url = self.url(path);
        match path.kind() {
            EntityKind::Resource | EntityKind::Version if self.has_document(path) => {
                format!("{}{}", url, STRUCTURE_SUFFIX)
            }
            _ => url,
        }
    }

    fn collection_url(&self, parent: &EntityPath, collection: &str) -> String {
        let target = Target::Collection {
            parent: parent.clone(),
            collection: collection.to_string(),
        };
        format!("{}{}", self.base_url, target.display_path())
    }

    /// Attributes of one entity, without collections or document
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when `path` is not in the tree.
    pub fn attributes(&self, path: &EntityPath) -> Result<Map<String, Value>> {
        let node = self.node(path)?;
        let props = &node.props;
        let kind = path.kind();
        let mut out = Map::new();
        let copy = |out: &mut Map<String, Value>, key: &str| {
            if let Some(v) = props.get(key) {
                out.insert(key.to_string(), v.clone());
            }
        };
        let id_attr = self.model.singular(path).map(|s| format!("{}id", s));

        match kind {
            EntityKind::Registry => {
                copy(&mut out, SPECVERSION);
                copy(&mut out, REGISTRYID);
            }
            EntityKind::Resource => {
                if let Some(attr) = &id_attr {
                    out.insert(attr.clone(), json!(path.id()));
                }
                let default = node.resource.as_ref().and_then(|r| r.default_vid.as_deref());
                if let Some(vid) = default {
                    out.insert(VERSIONID.to_string(), json!(vid));
                }
            }
            EntityKind::Version => {
                if let Some(attr) = &id_attr {
                    out.insert(attr.clone(), json!(path.resource_path().id()));
                }
                out.insert(VERSIONID.to_string(), json!(path.id()));
            }
            EntityKind::Group | EntityKind::Meta => {
                if let Some(attr) = &id_attr {
                    out.insert(attr.clone(), json!(path.id()));
                }
            }
        }
        out.insert(SELF.to_string(), json!(self.self_url(path)));
        out.insert(XID.to_string(), json!(path.key()));

        if kind == EntityKind::Meta {
            return Ok(self.meta_attributes(path, node, out));
        }

        copy(&mut out, EPOCH);
        copy(&mut out, NAME);
        if kind == EntityKind::Version {
            let resource = self.tree.get(&path.resource_path());
            let default = resource
                .and_then(|r| r.resource.as_ref())
                .and_then(|r| r.default_vid.as_deref());
            out.insert(ISDEFAULT.to_string(), json!(default == Some(path.id())));
        }
        copy(&mut out, DESCRIPTION);
        copy(&mut out, DOCUMENTATION);
        if let Some(tags) = props.tags() {
            out.insert(TAGS.to_string(), Value::Object(tags));
        }
        copy(&mut out, CREATEDAT);
        copy(&mut out, MODIFIEDAT);

        let doc_url = match kind {
            EntityKind::Resource | EntityKind::Version => {
                copy(&mut out, CONTENTTYPE);
                self.model.singular(path).map(|s| DocumentKeys::new(s).url)
            }
            _ => None,
        };
        for (key, value) in props.visible() {
            if PLACED.contains(&key.as_str()) || Some(key) == doc_url.as_ref() {
                continue;
            }
            out.insert(key.clone(), value.clone());
        }
        if let Some(url) = &doc_url {
            copy(&mut out, url.as_str());
        }
        Ok(out)
    }

    fn meta_attributes(&self, path: &EntityPath, node: &Node, mut out: Map<String, Value>) -> Map<String, Value> {
        let props = &node.props;
        for key in [EPOCH, CREATEDAT, MODIFIEDAT] {
            if let Some(v) = props.get(key) {
                out.insert(key.to_string(), v.clone());
            }
        }
        let read_only = self.flags(path).is_some_and(|f| f.read_only);
        out.insert(READONLY.to_string(), json!(read_only));
        if let Some(xref) = props.get(XREF) {
            out.insert(XREF.to_string(), xref.clone());
        }
        let resource = path.resource_path();
        if let Some(vid) = props.get_str(DEFAULTVERSIONID) {
            out.insert(DEFAULTVERSIONID.to_string(), json!(vid));
            out.insert(
                DEFAULTVERSIONURL.to_string(),
                json!(self.self_url(&resource.version(vid))),
            );
        }
        if let Some(sticky) = props.get(DEFAULTVERSIONSTICKY) {
            out.insert(DEFAULTVERSIONSTICKY.to_string(), sticky.clone());
        }
        out
    }

    /// One entity with its collections, as directed by `inline`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for paths outside the tree and `InvalidData` for
    /// a malformed typemap.
    pub fn entity(&self, path: &EntityPath, inline: &Inline) -> Result<Map<String, Value>> {
        let mut out = self.attributes(path)?;
        let node = self.node(path)?;
        let kind = path.kind();

        if matches!(kind, EntityKind::Resource | EntityKind::Version) {
            if let Some(rmodel) = self.model.resource_model(path) {
                let keys = DocumentKeys::new(&rmodel.singular);
                if rmodel.hasdocument && inline.includes(&keys.inline) {
                    if let Some((key, value)) = render_document(&node.props, &keys, &rmodel.typemap)? {
                        out.insert(key, value);
                    }
                }
            }
        }

        if kind == EntityKind::Registry {
            if inline.names(MODEL) {
                out.insert(MODEL.to_string(), serde_json::to_value(self.model.document())?);
            }
            if inline.names(CAPABILITIES) {
                out.insert(CAPABILITIES.to_string(), self.capabilities.document());
            }
        }

        if kind == EntityKind::Resource {
            out.insert(METAURL.to_string(), json!(self.url(&path.meta())));
            if inline.includes(META) && self.tree.get(&path.meta()).is_some() {
                out.insert(
                    META.to_string(),
                    Value::Object(self.entity(&path.meta(), &inline.child(META))?),
                );
            }
        }

        for (collection, _) in &node.collections {
            let members = self.collection(path, collection, &inline.child(collection))?;
            out.insert(
                format!("{}url", collection),
                json!(self.collection_url(path, collection)),
            );
            out.insert(format!("{}count", collection), json!(members.len()));
            if inline.includes(collection) {
                out.insert(collection.clone(), Value::Object(members));
            }
        }
        Ok(out)
    }

    /// Members of one collection keyed by id, ascending
    ///
    /// # Errors
    ///
    /// As [`Serializer::entity`].
    pub fn collection(&self, parent: &EntityPath, collection: &str, inline: &Inline) -> Result<Map<String, Value>> {
        let mut out = Map::new();
        for id in self.tree.children(parent, collection) {
            let child = parent.child(collection, id);
            if !self.keeps(&child) {
                continue;
            }
            out.insert(id.clone(), Value::Object(self.entity(&child, inline)?));
        }
        Ok(out)
    }

    /// Render whatever the tree's target addresses
    ///
    /// # Errors
    ///
    /// As [`Serializer::entity`].
    pub fn render(&self, inline: &Inline) -> Result<Value> {
        match self.tree.target() {
            // a filter that pruned the addressed entity itself
            Target::Entity(path) if !self.keeps(path) => Ok(Value::Object(Map::new())),
            Target::Entity(path) => Ok(Value::Object(self.entity(path, inline)?)),
            Target::Collection { parent, collection } => {
                Ok(Value::Object(self.collection(parent, collection, inline)?))
            }
        }
    }

    /// `xRegistry-*` headers for the raw document form of `path`
    ///
    /// `contenttype` travels as `Content-Type` and is left out; tags become
    /// one `xRegistry-tags-<key>` header each.
    ///
    /// # Errors
    ///
    /// As [`Serializer::attributes`].
    pub fn headers(&self, path: &EntityPath) -> Result<Vec<(String, String)>> {
        let mut headers = Vec::new();
        for (key, value) in self.attributes(path)? {
            match (key.as_str(), value) {
                (CONTENTTYPE, _) => {}
                (TAGS, Value::Object(tags)) => {
                    for (tag, v) in tags {
                        headers.push((format!("{}{}-{}", HEADER_PREFIX, TAGS, tag), header_text(&v)));
                    }
                }
                (_, v) => headers.push((format!("{}{}", HEADER_PREFIX, key), header_text(&v))),
            }
        }
        Ok(headers)
    }
}

fn header_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Pretty-printed JSON with two-space indent and a trailing newline
///
/// # Errors
///
/// Returns `Serialization` if the value cannot be encoded.
pub fn to_json_bytes(value: &Value) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

//! The raw document form of resources and versions
//!
//! A document-bearing resource or version addressed without `$structure`
//! travels as its document bytes, with every other attribute carried in an
//! `xRegistry-<attr>` header (tags as `xRegistry-tags-<key>`).

use serde_json::{json, Map, Value};
use xreg_core::codec::{document_bytes, DocumentKeys};
use xreg_core::xreg_core_types::attrs::{CONTENTTYPE, EPOCH, HEADER_PREFIX, TAGS};
use xreg_core::{
    EntityKind, EntityPath, EntityTree, ModelCatalog, ParsedPath, RegistryError, Result,
    Serializer, Target,
};

use crate::http::{HttpResponse, CONTENT_TYPE, LOCATION};

const TAG_HEADER_PREFIX: &str = "tags-";

/// True when `parsed` addresses the document rather than the metadata
pub fn is_raw_form(model: &dyn ModelCatalog, parsed: &ParsedPath) -> bool {
    match &parsed.target {
        Target::Entity(path) => {
            matches!(path.kind(), EntityKind::Resource | EntityKind::Version)
                && !parsed.structure
                && model.resource_flags(path).is_some_and(|f| f.has_document)
        }
        Target::Collection { .. } => false,
    }
}

/// Write attributes carried by `xRegistry-*` headers
///
/// `Content-Type` becomes `contenttype` unless a header names it directly.
/// The literal `null` removes an attribute.
///
/// # Errors
///
/// Returns `InvalidData` for a non-integer `xRegistry-epoch`.
pub fn attrs_from_headers(headers: &[(String, String)]) -> Result<Map<String, Value>> {
    let mut attrs = Map::new();
    let mut tags = Map::new();
    let mut content_type = None;

    for (name, value) in headers {
        if name.eq_ignore_ascii_case(CONTENT_TYPE) {
            content_type = Some(value.clone());
            continue;
        }
        let Some(attr) = strip_prefix_ignore_case(name, HEADER_PREFIX) else {
            continue;
        };
        if let Some(tag) = strip_prefix_ignore_case(attr, TAG_HEADER_PREFIX) {
            tags.insert(tag.to_string(), json!(value));
            continue;
        }
        let attr = attr.to_ascii_lowercase();
        let parsed = if value == "null" {
            Value::Null
        } else if attr == EPOCH {
            let epoch = value.trim().parse::<i64>().map_err(|_| {
                RegistryError::invalid_data(format!("Invalid \"{}{}\" header: {}", HEADER_PREFIX, EPOCH, value))
            })?;
            json!(epoch)
        } else {
            json!(value)
        };
        attrs.insert(attr, parsed);
    }

    if !tags.is_empty() {
        attrs.insert(TAGS.to_string(), Value::Object(tags));
    }
    if let Some(ct) = content_type {
        attrs.entry(CONTENTTYPE.to_string()).or_insert(json!(ct));
    }
    Ok(attrs)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}

/// A loaded document ready to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    /// `<singular>url`, when the document lives elsewhere
    pub external: Option<String>,
}

impl RawDocument {
    /// # Errors
    ///
    /// Returns `NotFound` when `path` is not in the tree.
    pub fn load(
        view: &Serializer<'_>,
        tree: &EntityTree,
        model: &dyn ModelCatalog,
        path: &EntityPath,
    ) -> Result<Self> {
        let node = tree
            .get(path)
            .ok_or_else(|| RegistryError::not_found(path.key()))?;
        let external = model
            .singular(path)
            .map(DocumentKeys::new)
            .and_then(|keys| node.props.get_str(&keys.url).map(str::to_string));
        Ok(Self {
            headers: view.headers(path)?,
            body: document_bytes(&node.props).unwrap_or_default(),
            content_type: node.props.get_str(CONTENTTYPE).map(str::to_string),
            external,
        })
    }

    /// `303` to the external location, else `200` with the bytes
    pub fn into_get_response(self) -> HttpResponse {
        match self.external.clone() {
            Some(url) => self.into_response(303).with_header(LOCATION, url),
            None => self.into_response(200),
        }
    }

    pub fn into_response(self, status: u16) -> HttpResponse {
        let mut resp = HttpResponse::new(status);
        if let Some(ct) = self.content_type {
            resp = resp.with_header(CONTENT_TYPE, ct);
        }
        for (name, value) in self.headers {
            resp = resp.with_header(name, value);
        }
        resp.with_body(self.body)
    }
}

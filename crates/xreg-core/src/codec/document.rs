//! Document body encoding for resource versions
//!
//! Bodies are stored base64-encoded under the hidden `#document` key with
//! the client-visible `contenttype` alongside. An external document lives
//! in `<singular>url` instead; the two are mutually exclusive.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use xreg_core_types::attrs::{CONTENTTYPE, HIDDEN_DOCUMENT};

use super::type_map::{self, Rendering};
use crate::errors::{RegistryError, Result};
use crate::model::Props;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A document supplied by a write
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentInput {
    /// Structured value under `<singular>`
    Json(Value),
    /// `<singular>base64` (already decoded) or a raw HTTP body
    Bytes(Vec<u8>),
    /// `<singular>url`
    External(String),
    /// `<singular>: null`
    Clear,
}

/// Attribute names carrying a document for resources whose singular is `singular`
pub struct DocumentKeys {
    pub inline: String,
    pub base64: String,
    pub url: String,
}

impl DocumentKeys {
    pub fn new(singular: &str) -> Self {
        Self {
            inline: singular.to_string(),
            base64: format!("{}base64", singular),
            url: format!("{}url", singular),
        }
    }
}

/// Remove the document keys from a write body
///
/// # Errors
///
/// Returns `InvalidData` when more than one document form is present, or
/// `<singular>base64` is not valid base64.
pub fn extract_document(
    attrs: &mut Map<String, Value>,
    keys: &DocumentKeys,
) -> Result<Option<DocumentInput>> {
    let inline = attrs.remove(&keys.inline);
    let b64 = attrs.remove(&keys.base64);
    let url = attrs.remove(&keys.url);

    let given = [&inline, &b64, &url]
        .iter()
        .filter(|v| matches!(v, Some(v) if !v.is_null()))
        .count();
    if given > 1 {
        return Err(RegistryError::invalid_data(format!(
            "Only one of \"{}\", \"{}\" or \"{}\" may be present",
            keys.inline, keys.base64, keys.url
        )));
    }

    if let Some(v) = inline.as_ref().filter(|v| !v.is_null()) {
        return Ok(Some(DocumentInput::Json(v.clone())));
    }
    if let Some(v) = b64.as_ref().filter(|v| !v.is_null()) {
        let text = v.as_str().ok_or_else(|| {
            RegistryError::invalid_data(format!("\"{}\" must be a string", keys.base64))
        })?;
        let bytes = STANDARD.decode(text).map_err(|e| {
            RegistryError::invalid_data(format!("\"{}\" is not valid base64: {}", keys.base64, e))
        })?;
        return Ok(Some(DocumentInput::Bytes(bytes)));
    }
    if let Some(v) = url.as_ref().filter(|v| !v.is_null()) {
        let location = v.as_str().ok_or_else(|| {
            RegistryError::invalid_data(format!("\"{}\" must be a string", keys.url))
        })?;
        return Ok(Some(DocumentInput::External(location.to_string())));
    }
    if inline.is_some() || b64.is_some() || url.is_some() {
        return Ok(Some(DocumentInput::Clear));
    }
    Ok(None)
}

/// Store `input` on a version's props
///
/// `explicit_contenttype` is true when the same write set (or nulled)
/// `contenttype`; otherwise structured JSON defaults it to
/// `application/json` and clearing the document clears it.
///
/// # Errors
///
/// Returns `Serialization` if a JSON value cannot be encoded.
pub fn apply_document(
    props: &mut Props,
    input: DocumentInput,
    keys: &DocumentKeys,
    explicit_contenttype: bool,
) -> Result<()> {
    match input {
        DocumentInput::Json(value) => {
            let stored_ct = props.get_str(CONTENTTYPE).map(str::to_string);
            let bytes = match (&value, &stored_ct) {
                (Value::String(text), Some(ct)) if !type_map::is_json_type(ct) => {
                    text.clone().into_bytes()
                }
                _ => serde_json::to_vec(&value)?,
            };
            if stored_ct.is_none() && !explicit_contenttype {
                props.set(CONTENTTYPE, json!(JSON_CONTENT_TYPE));
            }
            store_bytes(props, &bytes, keys);
        }
        DocumentInput::Bytes(bytes) => store_bytes(props, &bytes, keys),
        DocumentInput::External(url) => {
            props.remove(HIDDEN_DOCUMENT);
            props.set(keys.url.clone(), json!(url));
        }
        DocumentInput::Clear => {
            props.remove(HIDDEN_DOCUMENT);
            props.remove(&keys.url);
            if !explicit_contenttype {
                props.remove(CONTENTTYPE);
            }
        }
    }
    Ok(())
}

fn store_bytes(props: &mut Props, bytes: &[u8], keys: &DocumentKeys) {
    props.remove(&keys.url);
    props.set(HIDDEN_DOCUMENT, json!(STANDARD.encode(bytes)));
}

/// Stored document bytes, if any
pub fn document_bytes(props: &Props) -> Option<Vec<u8>> {
    props
        .get_str(HIDDEN_DOCUMENT)
        .and_then(|b64| STANDARD.decode(b64).ok())
}

/// JSON embedding of the stored document: `(key, value)` or `None`
///
/// # Errors
///
/// Returns `InvalidData` when the resource type's typemap is malformed.
pub fn render_document(
    props: &Props,
    keys: &DocumentKeys,
    typemap: &BTreeMap<String, String>,
) -> Result<Option<(String, Value)>> {
    let Some(bytes) = document_bytes(props) else {
        return Ok(None);
    };
    let ct = props.get_str(CONTENTTYPE).unwrap_or_default();
    let rendering = match type_map::lookup(typemap, ct)? {
        Some(r) => r,
        None if type_map::is_json_type(ct) => Rendering::Json,
        None => Rendering::Binary,
    };

    let base64 = || (keys.base64.clone(), json!(STANDARD.encode(&bytes)));
    let rendered = match rendering {
        Rendering::Json => match serde_json::from_slice::<Value>(&bytes) {
            Ok(v) => (keys.inline.clone(), v),
            Err(_) => base64(),
        },
        Rendering::String => match std::str::from_utf8(&bytes) {
            Ok(s) => (keys.inline.clone(), json!(s)),
            Err(_) => base64(),
        },
        Rendering::Binary => base64(),
    };
    Ok(Some(rendered))
}

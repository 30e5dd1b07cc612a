pub mod document;
pub mod type_map;

pub use document::{
    apply_document, document_bytes, extract_document, render_document, DocumentInput,
    DocumentKeys, JSON_CONTENT_TYPE,
};
pub use type_map::{is_json_type, Rendering};

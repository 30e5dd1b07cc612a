//! Projection of the entity tree into the JSON wire form

pub mod inline;
pub mod serializer;

pub use inline::Inline;
pub use serializer::{to_json_bytes, Serializer};

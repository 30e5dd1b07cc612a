//! xRegistry core - entity/version lifecycle and query/projection engine
//!
//! This crate provides the semantic kernel of the registry:
//! - Property bags, entity paths and the Entity/Meta capability interface
//! - The write path: a pure planner producing commands, applied inside one
//!   store transaction (epochs, default-version state machine, xref)
//! - The read path: an entity arena, filter evaluation, inline directives
//!   and the deterministic JSON serializer
//! - The document codec for resource version bodies
//! - The Model Catalog, Capabilities and Property Store collaborator traits,
//!   with an in-memory store

pub mod apply;
pub mod capabilities;
pub mod catalog;
pub mod codec;
pub mod commands;
pub mod errors;
pub mod filter;
pub mod logging_facility;
pub mod model;
pub mod ops;
pub mod plan;
pub mod render;
pub mod store;
pub mod tree;

// Logging macros refer to schema constants through this path
pub use xreg_core_types;

// Re-export commonly used types
pub use apply::{apply, apply_all};
pub use capabilities::{Capabilities, CapabilitySet};
pub use catalog::{Model, ModelCatalog, ResourceFlags};
pub use commands::{Command, SetDefault, WriteMode};
pub use errors::{ExError, ExErrorKind, RegistryError, Result};
pub use filter::{Filter, Selection};
pub use model::{Entity, EntityKind, EntityPath, EntityRecord, Meta, ParsedPath, Props, Target};
pub use ops::OpContext;
pub use plan::{plan_write, Plan, ResultRef, WriteBody, WriteMethod, WriteRequest};
pub use render::{Inline, Serializer};
pub use store::{MemoryStore, PropertyStore, StoreTx};
pub use tree::EntityTree;

pub mod attributes;
pub mod context;
pub mod default_version;
pub mod delete_ops;
pub mod entity_ops;
pub mod resource_ops;
pub mod version_ops;

pub use context::{format_timestamp, normalize_timestamp, OpContext};
pub use default_version::{set_default_version, settle_resource};
pub use delete_ops::delete_entity;
pub use entity_ops::{ensure_group, init_registry, upsert_group, upsert_registry};
pub use resource_ops::{ensure_resource, upsert_resource};
pub use version_ops::upsert_version;

pub mod entity;
pub mod path;
pub mod props;

pub use entity::{Entity, EntityRecord, Meta};
pub use path::{check_id, is_valid_id, EntityKind, EntityPath, ParsedPath, Target};
pub use props::Props;

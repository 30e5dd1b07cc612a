//! `?filter` expressions
//!
//! Each `filter` parameter is a group of comma-separated clauses that must
//! all hold; groups are OR'd. Clauses walk the tree by collection name and
//! end in an attribute test:
//!
//! ```text
//! dirs.files.tags.stage=dev
//! dirs.name=my*        (case-insensitive wildcard)
//! dirs.files.epoch>=2  (numeric when both sides are numbers)
//! dirs.description=null
//! ```

pub mod eval;
pub mod parse;

pub use eval::{evaluate, matches, Selection};
pub use parse::{Clause, Filter, FilterGroup, Op};

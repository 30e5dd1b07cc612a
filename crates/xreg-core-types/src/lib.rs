//! Core types shared across the registry crates
//!
//! - **Correlation types**: RequestId and RequestContext (with deadline)
//! - **Schema constants**: canonical logging field keys and event names
//! - **Attribute names**: the well-known wire attribute names

pub mod attrs;
pub mod correlation;
pub mod schema;

pub use correlation::{RequestContext, RequestId};

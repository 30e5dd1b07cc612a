//! xRegistry engine - request handling over the registry core
//!
//! Provides the operations an HTTP layer calls:
//! - [`Registry::resolve`], [`Registry::apply_filter`], [`Registry::render`]
//!   for reads, [`Registry::write`] and [`Registry::delete`] for changes
//! - [`Registry::handle`], which parses a transport-neutral [`HttpRequest`]
//!   (path, query, `xRegistry-*` headers, body) and maps the outcome to an
//!   [`HttpResponse`] status and body
//! - [`RegistryConfig`] loading from TOML and `XREG_*` environment variables

pub mod config;
pub mod errors;
pub mod http;
pub mod query;
pub mod raw;
pub mod registry;

pub use config::RegistryConfig;
pub use errors::EngineError;
pub use http::{HttpRequest, HttpResponse, Method};
pub use query::RequestOptions;
pub use registry::{Registry, Rendered, Resolved, WriteOutcome};

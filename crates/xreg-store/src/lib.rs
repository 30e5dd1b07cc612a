//! SQLite persistence for registry entities
//!
//! [`SqliteStore`] implements `xreg_core::PropertyStore` on a single
//! connection whose schema is brought up to date by [`migrations`] when the
//! store opens.

pub mod db;
pub mod errors;
pub mod migrations;
pub mod sqlite_store;

pub use errors::Result;
pub use sqlite_store::SqliteStore;

//! Persistence adapter seam
//!
//! The core never touches storage directly; every read-modify-write of one
//! request runs inside a single [`StoreTx`].

pub mod memory;

pub use memory::MemoryStore;

use crate::errors::Result;
use crate::model::{EntityPath, Props};

/// A transactional property store
pub trait PropertyStore: Send + Sync {
    /// Start a transaction. Dropping it without [`StoreTx::commit`] rolls it
    /// back.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` when the backend cannot start a transaction.
    fn begin_tx(&self) -> Result<Box<dyn StoreTx + '_>>;
}

/// One open transaction
pub trait StoreTx {
    /// # Errors
    ///
    /// Returns `Persistence` on backend failure.
    fn get_props(&self, path: &EntityPath) -> Result<Option<Props>>;

    /// Insert or fully replace the properties stored at `path`
    ///
    /// # Errors
    ///
    /// Returns `Persistence` on backend failure.
    fn put_props(&mut self, path: &EntityPath, props: &Props) -> Result<()>;

    /// Remove `path` and everything beneath it
    ///
    /// # Errors
    ///
    /// Returns `Persistence` on backend failure.
    fn delete_entity(&mut self, path: &EntityPath) -> Result<()>;

    /// Ids of the entities directly under `parent` in `collection`,
    /// ascending
    ///
    /// # Errors
    ///
    /// Returns `Persistence` on backend failure.
    fn list_children(&self, parent: &EntityPath, collection: &str) -> Result<Vec<String>>;

    /// # Errors
    ///
    /// Returns `Persistence` when the commit fails; nothing is published.
    fn commit(self: Box<Self>) -> Result<()>;
}

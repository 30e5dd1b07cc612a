use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{PropertyStore, StoreTx};
use crate::errors::{RegistryError, Result};
use crate::model::{EntityPath, Props};

type Rows = BTreeMap<String, Props>;

/// In-memory property store
///
/// A transaction holds the store lock for its whole life and works on a
/// private copy of the rows, so concurrent requests are serialized and an
/// abandoned transaction leaves no trace.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Rows>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PropertyStore for MemoryStore {
    fn begin_tx(&self) -> Result<Box<dyn StoreTx + '_>> {
        let guard = self
            .rows
            .lock()
            .map_err(|_| RegistryError::persistence("memory store lock poisoned"))?;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

struct MemoryTx<'a> {
    guard: MutexGuard<'a, Rows>,
    working: Rows,
}

fn child_prefix(parent: &EntityPath, collection: &str) -> String {
    match parent.key().as_str() {
        "/" => format!("/{}/", collection),
        key => format!("{}/{}/", key, collection),
    }
}

impl StoreTx for MemoryTx<'_> {
    fn get_props(&self, path: &EntityPath) -> Result<Option<Props>> {
        Ok(self.working.get(&path.key()).cloned())
    }

    fn put_props(&mut self, path: &EntityPath, props: &Props) -> Result<()> {
        self.working.insert(path.key(), props.clone());
        Ok(())
    }

    fn delete_entity(&mut self, path: &EntityPath) -> Result<()> {
        let key = path.key();
        let below = format!("{}/", key.trim_end_matches('/'));
        self.working
            .retain(|k, _| k != &key && !k.starts_with(&below));
        Ok(())
    }

    fn list_children(&self, parent: &EntityPath, collection: &str) -> Result<Vec<String>> {
        let prefix = child_prefix(parent, collection);
        let mut ids: Vec<String> = self
            .working
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter_map(|(k, _)| {
                let rest = &k[prefix.len()..];
                (!rest.contains('/')).then(|| rest.to_string())
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

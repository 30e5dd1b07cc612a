use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::{BTreeSet, HashMap};
use xreg_core_types::RequestContext;

use crate::catalog::ModelCatalog;
use crate::errors::{RegistryError, Result};
use crate::model::{Entity, EntityPath, EntityRecord, Meta};
use crate::store::StoreTx;

/// Canonical timestamp text used for `createdat` / `modifiedat`
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Normalize a client timestamp to UTC in canonical form
///
/// # Errors
///
/// Returns `InvalidData` when `s` is not RFC 3339.
pub fn normalize_timestamp(s: &str) -> Result<String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| format_timestamp(t.with_timezone(&Utc)))
        .map_err(|_| RegistryError::invalid_data(format!("Malformed timestamp \"{}\"", s)))
}

/// State of one write request
///
/// Owns the request's transaction. Tracks which entities this request has
/// already mutated so each epoch moves at most once, and remembers their
/// epoch before the first mutation for optimistic-concurrency checks.
pub struct OpContext<'a> {
    tx: Box<dyn StoreTx + 'a>,
    pub model: &'a dyn ModelCatalog,
    request: &'a RequestContext,
    now: String,
    touched: HashMap<EntityPath, i64>,
    created: BTreeSet<EntityPath>,
    last_version: HashMap<EntityPath, String>,
}

impl<'a> OpContext<'a> {
    pub fn new(
        tx: Box<dyn StoreTx + 'a>,
        model: &'a dyn ModelCatalog,
        request: &'a RequestContext,
    ) -> Self {
        Self {
            tx,
            model,
            request,
            now: format_timestamp(Utc::now()),
            touched: HashMap::new(),
            created: BTreeSet::new(),
            last_version: HashMap::new(),
        }
    }

    /// Timestamp shared by every mutation of this request
    pub fn now(&self) -> &str {
        &self.now
    }

    pub fn tx(&self) -> &dyn StoreTx {
        self.tx.as_ref()
    }

    /// # Errors
    ///
    /// Returns `Timeout` once the request deadline has passed.
    pub fn check_deadline(&self, op: &str) -> Result<()> {
        if self.request.is_expired() {
            return Err(RegistryError::Timeout { op: op.to_string() });
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Timeout` or `Persistence`.
    pub fn load(&self, path: &EntityPath) -> Result<Option<Entity>> {
        self.check_deadline("load")?;
        Ok(self
            .tx
            .get_props(path)?
            .map(|props| Entity::with_props(path.clone(), props)))
    }

    /// # Errors
    ///
    /// Returns `NotFound` when nothing is stored at `path`.
    pub fn require(&self, path: &EntityPath) -> Result<Entity> {
        self.load(path)?
            .ok_or_else(|| RegistryError::not_found(path.key()))
    }

    /// # Errors
    ///
    /// Returns `Timeout` or `Persistence`.
    pub fn load_meta(&self, resource: &EntityPath) -> Result<Option<Meta>> {
        Ok(self.load(&resource.meta())?.map(Meta::new))
    }

    /// # Errors
    ///
    /// Returns `Timeout` or `Persistence`.
    pub fn children(&self, parent: &EntityPath, collection: &str) -> Result<Vec<String>> {
        self.check_deadline("list")?;
        self.tx.list_children(parent, collection)
    }

    /// Fresh entity stamped with this request's timestamp; not yet stored
    pub fn create(&mut self, path: EntityPath) -> Entity {
        let mut entity = Entity::new(path.clone());
        entity.init(&self.now);
        self.touched.insert(path.clone(), 0);
        self.created.insert(path);
        entity
    }

    /// Compare a client-supplied epoch with the value the entity had before
    /// this request touched it
    ///
    /// # Errors
    ///
    /// Returns `EpochMismatch` when they differ.
    pub fn check_epoch(&self, record: &dyn EntityRecord, supplied: Option<i64>) -> Result<()> {
        let Some(got) = supplied else {
            return Ok(());
        };
        if self.created.contains(record.path()) {
            return Ok(());
        }
        let want = self
            .touched
            .get(record.path())
            .copied()
            .unwrap_or_else(|| record.epoch());
        if got != want {
            return Err(RegistryError::EpochMismatch {
                path: record.path().key(),
                got,
                want,
            });
        }
        Ok(())
    }

    /// Persist a mutation: bumps the epoch on first touch in this request
    ///
    /// # Errors
    ///
    /// Returns `Timeout` or `Persistence`.
    pub fn save(&mut self, record: &mut dyn EntityRecord) -> Result<()> {
        self.check_deadline("save")?;
        let path = record.path().clone();
        if !self.touched.contains_key(&path) {
            self.touched.insert(path.clone(), record.epoch());
            record.touch(&self.now);
        }
        self.tx.put_props(&path, record.props())
    }

    /// Persist hidden bookkeeping without counting it as a mutation
    ///
    /// # Errors
    ///
    /// Returns `Timeout` or `Persistence`.
    pub fn save_quiet(&mut self, record: &dyn EntityRecord) -> Result<()> {
        self.check_deadline("save")?;
        self.tx.put_props(record.path(), record.props())
    }

    /// Persist an entity whose epoch was set explicitly (xref restore)
    ///
    /// # Errors
    ///
    /// Returns `Timeout` or `Persistence`.
    pub fn save_as_touched(&mut self, record: &dyn EntityRecord, previous_epoch: i64) -> Result<()> {
        self.touched
            .entry(record.path().clone())
            .or_insert(previous_epoch);
        self.save_quiet(record)
    }

    /// # Errors
    ///
    /// Returns `Timeout` or `Persistence`.
    pub fn delete(&mut self, path: &EntityPath) -> Result<()> {
        self.check_deadline("delete")?;
        self.tx.delete_entity(path)?;
        self.touched.retain(|p, _| !path.is_ancestor_or_self_of(p));
        self.created.retain(|p| !path.is_ancestor_or_self_of(p));
        self.last_version
            .retain(|p, _| !path.is_ancestor_or_self_of(p));
        Ok(())
    }

    pub fn was_created(&self, path: &EntityPath) -> bool {
        self.created.contains(path)
    }

    pub fn was_touched(&self, path: &EntityPath) -> bool {
        self.touched.contains_key(path)
    }

    /// Remember the version most recently written for `resource`
    pub fn note_version(&mut self, resource: &EntityPath, vid: &str) {
        self.last_version
            .insert(resource.clone(), vid.to_string());
    }

    pub fn last_version(&self, resource: &EntityPath) -> Option<&str> {
        self.last_version.get(resource).map(String::as_str)
    }

    /// # Errors
    ///
    /// Returns `Timeout` or `Persistence`; nothing is published on error.
    pub fn commit(self) -> Result<()> {
        self.check_deadline("commit")?;
        self.tx.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_timestamp_to_utc() {
        assert_eq!(
            normalize_timestamp("2024-01-01T02:00:00+02:00").unwrap(),
            "2024-01-01T00:00:00Z"
        );
        assert_eq!(
            normalize_timestamp("2024-01-01T00:00:00.5Z").unwrap(),
            "2024-01-01T00:00:00.500Z"
        );
        assert!(normalize_timestamp("soon").is_err());
    }
}

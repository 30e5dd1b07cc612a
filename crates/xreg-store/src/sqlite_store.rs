//! SQLite-backed property store
//!
//! Each entity is one row keyed by its xid, with the property bag stored as
//! a JSON object. A transaction owns the connection lock from `BEGIN
//! IMMEDIATE` until commit or drop, so writers are serialized the same way
//! as in the in-memory store.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use xreg_core::errors::RegistryError;
use xreg_core::{EntityPath, PropertyStore, Props, StoreTx};

use crate::db::{connect, Location};
use crate::errors::{corrupt_row, from_rusqlite, Result};
use crate::migrations::apply_migrations;

/// Property store over a single SQLite connection
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) a database file and bring its schema up to
    /// date
    ///
    /// # Errors
    ///
    /// Returns `Persistence` when the file cannot be opened or migrated.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = connect(Location::File(path.as_ref()))?;
        tracing::info!(path = %path.as_ref().display(), "opening sqlite store");
        Self::from_connection(conn)
    }

    /// # Errors
    ///
    /// Returns `Persistence` when the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(connect(Location::Memory)?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl PropertyStore for SqliteStore {
    fn begin_tx(&self) -> Result<Box<dyn StoreTx + '_>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| RegistryError::persistence("sqlite store lock poisoned"))?;
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(from_rusqlite)?;
        Ok(Box::new(SqliteTx {
            conn,
            finished: false,
        }))
    }
}

struct SqliteTx<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

/// Parent key, collection and id of the row for `path`
///
/// The meta entity sits under its resource with an empty collection so it
/// never shows up in a child listing.
fn locate(path: &EntityPath) -> (String, String, String) {
    let segs = path.segments();
    match segs.len() {
        0 => (String::new(), String::new(), String::new()),
        5 => (key_of(&segs[..4]), String::new(), segs[4].clone()),
        n => (key_of(&segs[..n - 2]), segs[n - 2].clone(), segs[n - 1].clone()),
    }
}

fn key_of(segs: &[String]) -> String {
    format!("/{}", segs.join("/"))
}

fn encode(props: &Props) -> Result<String> {
    let map: BTreeMap<String, Value> = props.clone().into();
    Ok(serde_json::to_string(&map)?)
}

fn decode(path: &str, data: &str) -> Result<Props> {
    let map: BTreeMap<String, Value> =
        serde_json::from_str(data).map_err(|e| corrupt_row(path, e))?;
    Ok(Props::from(map))
}

impl StoreTx for SqliteTx<'_> {
    fn get_props(&self, path: &EntityPath) -> Result<Option<Props>> {
        let key = path.key();
        let data: Option<String> = self
            .conn
            .query_row("SELECT data FROM props WHERE path = ?1", [&key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(from_rusqlite)?;
        data.map(|d| decode(&key, &d)).transpose()
    }

    fn put_props(&mut self, path: &EntityPath, props: &Props) -> Result<()> {
        let (parent, collection, id) = locate(path);
        self.conn
            .execute(
                "INSERT INTO props (path, parent, collection, entity_id, data)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(path) DO UPDATE SET data = excluded.data",
                rusqlite::params![path.key(), parent, collection, id, encode(props)?],
            )
            .map_err(from_rusqlite)?;
        Ok(())
    }

    fn delete_entity(&mut self, path: &EntityPath) -> Result<()> {
        let key = path.key();
        let below = format!("{}/", key.trim_end_matches('/'));
        // substr rather than LIKE: ids may contain '_'
        let removed = self
            .conn
            .execute(
                "DELETE FROM props
                 WHERE path = ?1 OR substr(path, 1, length(?2)) = ?2",
                rusqlite::params![key, below],
            )
            .map_err(from_rusqlite)?;
        tracing::debug!(path = %key, removed, "deleted entity rows");
        Ok(())
    }

    fn list_children(&self, parent: &EntityPath, collection: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT entity_id FROM props
                 WHERE parent = ?1 AND collection = ?2
                 ORDER BY entity_id",
            )
            .map_err(from_rusqlite)?;
        let ids = stmt
            .query_map(rusqlite::params![parent.key(), collection], |row| row.get(0))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(from_rusqlite)?;
        Ok(ids)
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        self.conn.execute_batch("COMMIT").map_err(from_rusqlite)?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "rollback failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(name: &str) -> Props {
        let mut p = Props::new();
        p.set("name", json!(name));
        p
    }

    #[test]
    fn test_locate_rows() {
        let r = EntityPath::resource("dirs", "d1", "files", "f1");
        assert_eq!(
            locate(&EntityPath::root()),
            (String::new(), String::new(), String::new())
        );
        assert_eq!(
            locate(&EntityPath::group("dirs", "d1")),
            ("/".to_string(), "dirs".to_string(), "d1".to_string())
        );
        assert_eq!(
            locate(&r),
            ("/dirs/d1".to_string(), "files".to_string(), "f1".to_string())
        );
        assert_eq!(
            locate(&r.meta()),
            ("/dirs/d1/files/f1".to_string(), String::new(), "meta".to_string())
        );
        assert_eq!(
            locate(&r.version("v1")),
            ("/dirs/d1/files/f1".to_string(), "versions".to_string(), "v1".to_string())
        );
    }

    #[test]
    fn test_commit_publishes() {
        let store = SqliteStore::in_memory().unwrap();
        let g = EntityPath::group("dirs", "d1");
        {
            let mut tx = store.begin_tx().unwrap();
            tx.put_props(&g, &props("a")).unwrap();
            tx.commit().unwrap();
        }
        let tx = store.begin_tx().unwrap();
        assert_eq!(tx.get_props(&g).unwrap(), Some(props("a")));
    }

    #[test]
    fn test_drop_rolls_back() {
        let store = SqliteStore::in_memory().unwrap();
        let g = EntityPath::group("dirs", "d1");
        {
            let mut tx = store.begin_tx().unwrap();
            tx.put_props(&g, &props("a")).unwrap();
            assert!(tx.get_props(&g).unwrap().is_some());
        }
        let tx = store.begin_tx().unwrap();
        assert_eq!(tx.get_props(&g).unwrap(), None);
    }

    #[test]
    fn test_put_replaces_whole_bag() {
        let store = SqliteStore::in_memory().unwrap();
        let g = EntityPath::group("dirs", "d1");
        let mut tx = store.begin_tx().unwrap();
        let mut first = props("a");
        first.set("description", json!("gone"));
        tx.put_props(&g, &first).unwrap();
        tx.put_props(&g, &props("b")).unwrap();
        assert_eq!(tx.get_props(&g).unwrap(), Some(props("b")));
    }
}

//! Schema migrations
//!
//! Every migration is compiled into the binary and applied at most once.
//! The `schema_version` table remembers a SHA-256 of each applied script so
//! an edited migration is caught instead of silently skipped.

use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::errors::{checksum_mismatch, from_rusqlite, migration_error, Result};

/// `(id, sql)` pairs in application order
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial_schema",
    include_str!("../migrations/001_initial_schema.sql"),
)];

const VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY,
    migration_id TEXT NOT NULL UNIQUE,
    applied_at INTEGER NOT NULL,
    checksum TEXT
)";

fn fingerprint(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}

/// Bring the database up to the latest embedded schema
///
/// # Errors
///
/// Returns `Persistence` when a script fails to run or a previously
/// applied script no longer matches its recorded fingerprint.
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(VERSION_TABLE).map_err(from_rusqlite)?;

    for &(id, sql) in MIGRATIONS {
        let expected = fingerprint(sql);
        let recorded: Option<Option<String>> = conn
            .query_row(
                "SELECT checksum FROM schema_version WHERE migration_id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()
            .map_err(from_rusqlite)?;

        match recorded {
            Some(Some(found)) if found != expected => {
                return Err(checksum_mismatch(id, &found, &expected));
            }
            Some(_) => continue,
            None => {}
        }

        let tx = conn.transaction().map_err(from_rusqlite)?;
        tx.execute_batch(sql)
            .map_err(|e| migration_error(id, &e.to_string()))?;
        tx.execute(
            "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?1, ?2, ?3)",
            params![id, chrono::Utc::now().timestamp(), expected],
        )
        .map_err(from_rusqlite)?;
        tx.commit().map_err(from_rusqlite)?;
        tracing::debug!(migration = id, "schema migration applied");
    }

    Ok(())
}

//! Connection setup shared by file-backed and in-memory stores

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::errors::{from_rusqlite, Result};

/// How long a writer waits on a locked database file before giving up
const BUSY_WAIT: Duration = Duration::from_secs(5);

/// Where a store keeps its rows
#[derive(Debug, Clone, Copy)]
pub enum Location<'a> {
    File(&'a Path),
    Memory,
}

/// Open a connection and apply the pragmas the store relies on
///
/// # Errors
///
/// Returns `Persistence` when the file cannot be opened or a pragma fails.
pub fn connect(location: Location<'_>) -> Result<Connection> {
    let conn = match location {
        Location::File(path) => Connection::open(path),
        Location::Memory => Connection::open_in_memory(),
    }
    .map_err(from_rusqlite)?;

    conn.pragma_update(None, "foreign_keys", true)
        .map_err(from_rusqlite)?;
    // in-memory databases stay in "memory" mode, so the reply is ignored
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
        .map_err(from_rusqlite)?;
    conn.busy_timeout(BUSY_WAIT).map_err(from_rusqlite)?;

    Ok(conn)
}

//! Error handling for xreg-store
//!
//! Maps SQLite and migration failures onto the core `RegistryError`

use xreg_core::errors::RegistryError;

/// Result type alias using RegistryError
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> RegistryError {
    RegistryError::persistence(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> RegistryError {
    RegistryError::persistence(format!(
        "Checksum mismatch for migration {}: expected {}, got {}",
        migration_id, expected, actual
    ))
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> RegistryError {
    RegistryError::persistence(err.to_string())
}

/// A stored row whose JSON no longer parses
pub fn corrupt_row(path: &str, err: serde_json::Error) -> RegistryError {
    RegistryError::persistence(format!("Corrupt properties for '{}': {}", path, err))
}

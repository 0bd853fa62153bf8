//! Credential storage scopes and the SQLite-backed remembered scope.

use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Errors raised by the credential store.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("credential store error: {0}")]
  Sqlite(#[from] rusqlite::Error),
  #[error("failed to encode stored record: {0}")]
  Encode(#[from] serde_json::Error),
  #[error("failed to create data directory: {0}")]
  Io(#[from] std::io::Error),
  #[error("could not determine data directory")]
  NoDataDir,
  #[error("credential store lock poisoned")]
  Poisoned,
}

/// A single key/value credential scope.
///
/// Two scopes exist at runtime: a process-lifetime "session" scope and a
/// long-lived "remembered" scope. The store decides which scope a write
/// lands in; scopes themselves are dumb key/value maps.
pub trait CredentialScope: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
  fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
  fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory scope. Lives as long as the process; nothing survives exit.
#[derive(Default)]
pub struct MemoryScope {
  entries: Mutex<HashMap<String, String>>,
}

impl MemoryScope {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CredentialScope for MemoryScope {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
    Ok(entries.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
    entries.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
    entries.remove(key);
    Ok(())
  }
}

/// Schema for the remembered credential table.
const SESSION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS credentials (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// SQLite-backed scope for remembered credentials.
pub struct SqliteScope {
  conn: Mutex<Connection>,
}

impl SqliteScope {
  /// Open the remembered scope at the default location.
  pub fn open() -> Result<Self, StorageError> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    Self::from_connection(Connection::open(&path)?)
  }

  /// Open an in-memory scope. Used by tests and `--no-remember` runs.
  pub fn in_memory() -> Result<Self, StorageError> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> Result<Self, StorageError> {
    conn.execute_batch(SESSION_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf, StorageError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or(StorageError::NoDataDir)?;

    Ok(data_dir.join("libiverse").join("session.db"))
  }
}

impl CredentialScope for SqliteScope {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
    let mut stmt = conn.prepare("SELECT value FROM credentials WHERE key = ?")?;
    let value: Option<String> = stmt.query_row(params![key], |row| row.get(0)).ok();
    Ok(value)
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
    conn.execute(
      "INSERT OR REPLACE INTO credentials (key, value, stored_at)
       VALUES (?, ?, datetime('now'))",
      params![key, value],
    )?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
    conn.execute("DELETE FROM credentials WHERE key = ?", params![key])?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn memory_scope_roundtrip() {
    let scope = MemoryScope::new();
    assert_eq!(scope.get("token").unwrap(), None);

    scope.set("token", "abc").unwrap();
    assert_eq!(scope.get("token").unwrap(), Some("abc".to_string()));

    scope.remove("token").unwrap();
    assert_eq!(scope.get("token").unwrap(), None);
  }

  #[test]
  fn sqlite_scope_roundtrip() {
    let scope = SqliteScope::in_memory().unwrap();
    scope.set("username", "li@libiverse.example").unwrap();
    scope.set("username", "admin@libiverse.example").unwrap();

    assert_eq!(
      scope.get("username").unwrap(),
      Some("admin@libiverse.example".to_string())
    );

    scope.remove("username").unwrap();
    assert_eq!(scope.get("username").unwrap(), None);
  }

  #[test]
  fn remove_is_idempotent() {
    let scope = SqliteScope::in_memory().unwrap();
    scope.remove("token").unwrap();
    scope.remove("token").unwrap();
  }
}

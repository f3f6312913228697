//! Durable local store: namespaced JSON slots in SQLite.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::builder::{CredentialStore, StoredCredentials};

/// Slot holding the last credentials accepted by the backend
pub const CREDENTIALS_SLOT: &str = "painboard.credentials";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS local_store (
    namespace TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

pub struct LocalStore {
  conn: Mutex<Connection>,
}

impl LocalStore {
  /// Open or create the store at the default location
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store at {}: {}", path.display(), e))?;
    Self::with_connection(conn)
  }

  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory store: {}", e))?;
    Self::with_connection(conn)
  }

  /// Data directory used for the store and the log files
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("painboard"))
  }

  fn default_path() -> Result<PathBuf> {
    Ok(Self::data_dir()?.join("store.db"))
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  pub fn get<T: DeserializeOwned>(&self, namespace: &str) -> Result<Option<T>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data: Option<String> = conn
      .query_row(
        "SELECT data FROM local_store WHERE namespace = ?",
        params![namespace],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read {}: {}", namespace, e))?;

    data
      .map(|json| {
        serde_json::from_str(&json).map_err(|e| eyre!("Failed to decode {}: {}", namespace, e))
      })
      .transpose()
  }

  /// Overwrite the slot
  pub fn set<T: Serialize>(&self, namespace: &str, value: &T) -> Result<()> {
    let data =
      serde_json::to_string(value).map_err(|e| eyre!("Failed to encode {}: {}", namespace, e))?;
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO local_store (namespace, data, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![namespace, data],
      )
      .map_err(|e| eyre!("Failed to write {}: {}", namespace, e))?;
    Ok(())
  }
}

impl CredentialStore for LocalStore {
  fn load_credentials(&self) -> Result<Option<StoredCredentials>> {
    self.get(CREDENTIALS_SLOT)
  }

  fn save_credentials(&self, credentials: &StoredCredentials) -> Result<()> {
    self.set(CREDENTIALS_SLOT, credentials)
  }
}

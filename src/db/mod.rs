pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::store::{KeyValue, StoreError};

/// Database connection wrapper for the local record store
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create the database at `path`
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    let db = Self { conn };
    db.run_migrations()?;

    Ok(db)
  }

  /// Database that lives only as long as this value
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;

    let db = Self { conn };
    db.run_migrations()?;

    Ok(db)
  }

  /// Run database migrations
  fn run_migrations(&self) -> Result<()> {
    self
      .conn
      .execute_batch(schema::SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;
    Ok(())
  }
}

impl KeyValue for Database {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let value = self
      .conn
      .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
        row.get(0)
      })
      .optional()?;
    Ok(value)
  }

  fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
    self.conn.execute(
      "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?, ?, datetime('now'))",
      params![key, value],
    )?;
    Ok(())
  }

  fn remove(&mut self, key: &str) -> Result<(), StoreError> {
    self
      .conn
      .execute("DELETE FROM kv WHERE key = ?", params![key])?;
    Ok(())
  }

  /// All writes land in one SQL transaction.
  fn set_many(&mut self, entries: &[(&str, String)]) -> Result<(), StoreError> {
    let tx = self.conn.transaction()?;
    for (key, value) in entries {
      tx.execute(
        "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?, ?, datetime('now'))",
        params![key, value],
      )?;
    }
    tx.commit()?;
    Ok(())
  }
}

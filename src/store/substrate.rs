//! Key-value substrate the record store persists into.

#[cfg(test)]
use std::collections::BTreeMap;

use super::error::StoreError;

/// Synchronous string key-value storage.
pub trait KeyValue: Send {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

  fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

  #[allow(dead_code)]
  fn remove(&mut self, key: &str) -> Result<(), StoreError>;

  /// Write several keys. Substrates that support transactions apply the
  /// batch atomically.
  fn set_many(&mut self, entries: &[(&str, String)]) -> Result<(), StoreError> {
    for (key, value) in entries {
      self.set(key, value)?;
    }
    Ok(())
  }
}

/// Process-local substrate, gone when dropped.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryKv {
  entries: BTreeMap<String, String>,
}

#[cfg(test)]
impl MemoryKv {
  pub fn new() -> Self {
    Self::default()
  }
}

#[cfg(test)]
impl KeyValue for MemoryKv {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    Ok(self.entries.get(key).cloned())
  }

  fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
    self.entries.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&mut self, key: &str) -> Result<(), StoreError> {
    self.entries.remove(key);
    Ok(())
  }
}

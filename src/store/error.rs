use thiserror::Error;

use super::models::GoalId;

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("Goal not found: {0}")]
  GoalNotFound(GoalId),

  #[error("Invalid {field}: {message}")]
  Validation {
    field: &'static str,
    message: String,
  },

  #[error("Storage error: {0}")]
  Storage(#[from] rusqlite::Error),

  #[error("Failed to serialize record: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("Store lock poisoned")]
  Poisoned,
}

impl StoreError {
  pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
    StoreError::Validation {
      field,
      message: message.into(),
    }
  }
}

//! Persisted record layout and schema upgrades.
//!
//! Version 1 is the layout written before goals had deadlines, when the
//! default denomination was US dollars. Version 2 is current: every goal
//! carries an explicit (possibly null) deadline and legacy denominations
//! have been rewritten.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::models::{Goal, GoalColor, GoalId, Settings, DEFAULT_ICON};

pub const SCHEMA_VERSION: u32 = 2;

/// Names of the records kept in the key-value substrate.
#[derive(Debug, Clone)]
pub struct StorageKeys {
  pub goals: String,
  pub transactions: String,
  pub settings: String,
  pub next_goal_id: String,
  pub next_transaction_id: String,
  pub schema_version: String,
}

impl StorageKeys {
  pub fn new(prefix: &str) -> Self {
    Self {
      goals: format!("{}-goals", prefix),
      transactions: format!("{}-transactions", prefix),
      settings: format!("{}-settings", prefix),
      next_goal_id: format!("{}-next-goal-id", prefix),
      next_transaction_id: format!("{}-next-transaction-id", prefix),
      schema_version: format!("{}-schema-version", prefix),
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoalV1 {
  id: GoalId,
  name: String,
  #[serde(default)]
  description: Option<String>,
  target_amount: i64,
  current_amount: i64,
  #[serde(default)]
  icon: Option<String>,
  #[serde(default)]
  color: Option<GoalColor>,
  currency_code: String,
  currency_symbol: String,
  #[serde(default)]
  deadline: Option<NaiveDate>,
  created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsV1 {
  currency_code: String,
  currency_symbol: String,
  #[serde(default)]
  language: Option<String>,
}

fn is_legacy_denomination(code: &str, symbol: &str) -> bool {
  code == "USD" || symbol == "$"
}

/// Rewrite a version 1 goal list into current goals.
pub fn upgrade_goals(raw: &str, defaults: &Settings) -> Result<Vec<Goal>, serde_json::Error> {
  let goals: Vec<GoalV1> = serde_json::from_str(raw)?;

  Ok(
    goals
      .into_iter()
      .map(|g| {
        let (currency_code, currency_symbol) =
          if is_legacy_denomination(&g.currency_code, &g.currency_symbol) {
            (
              defaults.currency_code.clone(),
              defaults.currency_symbol.clone(),
            )
          } else {
            (g.currency_code, g.currency_symbol)
          };

        Goal {
          id: g.id,
          name: g.name,
          description: g.description,
          target_amount: g.target_amount,
          current_amount: g.current_amount,
          icon: g.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
          color: g.color.unwrap_or_default(),
          currency_code,
          currency_symbol,
          deadline: g.deadline,
          created_at: g.created_at,
        }
      })
      .collect(),
  )
}

/// Rewrite version 1 settings into current settings.
pub fn upgrade_settings(raw: &str, defaults: &Settings) -> Result<Settings, serde_json::Error> {
  let settings: SettingsV1 = serde_json::from_str(raw)?;
  let language = settings
    .language
    .unwrap_or_else(|| defaults.language.clone());

  if is_legacy_denomination(&settings.currency_code, &settings.currency_symbol) {
    return Ok(Settings {
      currency_code: defaults.currency_code.clone(),
      currency_symbol: defaults.currency_symbol.clone(),
      language,
    });
  }

  Ok(Settings {
    currency_code: settings.currency_code,
    currency_symbol: settings.currency_symbol,
    language,
  })
}

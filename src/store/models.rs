use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type GoalId = u64;
pub type TransactionId = u64;

pub const DEFAULT_ICON: &str = "🐷";

/// Display palette for goals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalColor {
  #[default]
  Blue,
  #[serde(alias = "emerald")]
  Green,
  Purple,
  Pink,
  Orange,
  Red,
}

impl GoalColor {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Blue => "blue",
      Self::Green => "green",
      Self::Purple => "purple",
      Self::Pink => "pink",
      Self::Orange => "orange",
      Self::Red => "red",
    }
  }
}

impl fmt::Display for GoalColor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for GoalColor {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "blue" => Ok(Self::Blue),
      "green" | "emerald" => Ok(Self::Green),
      "purple" => Ok(Self::Purple),
      "pink" => Ok(Self::Pink),
      "orange" => Ok(Self::Orange),
      "red" => Ok(Self::Red),
      other => Err(format!("unknown color '{}'", other)),
    }
  }
}

/// A savings target. Amounts are in the smallest currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
  pub id: GoalId,
  pub name: String,
  pub description: Option<String>,
  pub target_amount: i64,
  /// Sum of the goal's transaction amounts; may go negative
  pub current_amount: i64,
  pub icon: String,
  pub color: GoalColor,
  pub currency_code: String,
  pub currency_symbol: String,
  pub deadline: Option<NaiveDate>,
  pub created_at: DateTime<Utc>,
}

impl Goal {
  /// Progress towards the target, clamped to 0..=100.
  pub fn progress_percent(&self) -> f64 {
    if self.target_amount <= 0 {
      return 0.0;
    }
    (self.current_amount as f64 / self.target_amount as f64 * 100.0).clamp(0.0, 100.0)
  }

  /// Amount still missing, never negative.
  pub fn remaining(&self) -> i64 {
    self.target_amount.saturating_sub(self.current_amount).max(0)
  }

  pub fn is_reached(&self) -> bool {
    self.current_amount >= self.target_amount
  }
}

/// Fields supplied when creating a goal. Id, balance and creation time are
/// assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGoal {
  pub name: String,
  pub description: Option<String>,
  pub target_amount: i64,
  pub icon: String,
  pub color: GoalColor,
  pub currency_code: String,
  pub currency_symbol: String,
  pub deadline: Option<NaiveDate>,
}

/// A single deposit (positive) or withdrawal (negative).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
  pub id: TransactionId,
  pub goal_id: GoalId,
  pub amount: i64,
  pub note: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl Transaction {
  pub fn is_deposit(&self) -> bool {
    self.amount > 0
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
  pub goal_id: GoalId,
  pub amount: i64,
  pub note: Option<String>,
}

/// A goal together with its transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalDetail {
  #[serde(flatten)]
  pub goal: Goal,
  pub transactions: Vec<Transaction>,
}

/// Global denomination and locale defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
  pub currency_code: String,
  pub currency_symbol: String,
  pub language: String,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      currency_code: "MGA".to_string(),
      currency_symbol: "Ar".to_string(),
      language: "en".to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn goal(current: i64, target: i64) -> Goal {
    Goal {
      id: 1,
      name: "Bike".to_string(),
      description: None,
      target_amount: target,
      current_amount: current,
      icon: DEFAULT_ICON.to_string(),
      color: GoalColor::default(),
      currency_code: "MGA".to_string(),
      currency_symbol: "Ar".to_string(),
      deadline: None,
      created_at: Utc::now(),
    }
  }

  #[test]
  fn test_progress_is_clamped() {
    assert_eq!(goal(25_000, 50_000).progress_percent(), 50.0);
    assert_eq!(goal(80_000, 50_000).progress_percent(), 100.0);
    assert_eq!(goal(-5_000, 50_000).progress_percent(), 0.0);
  }

  #[test]
  fn test_remaining_never_negative() {
    assert_eq!(goal(15_000, 50_000).remaining(), 35_000);
    assert_eq!(goal(60_000, 50_000).remaining(), 0);
    assert!(goal(50_000, 50_000).is_reached());
    assert_eq!(goal(-10, i64::MAX).remaining(), i64::MAX);
    assert_eq!(goal(i64::MIN, 1).remaining(), i64::MAX);
  }

  #[test]
  fn test_goal_json_layout() {
    let json = serde_json::to_value(goal(0, 100)).unwrap();
    assert!(json.get("targetAmount").is_some());
    assert!(json.get("currencySymbol").is_some());
    assert_eq!(json["deadline"], serde_json::Value::Null);
    assert_eq!(json["color"], "blue");
  }

  #[test]
  fn test_color_parsing() {
    assert_eq!("Emerald".parse::<GoalColor>().unwrap(), GoalColor::Green);
    assert_eq!(
      serde_json::from_str::<GoalColor>("\"emerald\"").unwrap(),
      GoalColor::Green
    );
    assert!("teal".parse::<GoalColor>().is_err());
  }
}

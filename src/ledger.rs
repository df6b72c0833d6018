//! Application-level goal and transaction operations.
//!
//! The ledger checks the creation contracts and goal existence before
//! anything reaches the store, and reports failures as typed errors.

use chrono::NaiveDate;
use tracing::info;

use crate::store::{
  Goal, GoalColor, GoalDetail, GoalId, GoalStore, KeyValue, NewGoal, NewTransaction, Settings,
  StoreError, Transaction, DEFAULT_ICON,
};

/// User input for a new goal.
#[derive(Debug, Clone, Default)]
pub struct GoalInput {
  pub name: String,
  pub description: Option<String>,
  pub target_amount: i64,
  pub icon: Option<String>,
  pub color: Option<GoalColor>,
  pub deadline: Option<NaiveDate>,
}

pub struct Ledger<K: KeyValue> {
  store: GoalStore<K>,
}

impl<K: KeyValue> Ledger<K> {
  pub fn new(store: GoalStore<K>) -> Self {
    Self { store }
  }

  pub fn store(&self) -> &GoalStore<K> {
    &self.store
  }

  pub fn goals(&self) -> Result<Vec<Goal>, StoreError> {
    self.store.list_goals()
  }

  /// A goal with its history, newest transaction first.
  pub fn goal(&self, id: GoalId) -> Result<GoalDetail, StoreError> {
    let mut detail = self
      .store
      .get_goal(id)?
      .ok_or(StoreError::GoalNotFound(id))?;
    detail
      .transactions
      .sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(detail)
  }

  /// Create a goal in the current default denomination.
  pub fn create_goal(&self, input: GoalInput) -> Result<Goal, StoreError> {
    let name = input.name.trim();
    if name.is_empty() {
      return Err(StoreError::validation("name", "Name is required"));
    }
    if input.target_amount <= 0 {
      return Err(StoreError::validation(
        "targetAmount",
        "Target amount must be positive",
      ));
    }

    let settings = self.store.get_settings()?;
    let description = input
      .description
      .map(|d| d.trim().to_string())
      .filter(|d| !d.is_empty());

    let goal = self.store.create_goal(NewGoal {
      name: name.to_string(),
      description,
      target_amount: input.target_amount,
      icon: input
        .icon
        .filter(|i| !i.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ICON.to_string()),
      color: input.color.unwrap_or_default(),
      currency_code: settings.currency_code,
      currency_symbol: settings.currency_symbol,
      deadline: input.deadline,
    })?;

    info!(id = goal.id, name = %goal.name, "Goal created");
    Ok(goal)
  }

  pub fn delete_goal(&self, id: GoalId) -> Result<(), StoreError> {
    if self.store.get_goal(id)?.is_none() {
      return Err(StoreError::GoalNotFound(id));
    }
    self.store.delete_goal(id)?;
    info!(id, "Goal deleted");
    Ok(())
  }

  pub fn deposit(
    &self,
    goal_id: GoalId,
    amount: i64,
    note: Option<String>,
  ) -> Result<Transaction, StoreError> {
    if amount <= 0 {
      return Err(StoreError::validation("amount", "Deposit must be positive"));
    }
    self.record(NewTransaction {
      goal_id,
      amount,
      note,
    })
  }

  pub fn withdraw(
    &self,
    goal_id: GoalId,
    amount: i64,
    note: Option<String>,
  ) -> Result<Transaction, StoreError> {
    if amount <= 0 {
      return Err(StoreError::validation(
        "amount",
        "Withdrawal must be positive",
      ));
    }
    self.record(NewTransaction {
      goal_id,
      amount: -amount,
      note,
    })
  }

  /// Record a signed transaction against an existing goal.
  pub fn record(&self, new: NewTransaction) -> Result<Transaction, StoreError> {
    if new.amount == 0 {
      return Err(StoreError::validation("amount", "Amount cannot be zero"));
    }
    if self.store.get_goal(new.goal_id)?.is_none() {
      return Err(StoreError::GoalNotFound(new.goal_id));
    }

    let note = new
      .note
      .map(|n| n.trim().to_string())
      .filter(|n| !n.is_empty());
    let transaction = self.store.create_transaction(NewTransaction { note, ..new })?;

    info!(
      id = transaction.id,
      goal_id = transaction.goal_id,
      amount = transaction.amount,
      "Transaction recorded"
    );
    Ok(transaction)
  }

  pub fn settings(&self) -> Result<Settings, StoreError> {
    self.store.get_settings()
  }

  pub fn update_settings(&self, settings: Settings) -> Result<Settings, StoreError> {
    if settings.currency_code.trim().is_empty() {
      return Err(StoreError::validation(
        "currencyCode",
        "Currency code is required",
      ));
    }
    if settings.currency_symbol.trim().is_empty() {
      return Err(StoreError::validation(
        "currencySymbol",
        "Currency symbol is required",
      ));
    }

    let settings = Settings {
      currency_code: settings.currency_code.trim().to_uppercase(),
      currency_symbol: settings.currency_symbol.trim().to_string(),
      language: settings.language.trim().to_string(),
    };
    self.store.set_settings(&settings)?;
    Ok(settings)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{MemoryKv, StoreOptions};

  fn ledger() -> Ledger<MemoryKv> {
    Ledger::new(GoalStore::open(MemoryKv::new(), StoreOptions::default()).unwrap())
  }

  fn bike() -> GoalInput {
    GoalInput {
      name: "Bike".to_string(),
      target_amount: 50_000,
      ..Default::default()
    }
  }

  #[test]
  fn test_bike_scenario() {
    let ledger = ledger();
    let goal = ledger.create_goal(bike()).unwrap();

    ledger
      .record(NewTransaction {
        goal_id: goal.id,
        amount: 20_000,
        note: None,
      })
      .unwrap();
    ledger
      .record(NewTransaction {
        goal_id: goal.id,
        amount: -5_000,
        note: Some("brakes".to_string()),
      })
      .unwrap();

    let detail = ledger.goal(goal.id).unwrap();
    assert_eq!(detail.goal.current_amount, 15_000);
    assert_eq!(detail.transactions.len(), 2);
    assert_eq!(detail.transactions[0].amount, -5_000);
  }

  #[test]
  fn test_goal_defaults_and_inherited_denomination() {
    let ledger = ledger();
    ledger
      .update_settings(Settings {
        currency_code: "eur".to_string(),
        currency_symbol: "€".to_string(),
        language: "fr".to_string(),
      })
      .unwrap();

    let goal = ledger
      .create_goal(GoalInput {
        name: "  Laptop  ".to_string(),
        description: Some("   ".to_string()),
        target_amount: 120_000,
        ..Default::default()
      })
      .unwrap();

    assert_eq!(goal.name, "Laptop");
    assert_eq!(goal.description, None);
    assert_eq!(goal.icon, DEFAULT_ICON);
    assert_eq!(goal.color, GoalColor::Blue);
    assert_eq!(goal.currency_code, "EUR");
    assert_eq!(goal.currency_symbol, "€");

    // Later settings changes leave existing goals alone
    ledger.update_settings(Settings::default()).unwrap();
    assert_eq!(ledger.goal(goal.id).unwrap().goal.currency_code, "EUR");
  }

  #[test]
  fn test_goal_validation() {
    let ledger = ledger();

    let empty = ledger.create_goal(GoalInput {
      name: "   ".to_string(),
      ..bike()
    });
    assert!(matches!(
      empty,
      Err(StoreError::Validation { field: "name", .. })
    ));

    let zero = ledger.create_goal(GoalInput {
      target_amount: 0,
      ..bike()
    });
    assert!(matches!(
      zero,
      Err(StoreError::Validation {
        field: "targetAmount",
        ..
      })
    ));
    assert!(ledger.goals().unwrap().is_empty());
  }

  #[test]
  fn test_transaction_validation() {
    let ledger = ledger();
    let goal = ledger.create_goal(bike()).unwrap();

    assert!(matches!(
      ledger.deposit(goal.id, 0, None),
      Err(StoreError::Validation { .. })
    ));
    assert!(matches!(
      ledger.withdraw(goal.id, -10, None),
      Err(StoreError::Validation { .. })
    ));
    assert!(matches!(
      ledger.deposit(99, 100, None),
      Err(StoreError::GoalNotFound(99))
    ));
    assert!(ledger.goal(goal.id).unwrap().transactions.is_empty());
  }

  #[test]
  fn test_withdrawal_can_go_negative() {
    let ledger = ledger();
    let goal = ledger.create_goal(bike()).unwrap();

    let t = ledger.withdraw(goal.id, 2_500, None).unwrap();
    assert_eq!(t.amount, -2_500);
    assert_eq!(ledger.goal(goal.id).unwrap().goal.current_amount, -2_500);
  }

  #[test]
  fn test_extreme_amounts_do_not_panic() {
    let ledger = ledger();
    let goal = ledger.create_goal(bike()).unwrap();
    ledger.deposit(goal.id, i64::MAX - 1, None).unwrap();
    assert!(matches!(
      ledger.deposit(goal.id, 10, None),
      Err(StoreError::Validation { field: "amount", .. })
    ));

    let huge = ledger
      .create_goal(GoalInput {
        target_amount: i64::MAX,
        ..bike()
      })
      .unwrap();
    ledger.withdraw(huge.id, 10, None).unwrap();
    let detail = ledger.goal(huge.id).unwrap();
    assert_eq!(detail.goal.remaining(), i64::MAX);
  }

  #[test]
  fn test_missing_goal_errors() {
    let ledger = ledger();
    assert!(matches!(ledger.goal(7), Err(StoreError::GoalNotFound(7))));
    assert!(matches!(
      ledger.delete_goal(7),
      Err(StoreError::GoalNotFound(7))
    ));
  }

  #[test]
  fn test_settings_validation() {
    let ledger = ledger();
    let result = ledger.update_settings(Settings {
      currency_code: String::new(),
      ..Settings::default()
    });
    assert!(matches!(
      result,
      Err(StoreError::Validation {
        field: "currencyCode",
        ..
      })
    ));
  }
}

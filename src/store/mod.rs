//! Local record store for goals, transactions and settings.
//!
//! Records are kept as JSON values in a key-value substrate. The store is
//! constructed explicitly with [`GoalStore::open`], which brings the stored
//! data up to the current schema version before anything else reads it.
//!
//! Every operation holds the substrate lock for its whole
//! read-modify-write, and multi-record updates go through one
//! [`KeyValue::set_many`] call, so a transaction is never visible without
//! its balance update.

mod error;
mod models;
mod records;
mod substrate;

use chrono::Utc;
use serde::de::DeserializeOwned;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub use error::StoreError;
pub use models::{
  Goal, GoalColor, GoalDetail, GoalId, NewGoal, NewTransaction, Settings, Transaction,
  DEFAULT_ICON,
};
use records::{StorageKeys, SCHEMA_VERSION};
pub use substrate::KeyValue;
#[cfg(test)]
pub use substrate::MemoryKv;

pub const DEFAULT_KEY_PREFIX: &str = "simple-piggy";

/// Example goals seeded on first run: name, description, target, icon, color.
const DEMO_GOALS: &[(&str, &str, i64, &str, GoalColor)] = &[
  (
    "New Bike 🚲",
    "Saving up for a mountain bike",
    50_000,
    "🚲",
    GoalColor::Green,
  ),
  ("Vacation 🏖️", "Trip to Hawaii", 200_000, "🏖️", GoalColor::Blue),
  (
    "Emergency Fund 🚑",
    "Rainy day savings",
    100_000,
    "🚑",
    GoalColor::Red,
  ),
];

#[derive(Debug, Clone)]
pub struct StoreOptions {
  pub key_prefix: String,
  /// Settings synthesized when none are stored, and the denomination
  /// legacy records are migrated to
  pub defaults: Settings,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      key_prefix: DEFAULT_KEY_PREFIX.to_string(),
      defaults: Settings::default(),
    }
  }
}

pub struct GoalStore<K: KeyValue> {
  kv: Mutex<K>,
  keys: StorageKeys,
  defaults: Settings,
}

impl<K: KeyValue> GoalStore<K> {
  /// Open a store over `kv`, migrating stored records if needed.
  pub fn open(kv: K, options: StoreOptions) -> Result<Self, StoreError> {
    let store = Self {
      kv: Mutex::new(kv),
      keys: StorageKeys::new(&options.key_prefix),
      defaults: options.defaults,
    };
    store.migrate()?;
    Ok(store)
  }

  /// Release the store and hand back the substrate.
  #[allow(dead_code)]
  pub fn close(self) -> K {
    self.kv.into_inner().unwrap_or_else(|e| e.into_inner())
  }

  fn lock(&self) -> Result<MutexGuard<'_, K>, StoreError> {
    self.kv.lock().map_err(|_| StoreError::Poisoned)
  }

  /// Bring stored records up to [`SCHEMA_VERSION`]. Returns whether anything
  /// was rewritten; running it again is a no-op.
  pub fn migrate(&self) -> Result<bool, StoreError> {
    let mut kv = self.lock()?;

    let version = kv
      .get(&self.keys.schema_version)?
      .and_then(|v| v.trim().parse::<u32>().ok())
      .unwrap_or(1);
    if version >= SCHEMA_VERSION {
      return Ok(false);
    }

    let mut writes = Vec::new();

    if let Some(raw) = kv.get(&self.keys.goals)? {
      match records::upgrade_goals(&raw, &self.defaults) {
        Ok(goals) => writes.push((self.keys.goals.as_str(), serde_json::to_string(&goals)?)),
        Err(e) => warn!(error = %e, "Stored goals unreadable, leaving them untouched"),
      }
    }

    if let Some(raw) = kv.get(&self.keys.settings)? {
      match records::upgrade_settings(&raw, &self.defaults) {
        Ok(settings) => writes.push((
          self.keys.settings.as_str(),
          serde_json::to_string(&settings)?,
        )),
        Err(e) => warn!(error = %e, "Stored settings unreadable, leaving them untouched"),
      }
    }

    writes.push((self.keys.schema_version.as_str(), SCHEMA_VERSION.to_string()));
    kv.set_many(&writes)?;

    info!(from = version, to = SCHEMA_VERSION, "Migrated local store");
    Ok(true)
  }

  /// All goals, newest first.
  pub fn list_goals(&self) -> Result<Vec<Goal>, StoreError> {
    let kv = self.lock()?;
    let mut goals: Vec<Goal> = self.read_list(&*kv, &self.keys.goals)?;
    goals.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(goals)
  }

  /// A goal and its transactions, in stored order.
  pub fn get_goal(&self, id: GoalId) -> Result<Option<GoalDetail>, StoreError> {
    let kv = self.lock()?;
    let goals: Vec<Goal> = self.read_list(&*kv, &self.keys.goals)?;

    let Some(goal) = goals.into_iter().find(|g| g.id == id) else {
      return Ok(None);
    };

    let transactions = self
      .read_list::<Transaction>(&*kv, &self.keys.transactions)?
      .into_iter()
      .filter(|t| t.goal_id == id)
      .collect();

    Ok(Some(GoalDetail { goal, transactions }))
  }

  /// Persist a new goal with a fresh id and a zero balance.
  pub fn create_goal(&self, new: NewGoal) -> Result<Goal, StoreError> {
    let mut kv = self.lock()?;
    let mut goals: Vec<Goal> = self.read_list(&*kv, &self.keys.goals)?;
    let id = self.next_id(&*kv, &self.keys.next_goal_id, goals.iter().map(|g| g.id).max())?;

    let goal = Goal {
      id,
      name: new.name,
      description: new.description,
      target_amount: new.target_amount,
      current_amount: 0,
      icon: new.icon,
      color: new.color,
      currency_code: new.currency_code,
      currency_symbol: new.currency_symbol,
      deadline: new.deadline,
      created_at: Utc::now(),
    };
    goals.push(goal.clone());

    kv.set_many(&[
      (self.keys.goals.as_str(), serde_json::to_string(&goals)?),
      (self.keys.next_goal_id.as_str(), (id + 1).to_string()),
    ])?;

    debug!(id, name = %goal.name, "Created goal");
    Ok(goal)
  }

  /// Remove a goal and every transaction recorded against it. Deleting a
  /// missing goal is a no-op.
  pub fn delete_goal(&self, id: GoalId) -> Result<(), StoreError> {
    let mut kv = self.lock()?;
    let goals: Vec<Goal> = self.read_list(&*kv, &self.keys.goals)?;
    let transactions: Vec<Transaction> = self.read_list(&*kv, &self.keys.transactions)?;

    let goal_count = goals.len();
    let transaction_count = transactions.len();
    let goals: Vec<Goal> = goals.into_iter().filter(|g| g.id != id).collect();
    let transactions: Vec<Transaction> = transactions
      .into_iter()
      .filter(|t| t.goal_id != id)
      .collect();

    if goals.len() == goal_count && transactions.len() == transaction_count {
      debug!(id, "Nothing to delete");
      return Ok(());
    }

    kv.set_many(&[
      (self.keys.goals.as_str(), serde_json::to_string(&goals)?),
      (
        self.keys.transactions.as_str(),
        serde_json::to_string(&transactions)?,
      ),
    ])?;

    debug!(
      id,
      transactions = transaction_count - transactions.len(),
      "Deleted goal"
    );
    Ok(())
  }

  /// Record a transaction and apply its amount to the owning goal.
  ///
  /// The goal is not checked for existence here; callers validate first.
  pub fn create_transaction(&self, new: NewTransaction) -> Result<Transaction, StoreError> {
    let mut kv = self.lock()?;
    let mut transactions: Vec<Transaction> = self.read_list(&*kv, &self.keys.transactions)?;
    let mut goals: Vec<Goal> = self.read_list(&*kv, &self.keys.goals)?;
    let id = self.next_id(
      &*kv,
      &self.keys.next_transaction_id,
      transactions.iter().map(|t| t.id).max(),
    )?;

    let transaction = Transaction {
      id,
      goal_id: new.goal_id,
      amount: new.amount,
      note: new.note,
      created_at: Utc::now(),
    };
    transactions.push(transaction.clone());

    let mut writes = vec![
      (
        self.keys.transactions.as_str(),
        serde_json::to_string(&transactions)?,
      ),
      (self.keys.next_transaction_id.as_str(), (id + 1).to_string()),
    ];

    match goals.iter_mut().find(|g| g.id == transaction.goal_id) {
      Some(goal) => {
        goal.current_amount = goal
          .current_amount
          .checked_add(transaction.amount)
          .ok_or_else(|| StoreError::validation("amount", "Balance would overflow"))?;
        writes.push((self.keys.goals.as_str(), serde_json::to_string(&goals)?));
      }
      None => warn!(goal_id = transaction.goal_id, "Transaction recorded for unknown goal"),
    }

    kv.set_many(&writes)?;

    debug!(id, goal_id = transaction.goal_id, amount = transaction.amount, "Recorded transaction");
    Ok(transaction)
  }

  /// Stored settings, or the defaults (persisted on first read).
  pub fn get_settings(&self) -> Result<Settings, StoreError> {
    let mut kv = self.lock()?;

    if let Some(raw) = kv.get(&self.keys.settings)? {
      match serde_json::from_str::<Settings>(&raw) {
        Ok(settings) => return Ok(settings),
        Err(e) => warn!(error = %e, "Stored settings unreadable, restoring defaults"),
      }
    }

    let settings = self.defaults.clone();
    kv.set(&self.keys.settings, &serde_json::to_string(&settings)?)?;
    Ok(settings)
  }

  /// Replace the settings record.
  pub fn set_settings(&self, settings: &Settings) -> Result<(), StoreError> {
    let mut kv = self.lock()?;
    kv.set(&self.keys.settings, &serde_json::to_string(settings)?)?;
    Ok(())
  }

  /// Migrate legacy records, then seed example goals if there are none.
  /// Returns the number of goals seeded.
  pub fn initialize_demo_data(&self) -> Result<usize, StoreError> {
    self.migrate()?;

    if !self.list_goals()?.is_empty() {
      return Ok(0);
    }

    let settings = self.get_settings()?;
    for (name, description, target, icon, color) in DEMO_GOALS {
      self.create_goal(NewGoal {
        name: name.to_string(),
        description: Some(description.to_string()),
        target_amount: *target,
        icon: icon.to_string(),
        color: *color,
        currency_code: settings.currency_code.clone(),
        currency_symbol: settings.currency_symbol.clone(),
        deadline: None,
      })?;
    }

    info!(count = DEMO_GOALS.len(), "Seeded demo goals");
    Ok(DEMO_GOALS.len())
  }

  /// Read a JSON list; missing or unreadable data reads as empty.
  fn read_list<T: DeserializeOwned>(&self, kv: &K, key: &str) -> Result<Vec<T>, StoreError> {
    let Some(raw) = kv.get(key)? else {
      return Ok(Vec::new());
    };

    match serde_json::from_str(&raw) {
      Ok(list) => Ok(list),
      Err(e) => {
        warn!(key, error = %e, "Stored records unreadable, treating as empty");
        Ok(Vec::new())
      }
    }
  }

  /// Next id from a persisted counter, never below one past the highest
  /// id still present.
  fn next_id(&self, kv: &K, counter_key: &str, highest: Option<u64>) -> Result<u64, StoreError> {
    let counter = kv
      .get(counter_key)?
      .and_then(|v| v.trim().parse::<u64>().ok())
      .unwrap_or(1);
    Ok(counter.max(highest.map_or(1, |h| h + 1)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::Database;

  fn open_store() -> GoalStore<MemoryKv> {
    GoalStore::open(MemoryKv::new(), StoreOptions::default()).unwrap()
  }

  fn new_goal(name: &str, target: i64) -> NewGoal {
    NewGoal {
      name: name.to_string(),
      description: None,
      target_amount: target,
      icon: DEFAULT_ICON.to_string(),
      color: GoalColor::default(),
      currency_code: "MGA".to_string(),
      currency_symbol: "Ar".to_string(),
      deadline: None,
    }
  }

  fn deposit(goal_id: GoalId, amount: i64) -> NewTransaction {
    NewTransaction {
      goal_id,
      amount,
      note: None,
    }
  }

  #[test]
  fn test_balance_tracks_transaction_sum() {
    let store = open_store();
    let goal = store.create_goal(new_goal("Bike", 50_000)).unwrap();

    for amount in [20_000, -5_000, 1, -30_000, 7_500] {
      store.create_transaction(deposit(goal.id, amount)).unwrap();
    }

    let detail = store.get_goal(goal.id).unwrap().unwrap();
    let sum: i64 = detail.transactions.iter().map(|t| t.amount).sum();
    assert_eq!(detail.goal.current_amount, sum);
    assert_eq!(sum, -7_499);
  }

  #[test]
  fn test_overflowing_balance_is_rejected_before_writing() {
    let store = open_store();
    let goal = store.create_goal(new_goal("Moon", 100)).unwrap();
    store
      .create_transaction(deposit(goal.id, i64::MAX - 1))
      .unwrap();

    let result = store.create_transaction(deposit(goal.id, 10));
    assert!(matches!(
      result,
      Err(StoreError::Validation { field: "amount", .. })
    ));

    let detail = store.get_goal(goal.id).unwrap().unwrap();
    assert_eq!(detail.goal.current_amount, i64::MAX - 1);
    assert_eq!(detail.transactions.len(), 1);

    // The counter did not move either
    let next = store.create_transaction(deposit(goal.id, -1)).unwrap();
    assert_eq!(next.id, 2);
  }

  #[test]
  fn test_create_goal_ignores_supplied_balance_and_assigns_ids() {
    let store = open_store();
    let first = store.create_goal(new_goal("A", 100)).unwrap();
    let second = store.create_goal(new_goal("B", 100)).unwrap();

    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);
    assert_eq!(first.current_amount, 0);
  }

  #[test]
  fn test_ids_not_reused_after_delete() {
    let store = open_store();
    let first = store.create_goal(new_goal("A", 100)).unwrap();
    store.delete_goal(first.id).unwrap();
    let second = store.create_goal(new_goal("B", 100)).unwrap();

    assert_ne!(first.id, second.id);
  }

  #[test]
  fn test_goal_and_transaction_counters_are_separate() {
    let store = open_store();
    let a = store.create_goal(new_goal("A", 100)).unwrap();
    let b = store.create_goal(new_goal("B", 100)).unwrap();
    let t = store.create_transaction(deposit(b.id, 10)).unwrap();

    assert_eq!((a.id, b.id, t.id), (1, 2, 1));
  }

  #[test]
  fn test_delete_cascades_to_transactions() {
    let store = open_store();
    let keep = store.create_goal(new_goal("Keep", 100)).unwrap();
    let drop = store.create_goal(new_goal("Drop", 100)).unwrap();
    store.create_transaction(deposit(keep.id, 10)).unwrap();
    store.create_transaction(deposit(drop.id, 20)).unwrap();
    store.create_transaction(deposit(drop.id, 30)).unwrap();

    store.delete_goal(drop.id).unwrap();

    assert!(store.get_goal(drop.id).unwrap().is_none());
    let kept = store.get_goal(keep.id).unwrap().unwrap();
    assert_eq!(kept.transactions.len(), 1);

    // A goal recreated later never inherits the old history
    let fresh = store.create_goal(new_goal("Fresh", 100)).unwrap();
    assert!(store.get_goal(fresh.id).unwrap().unwrap().transactions.is_empty());
  }

  #[test]
  fn test_delete_missing_goal_is_noop() {
    let store = open_store();
    store.create_goal(new_goal("A", 100)).unwrap();
    store.delete_goal(42).unwrap();
    assert_eq!(store.list_goals().unwrap().len(), 1);
  }

  #[test]
  fn test_list_goals_newest_first() {
    let store = open_store();
    for name in ["first", "second", "third"] {
      store.create_goal(new_goal(name, 100)).unwrap();
    }

    let names: Vec<String> = store
      .list_goals()
      .unwrap()
      .into_iter()
      .map(|g| g.name)
      .collect();
    assert_eq!(names, vec!["third", "second", "first"]);
  }

  #[test]
  fn test_corrupt_goals_read_as_empty() {
    let mut kv = MemoryKv::new();
    kv.set("simple-piggy-schema-version", "2").unwrap();
    kv.set("simple-piggy-goals", "[{broken").unwrap();
    kv.set("simple-piggy-transactions", "nope").unwrap();
    let store = GoalStore::open(kv, StoreOptions::default()).unwrap();

    assert!(store.list_goals().unwrap().is_empty());
    assert!(store.get_goal(1).unwrap().is_none());

    // Writing recovers the record
    let goal = store.create_goal(new_goal("Recovered", 100)).unwrap();
    store.create_transaction(deposit(goal.id, 5)).unwrap();
    assert_eq!(store.get_goal(goal.id).unwrap().unwrap().goal.current_amount, 5);
  }

  #[test]
  fn test_settings_default_persisted_once() {
    let store = open_store();

    let first = store.get_settings().unwrap();
    assert_eq!(first, Settings::default());
    assert_eq!(first.currency_code, "MGA");

    let kv = store.close();
    assert!(kv.get("simple-piggy-settings").unwrap().is_some());

    let store = GoalStore::open(kv, StoreOptions::default()).unwrap();
    assert_eq!(store.get_settings().unwrap(), first);
  }

  #[test]
  fn test_corrupt_settings_restore_defaults() {
    let mut kv = MemoryKv::new();
    kv.set("simple-piggy-schema-version", "2").unwrap();
    kv.set("simple-piggy-settings", "{{{").unwrap();
    let store = GoalStore::open(kv, StoreOptions::default()).unwrap();

    assert_eq!(store.get_settings().unwrap(), Settings::default());
  }

  #[test]
  fn test_set_settings_overwrites() {
    let store = open_store();
    let euro = Settings {
      currency_code: "EUR".to_string(),
      currency_symbol: "€".to_string(),
      language: "fr".to_string(),
    };
    store.set_settings(&euro).unwrap();
    assert_eq!(store.get_settings().unwrap(), euro);
  }

  #[test]
  fn test_counter_never_behind_existing_ids() {
    let store = open_store();
    store.create_goal(new_goal("A", 100)).unwrap();
    store.create_goal(new_goal("B", 100)).unwrap();

    let mut kv = store.close();
    kv.remove("simple-piggy-next-goal-id").unwrap();
    let store = GoalStore::open(kv, StoreOptions::default()).unwrap();

    assert_eq!(store.create_goal(new_goal("C", 100)).unwrap().id, 3);
  }

  #[test]
  fn test_legacy_records_migrated_on_open() {
    let mut kv = MemoryKv::new();
    kv.set(
      "simple-piggy-goals",
      r#"[{"id":1,"name":"Bike","description":null,"targetAmount":50000,"currentAmount":0,
          "icon":"🚲","color":"emerald","currencyCode":"USD","currencySymbol":"$",
          "createdAt":"2024-01-01T00:00:00Z"}]"#,
    )
    .unwrap();
    kv.set(
      "simple-piggy-settings",
      r#"{"currencyCode":"USD","currencySymbol":"$"}"#,
    )
    .unwrap();

    let store = GoalStore::open(kv, StoreOptions::default()).unwrap();

    let goal = &store.list_goals().unwrap()[0];
    assert_eq!(goal.currency_code, "MGA");
    assert_eq!(goal.deadline, None);
    assert_eq!(store.get_settings().unwrap(), Settings::default());
    assert!(!store.migrate().unwrap());

    let kv = store.close();
    let raw = kv.get("simple-piggy-goals").unwrap().unwrap();
    assert!(raw.contains("\"deadline\":null"));
    assert_eq!(
      kv.get("simple-piggy-schema-version").unwrap().as_deref(),
      Some("2")
    );
  }

  #[test]
  fn test_demo_data_seeded_once() {
    let store = open_store();

    assert_eq!(store.initialize_demo_data().unwrap(), 3);
    assert_eq!(store.initialize_demo_data().unwrap(), 0);

    let goals = store.list_goals().unwrap();
    assert_eq!(goals.len(), 3);
    assert!(goals.iter().all(|g| g.deadline.is_none()));
    assert!(goals.iter().all(|g| g.currency_code == "MGA"));
  }

  #[test]
  fn test_demo_data_uses_configured_denomination() {
    let store = open_store();
    store
      .set_settings(&Settings {
        currency_code: "EUR".to_string(),
        currency_symbol: "€".to_string(),
        language: "en".to_string(),
      })
      .unwrap();

    store.initialize_demo_data().unwrap();
    assert!(store
      .list_goals()
      .unwrap()
      .iter()
      .all(|g| g.currency_symbol == "€"));
  }

  #[test]
  fn test_sqlite_substrate_round_trip() {
    let store = GoalStore::open(
      Database::open_in_memory().unwrap(),
      StoreOptions::default(),
    )
    .unwrap();
    let goal = store.create_goal(new_goal("Bike", 50_000)).unwrap();
    store.create_transaction(deposit(goal.id, 20_000)).unwrap();
    store.create_transaction(deposit(goal.id, -5_000)).unwrap();

    let detail = store.get_goal(goal.id).unwrap().unwrap();
    assert_eq!(detail.goal.current_amount, 15_000);
    assert_eq!(detail.transactions.len(), 2);
  }
}

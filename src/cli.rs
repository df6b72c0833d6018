use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use color_eyre::Result;
use reqwest::Method;
use std::path::PathBuf;
use tracing::debug;
use url::Url;

use crate::advice::savings_plan;
use crate::cache::{
  CacheStorage, ControlMessage, Destination, Fetcher, HttpFetcher, Outcome, Ownership, Request,
  ResourceCache, SqliteStorage,
};
use crate::config::Config;
use crate::db::Database;
use crate::ledger::{GoalInput, Ledger};
use crate::store::{Goal, GoalColor, GoalId, GoalStore, Settings};

#[derive(Parser, Debug)]
#[command(name = "piggyback")]
#[command(about = "Offline-first savings goal tracker")]
#[command(version)]
pub struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/piggyback/config.yaml)
  #[arg(short, long)]
  pub config: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Manage savings goals
  #[command(subcommand)]
  Goals(GoalsCommand),

  /// Put money towards a goal
  Deposit {
    goal_id: GoalId,
    /// Amount in major units, e.g. 150.50
    #[arg(value_parser = parse_minor_units)]
    amount: i64,
    #[arg(short, long)]
    note: Option<String>,
  },

  /// Take money out of a goal
  Withdraw {
    goal_id: GoalId,
    #[arg(value_parser = parse_minor_units)]
    amount: i64,
    #[arg(short, long)]
    note: Option<String>,
  },

  /// Show or change the default currency and language
  #[command(subcommand)]
  Settings(SettingsCommand),

  /// Drive the offline resource cache
  #[command(subcommand)]
  Cache(CacheCommand),

  /// Seed example goals into an empty store
  Demo,
}

#[derive(Subcommand, Debug)]
pub enum GoalsCommand {
  List,
  Show {
    id: GoalId,
    /// Print the goal and its transactions as JSON
    #[arg(long)]
    json: bool,
  },
  Create {
    #[arg(long)]
    name: String,
    /// Target in major units
    #[arg(long, value_parser = parse_minor_units)]
    target: i64,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    icon: Option<String>,
    #[arg(long)]
    color: Option<GoalColor>,
    /// YYYY-MM-DD
    #[arg(long)]
    deadline: Option<NaiveDate>,
  },
  Delete {
    id: GoalId,
  },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
  Show,
  Set {
    #[arg(long)]
    currency_code: Option<String>,
    #[arg(long)]
    currency_symbol: Option<String>,
    #[arg(long)]
    language: Option<String>,
  },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
  /// Precache the static manifest for the configured version
  Install,
  /// Prune caches left by other versions
  Activate,
  /// List caches and how they relate to the running version
  List,
  /// Request a resource through the cache
  Fetch {
    /// Absolute URL or a path under the configured origin
    target: String,
    /// Treat the request as a page navigation
    #[arg(long)]
    navigate: bool,
    /// Only GET requests are intercepted
    #[arg(long, default_value = "GET")]
    method: Method,
    #[arg(long, value_enum)]
    destination: Option<Destination>,
    /// Fail every network attempt
    #[arg(long)]
    offline: bool,
  },
  /// Post a control message: skip-waiting, clear-cache or a JSON object
  Message {
    #[arg(value_parser = parse_message)]
    message: ControlMessage,
  },
}

pub async fn run(args: Args, config: Config) -> Result<()> {
  match args.command {
    Command::Goals(cmd) => goals(cmd, &open_ledger(&config)?),
    Command::Deposit {
      goal_id,
      amount,
      note,
    } => {
      let ledger = open_ledger(&config)?;
      let t = ledger.deposit(goal_id, amount, note)?;
      report_balance(&ledger, goal_id, t.amount)
    }
    Command::Withdraw {
      goal_id,
      amount,
      note,
    } => {
      let ledger = open_ledger(&config)?;
      let t = ledger.withdraw(goal_id, amount, note)?;
      report_balance(&ledger, goal_id, t.amount)
    }
    Command::Settings(cmd) => settings(cmd, &open_ledger(&config)?),
    Command::Cache(cmd) => cache(cmd, &config).await,
    Command::Demo => {
      let ledger = open_ledger(&config)?;
      let created = ledger.store().initialize_demo_data()?;
      if created == 0 {
        println!("Store already has goals, nothing seeded");
      } else {
        println!("Seeded {} example goals", created);
      }
      Ok(())
    }
  }
}

fn open_ledger(config: &Config) -> Result<Ledger<Database>> {
  let db = Database::open(&config.store_path()?)?;
  let store = GoalStore::open(db, config.store_options())?;
  Ok(Ledger::new(store))
}

fn goals(cmd: GoalsCommand, ledger: &Ledger<Database>) -> Result<()> {
  match cmd {
    GoalsCommand::List => {
      let goals = ledger.goals()?;
      if goals.is_empty() {
        println!("No goals yet. Create one or run `piggyback demo`.");
      }
      for goal in &goals {
        println!("{}", goal_line(goal));
      }
    }
    GoalsCommand::Show { id, json } => {
      let detail = ledger.goal(id)?;
      if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
      }

      let goal = &detail.goal;
      println!("{}", goal_line(goal));
      if let Some(description) = &goal.description {
        println!("  {}", description);
      }
      println!(
        "  Remaining: {}",
        format_money(goal.remaining(), &goal.currency_symbol)
      );
      if let Some(deadline) = goal.deadline {
        println!("  Deadline: {}", deadline);
      }
      if let Some(plan) = savings_plan(goal, Local::now().date_naive()) {
        println!(
          "  Save {} per {} for {} {}(s){}",
          format_money(plan.amount_per_period.ceil() as i64, &goal.currency_symbol),
          plan.period.as_str(),
          plan.periods,
          plan.period.as_str(),
          if plan.urgent { " (urgent)" } else { "" }
        );
      }

      if !detail.transactions.is_empty() {
        println!();
      }
      for t in &detail.transactions {
        println!(
          "  {}  {:<10}  {:>14}  {}",
          t.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
          if t.is_deposit() { "deposit" } else { "withdrawal" },
          format_money(t.amount, &goal.currency_symbol),
          t.note.as_deref().unwrap_or("")
        );
      }
    }
    GoalsCommand::Create {
      name,
      target,
      description,
      icon,
      color,
      deadline,
    } => {
      let goal = ledger.create_goal(GoalInput {
        name,
        description,
        target_amount: target,
        icon,
        color,
        deadline,
      })?;
      println!("Created goal #{}: {}", goal.id, goal.name);
    }
    GoalsCommand::Delete { id } => {
      ledger.delete_goal(id)?;
      println!("Deleted goal #{}", id);
    }
  }
  Ok(())
}

fn settings(cmd: SettingsCommand, ledger: &Ledger<Database>) -> Result<()> {
  let current = ledger.settings()?;
  let settings = match cmd {
    SettingsCommand::Show => current,
    SettingsCommand::Set {
      currency_code,
      currency_symbol,
      language,
    } => ledger.update_settings(Settings {
      currency_code: currency_code.unwrap_or(current.currency_code),
      currency_symbol: currency_symbol.unwrap_or(current.currency_symbol),
      language: language.unwrap_or(current.language),
    })?,
  };

  println!("Currency: {} ({})", settings.currency_code, settings.currency_symbol);
  println!("Language: {}", settings.language);
  Ok(())
}

fn report_balance(ledger: &Ledger<Database>, goal_id: GoalId, amount: i64) -> Result<()> {
  let goal = ledger.goal(goal_id)?.goal;
  println!(
    "Recorded {} on {}",
    format_money(amount, &goal.currency_symbol),
    goal.name
  );
  println!("{}", goal_line(&goal));
  Ok(())
}

fn goal_line(goal: &Goal) -> String {
  format!(
    "#{:<3} {} {}  {} / {} ({:.0}%){}",
    goal.id,
    goal.icon,
    goal.name,
    format_money(goal.current_amount, &goal.currency_symbol),
    format_money(goal.target_amount, &goal.currency_symbol),
    goal.progress_percent(),
    if goal.is_reached() { " reached" } else { "" }
  )
}

async fn cache(cmd: CacheCommand, config: &Config) -> Result<()> {
  let offline = matches!(cmd, CacheCommand::Fetch { offline: true, .. });
  let fetcher = HttpFetcher::new()?.with_offline(offline);
  let storage = SqliteStorage::open(&config.cache_path()?)?;
  let cache = ResourceCache::new(storage, fetcher.clone(), config.controller_options()?)?;
  cache.set_online(!offline);

  match cmd {
    CacheCommand::Install => {
      cache.install().await?;
      println!(
        "Installed version {} ({:?}, {})",
        cache.naming().version(),
        cache.state(),
        if cache.is_controlling() {
          "controlling"
        } else {
          "waiting"
        }
      );
    }
    CacheCommand::Activate => {
      for name in cache.activate()? {
        println!("Deleted {}", name);
      }
    }
    CacheCommand::List => {
      for name in cache.storage().keys()? {
        let entries = cache.storage().entries(&name)?.len();
        let owner = match cache.naming().classify(&name) {
          Ownership::Current(partition) => format!("current {}", partition),
          Ownership::Stale => "stale".to_string(),
          Ownership::Foreign => "foreign".to_string(),
        };
        println!("{:<32} {:>5} entries  {}", name, entries, owner);
      }
    }
    CacheCommand::Fetch {
      target,
      navigate,
      method,
      destination,
      ..
    } => {
      let url = resolve_target(&config.origin()?, &target)?;
      let request = if navigate {
        Request::navigate(url)
      } else {
        Request::get(url).with_destination(destination.unwrap_or_default())
      }
      .with_method(method);

      match cache.handle(request.clone()).await? {
        Outcome::Respond(served) => {
          let response = &served.response;
          println!(
            "{} {} {} bytes from {:?}",
            response.status,
            response.content_type.as_deref().unwrap_or("-"),
            response.body.len(),
            served.source
          );
        }
        Outcome::Passthrough => {
          debug!(url = %request.url, "Not intercepted, fetching directly");
          let response = fetcher.fetch(&request).await?;
          println!(
            "{} {} {} bytes, not cached",
            response.status,
            response.content_type.as_deref().unwrap_or("-"),
            response.body.len()
          );
        }
      }
    }
    CacheCommand::Message { message } => {
      cache.handle_message(message)?;
      println!("Delivered {:?} ({:?})", message, cache.state());
    }
  }

  cache.settle().await;
  Ok(())
}

fn resolve_target(origin: &Url, target: &str) -> Result<Url> {
  if target.starts_with("http://") || target.starts_with("https://") {
    return Ok(Url::parse(target)?);
  }
  Ok(origin.join(target)?)
}

/// Parse a non-negative amount in major units ("150", "150.5", "150.50")
/// into the smallest currency unit.
pub fn parse_minor_units(input: &str) -> Result<i64, String> {
  let input = input.trim();
  let (whole, fraction) = input.split_once('.').unwrap_or((input, ""));

  let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
  if (whole.is_empty() && fraction.is_empty()) || !digits(whole) || !digits(fraction) {
    return Err(format!("'{}' is not an amount", input));
  }
  if fraction.len() > 2 {
    return Err(format!("'{}' has more than two decimal places", input));
  }

  let whole: i64 = if whole.is_empty() {
    0
  } else {
    whole
      .parse()
      .map_err(|_| format!("'{}' is too large", input))?
  };
  let cents: i64 = format!("{:0<2}", fraction)
    .parse()
    .map_err(|_| format!("'{}' is not an amount", input))?;

  whole
    .checked_mul(100)
    .and_then(|w| w.checked_add(cents))
    .ok_or_else(|| format!("'{}' is too large", input))
}

pub fn format_money(amount: i64, symbol: &str) -> String {
  let sign = if amount < 0 { "-" } else { "" };
  let abs = amount.unsigned_abs();
  format!("{}{} {}.{:02}", sign, symbol, abs / 100, abs % 100)
}

fn parse_message(input: &str) -> Result<ControlMessage, String> {
  match input.trim() {
    "skip-waiting" => Ok(ControlMessage::SkipWaiting),
    "clear-cache" => Ok(ControlMessage::ClearCache),
    json if json.starts_with('{') => serde_json::from_str(json).map_err(|e| e.to_string()),
    other => Err(format!("unknown message '{}'", other)),
  }
}

//! Saving-pace suggestions for goals with a deadline.

use chrono::NaiveDate;

use crate::store::Goal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
  Day,
  Week,
  Month,
}

impl Period {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Day => "day",
      Self::Week => "week",
      Self::Month => "month",
    }
  }
}

/// How much to put aside per period to reach a goal on time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavingsPlan {
  pub period: Period,
  /// In the smallest currency unit; fractional
  pub amount_per_period: f64,
  /// Number of whole periods until the deadline
  pub periods: i64,
  /// Three days or fewer left
  pub urgent: bool,
}

/// Suggest a saving pace, or `None` when the goal has no deadline, the
/// deadline has passed, or the target is already reached.
pub fn savings_plan(goal: &Goal, today: NaiveDate) -> Option<SavingsPlan> {
  let deadline = goal.deadline?;
  let days = (deadline - today).num_days();
  if days < 0 {
    return None;
  }

  let remaining = goal.remaining();
  if remaining == 0 {
    return None;
  }

  // Due today still leaves one day to save
  let days = days.max(1);
  let weeks = (days + 6) / 7;
  let months = ((days + 29) / 30).max(1);

  let remaining = remaining as f64;
  let per_day = remaining / days as f64;
  let per_week = remaining / weeks as f64;
  let per_month = remaining / months as f64;

  let (period, amount_per_period, periods) = if days <= 7 {
    (Period::Day, per_day, days)
  } else if days <= 21 {
    let daily_share = per_day / remaining * 100.0;
    if daily_share < 0.5 && days >= 7 {
      (Period::Week, per_week, weeks)
    } else {
      (Period::Day, per_day, days)
    }
  } else if days <= 90 {
    let weekly_share = per_week / remaining * 100.0;
    if weekly_share < 2.0 && days >= 30 {
      (Period::Month, per_month, months)
    } else {
      (Period::Week, per_week, weeks)
    }
  } else {
    (Period::Month, per_month, months)
  };

  Some(SavingsPlan {
    period,
    amount_per_period,
    periods,
    urgent: period == Period::Day && periods <= 3,
  })
}

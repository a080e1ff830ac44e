//! Budget threshold alerts.
//!
//! Alerts are bucketed by scope and by percentage decile, so a budget that
//! moves from 83% to 86% alerts once while crossing into the 90s alerts again.
//! The set of already-alerted buckets lives in memory only.

use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::debug;

use crate::notify::{Notifier, Severity};
use crate::remote::types::{Budget, Transaction, TransactionKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertScope {
  Monthly,
  Category(String),
}

impl fmt::Display for AlertScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Monthly => f.write_str("monthly budget"),
      Self::Category(name) => write!(f, "{} budget", name),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetAlert {
  pub scope: AlertScope,
  pub spent: f64,
  pub limit: f64,
  pub percentage: f64,
}

impl BudgetAlert {
  pub fn decile(&self) -> u32 {
    (self.percentage / 10.0).floor() as u32
  }

  /// Dedup key: scope plus decile.
  pub fn bucket_key(&self) -> String {
    match &self.scope {
      AlertScope::Monthly => format!("monthly:{}", self.decile()),
      AlertScope::Category(name) => format!("category:{}:{}", name.to_lowercase(), self.decile()),
    }
  }

  pub fn severity(&self) -> Severity {
    if self.percentage >= 100.0 {
      Severity::Error
    } else {
      Severity::Warning
    }
  }

  pub fn message(&self) -> String {
    if self.percentage >= 100.0 {
      format!(
        "{} exceeded: {:.2} of {:.2} spent ({:.0}%)",
        capitalize(&self.scope.to_string()),
        self.spent,
        self.limit,
        self.percentage
      )
    } else {
      format!(
        "{:.0}% of your {} used ({:.2} of {:.2})",
        self.percentage, self.scope, self.spent, self.limit
      )
    }
  }
}

fn capitalize(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

/// Remembers which alert buckets were already surfaced.
pub struct BudgetAlertEvaluator {
  threshold_percent: f64,
  alerted: BTreeSet<String>,
}

impl BudgetAlertEvaluator {
  pub fn new(threshold_percent: f64) -> Self {
    Self {
      threshold_percent,
      alerted: BTreeSet::new(),
    }
  }

  /// All budgets at or above the threshold for the month containing `month`.
  pub fn compute(
    &self,
    transactions: &[Transaction],
    budgets: &[Budget],
    month: NaiveDate,
  ) -> Vec<BudgetAlert> {
    let in_month: Vec<&Transaction> = transactions
      .iter()
      .filter(|t| t.kind == TransactionKind::Expense)
      .filter(|t| t.date.year() == month.year() && t.date.month() == month.month())
      .collect();

    let total: f64 = in_month.iter().map(|t| t.amount).sum();
    let mut by_category: HashMap<String, f64> = HashMap::new();
    for t in &in_month {
      *by_category.entry(t.category.to_lowercase()).or_insert(0.0) += t.amount;
    }

    budgets
      .iter()
      .filter(|b| b.amount > 0.0)
      .filter_map(|b| {
        let (scope, spent) = match &b.category {
          None => (AlertScope::Monthly, total),
          Some(category) => {
            let spent = by_category
              .get(&category.to_lowercase())
              .copied()
              .unwrap_or(0.0);
            (AlertScope::Category(category.clone()), spent)
          }
        };
        let percentage = spent / b.amount * 100.0;
        (percentage >= self.threshold_percent).then_some(BudgetAlert {
          scope,
          spent,
          limit: b.amount,
          percentage,
        })
      })
      .collect()
  }

  /// Recompute alerts and notify once per newly crossed bucket.
  ///
  /// The remembered set is replaced by the current one, so a budget that
  /// drops below the threshold can alert again when it crosses back.
  pub fn evaluate<N: Notifier + ?Sized>(
    &mut self,
    transactions: &[Transaction],
    budgets: &[Budget],
    month: NaiveDate,
    notifier: &N,
  ) -> Vec<BudgetAlert> {
    let current = self.compute(transactions, budgets, month);
    let keys: BTreeSet<String> = current.iter().map(BudgetAlert::bucket_key).collect();

    let fresh: Vec<BudgetAlert> = current
      .into_iter()
      .filter(|alert| !self.alerted.contains(&alert.bucket_key()))
      .collect();

    for alert in &fresh {
      debug!(bucket = %alert.bucket_key(), "Budget threshold crossed");
      notifier.notify(alert.severity(), &alert.message());
    }

    self.alerted = keys;
    fresh
  }
}

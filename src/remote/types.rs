use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Remote tables the client knows how to write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
  Transactions,
  Budgets,
  RecurringTransactions,
  BillReminders,
}

impl Table {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Transactions => "transactions",
      Self::Budgets => "budgets",
      Self::RecurringTransactions => "recurring_transactions",
      Self::BillReminders => "bill_reminders",
    }
  }
}

impl fmt::Display for Table {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Table {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().replace('-', "_").as_str() {
      "transactions" | "transaction" | "tx" => Ok(Self::Transactions),
      "budgets" | "budget" => Ok(Self::Budgets),
      "recurring_transactions" | "recurring" => Ok(Self::RecurringTransactions),
      "bill_reminders" | "reminders" | "bills" => Ok(Self::BillReminders),
      other => Err(format!("Unknown table: {}", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
  Income,
  Expense,
}

impl FromStr for TransactionKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "income" => Ok(Self::Income),
      "expense" => Ok(Self::Expense),
      other => Err(format!("Unknown transaction kind: {}", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
  Daily,
  Weekly,
  Monthly,
  Yearly,
}

// ============================================================================
// Rows
// ============================================================================

/// A single income or expense entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(rename = "type")]
  pub kind: TransactionKind,
  pub amount: f64,
  pub category: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub date: NaiveDate,
}

/// Monthly spending limit. `category: None` is the overall monthly budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(default)]
  pub category: Option<String>,
  pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTransaction {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(rename = "type")]
  pub kind: TransactionKind,
  pub amount: f64,
  pub category: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub frequency: Frequency,
  pub next_date: NaiveDate,
  #[serde(default = "default_true")]
  pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillReminder {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  pub name: String,
  pub amount: f64,
  pub due_date: NaiveDate,
  #[serde(default = "default_remind_days")]
  pub remind_days_before: u32,
  #[serde(default)]
  pub paid: bool,
}

fn default_true() -> bool {
  true
}

fn default_remind_days() -> u32 {
  3
}

// ============================================================================
// Patches (partial updates, absent fields are left untouched remotely)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub kind: Option<TransactionKind>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub amount: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecurringTransactionPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub amount: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub frequency: Option<Frequency>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub next_date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillReminderPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub amount: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub paid: Option<bool>,
}

// ============================================================================
// Sum types over tables
// ============================================================================

/// A full row destined for (or returned by) one of the remote tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", content = "data", rename_all = "snake_case")]
pub enum Record {
  Transactions(Transaction),
  Budgets(Budget),
  RecurringTransactions(RecurringTransaction),
  BillReminders(BillReminder),
}

impl Record {
  pub fn table(&self) -> Table {
    match self {
      Self::Transactions(_) => Table::Transactions,
      Self::Budgets(_) => Table::Budgets,
      Self::RecurringTransactions(_) => Table::RecurringTransactions,
      Self::BillReminders(_) => Table::BillReminders,
    }
  }

  #[cfg(test)]
  pub fn id(&self) -> Option<&str> {
    match self {
      Self::Transactions(r) => r.id.as_deref(),
      Self::Budgets(r) => r.id.as_deref(),
      Self::RecurringTransactions(r) => r.id.as_deref(),
      Self::BillReminders(r) => r.id.as_deref(),
    }
  }

  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    let id = Some(id.into());
    match &mut self {
      Self::Transactions(r) => r.id = id,
      Self::Budgets(r) => r.id = id,
      Self::RecurringTransactions(r) => r.id = id,
      Self::BillReminders(r) => r.id = id,
    }
    self
  }

  /// The row as the remote store expects it in a request body.
  pub fn to_row_json(&self) -> serde_json::Result<serde_json::Value> {
    match self {
      Self::Transactions(r) => serde_json::to_value(r),
      Self::Budgets(r) => serde_json::to_value(r),
      Self::RecurringTransactions(r) => serde_json::to_value(r),
      Self::BillReminders(r) => serde_json::to_value(r),
    }
  }

  /// Decode a bare row returned by the remote store for `table`.
  pub fn from_row_json(table: Table, value: serde_json::Value) -> serde_json::Result<Self> {
    Ok(match table {
      Table::Transactions => Self::Transactions(serde_json::from_value(value)?),
      Table::Budgets => Self::Budgets(serde_json::from_value(value)?),
      Table::RecurringTransactions => Self::RecurringTransactions(serde_json::from_value(value)?),
      Table::BillReminders => Self::BillReminders(serde_json::from_value(value)?),
    })
  }
}

/// A partial update to a row of one of the remote tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", content = "data", rename_all = "snake_case")]
pub enum Patch {
  Transactions(TransactionPatch),
  Budgets(BudgetPatch),
  RecurringTransactions(RecurringTransactionPatch),
  BillReminders(BillReminderPatch),
}

impl Patch {
  pub fn table(&self) -> Table {
    match self {
      Self::Transactions(_) => Table::Transactions,
      Self::Budgets(_) => Table::Budgets,
      Self::RecurringTransactions(_) => Table::RecurringTransactions,
      Self::BillReminders(_) => Table::BillReminders,
    }
  }

  pub fn to_row_json(&self) -> serde_json::Result<serde_json::Value> {
    match self {
      Self::Transactions(p) => serde_json::to_value(p),
      Self::Budgets(p) => serde_json::to_value(p),
      Self::RecurringTransactions(p) => serde_json::to_value(p),
      Self::BillReminders(p) => serde_json::to_value(p),
    }
  }
}

/// Row types that map to exactly one remote table.
pub trait Row: Clone + Serialize + DeserializeOwned {
  fn table() -> Table;

  fn into_record(self) -> Record;

  fn from_record(record: Record) -> Option<Self>;
}

macro_rules! impl_row {
  ($ty:ty, $variant:ident) => {
    impl Row for $ty {
      fn table() -> Table {
        Table::$variant
      }

      fn into_record(self) -> Record {
        Record::$variant(self)
      }

      fn from_record(record: Record) -> Option<Self> {
        match record {
          Record::$variant(row) => Some(row),
          _ => None,
        }
      }
    }
  };
}

impl_row!(Transaction, Transactions);
impl_row!(Budget, Budgets);
impl_row!(RecurringTransaction, RecurringTransactions);
impl_row!(BillReminder, BillReminders);

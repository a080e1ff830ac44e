//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::remote::types::{BillReminder, Budget, RecurringTransaction, Transaction};
use crate::remote::Row;

/// Last-known-good rows of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", content = "rows", rename_all = "snake_case")]
pub enum Snapshot {
  Transactions(Vec<Transaction>),
  Budgets(Vec<Budget>),
  RecurringTransactions(Vec<RecurringTransaction>),
  BillReminders(Vec<BillReminder>),
}

impl Snapshot {
  pub fn len(&self) -> usize {
    match self {
      Self::Transactions(rows) => rows.len(),
      Self::Budgets(rows) => rows.len(),
      Self::RecurringTransactions(rows) => rows.len(),
      Self::BillReminders(rows) => rows.len(),
    }
  }

  #[allow(dead_code)]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Row types that can be stored as a [`Snapshot`].
pub trait Cacheable: Row {
  fn into_snapshot(rows: Vec<Self>) -> Snapshot;

  fn from_snapshot(snapshot: Snapshot) -> Option<Vec<Self>>;
}

macro_rules! impl_cacheable {
  ($ty:ty, $variant:ident) => {
    impl Cacheable for $ty {
      fn into_snapshot(rows: Vec<Self>) -> Snapshot {
        Snapshot::$variant(rows)
      }

      fn from_snapshot(snapshot: Snapshot) -> Option<Vec<Self>> {
        match snapshot {
          Snapshot::$variant(rows) => Some(rows),
          _ => None,
        }
      }
    }
  };
}

impl_cacheable!(Transaction, Transactions);
impl_cacheable!(Budget, Budgets);
impl_cacheable!(RecurringTransaction, RecurringTransactions);
impl_cacheable!(BillReminder, BillReminders);

/// One cached dataset. At most one entry exists per key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntry {
  pub key: String,
  pub data: Snapshot,
  /// When the entry was written
  pub timestamp: DateTime<Utc>,
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>, source: CacheSource) -> Self {
    Self {
      data,
      source,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Online, but the fetch failed and cached data was served instead
  CacheFallback,
  /// Offline mode - serving cached data without trying the network
  Offline,
}

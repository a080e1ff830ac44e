//! Queued write operations.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::remote::{Patch, Record, RemoteStore, Table};

/// Prefix of identifiers handed out for inserts that have not reached the remote store.
pub const TEMP_ID_PREFIX: &str = "temp_";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn unique_suffix() -> String {
  format!(
    "{}_{}",
    Utc::now().timestamp_millis(),
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
  )
}

/// A fresh temporary identifier, e.g. `temp_1760870400000_3`.
pub fn temporary_id() -> String {
  format!("{}{}", TEMP_ID_PREFIX, unique_suffix())
}

/// Whether `id` was generated locally rather than assigned by the remote store.
#[allow(dead_code)]
pub fn is_temporary_id(id: &str) -> bool {
  id.starts_with(TEMP_ID_PREFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
  Insert,
  Update,
  Delete,
}

impl fmt::Display for MutationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      Self::Insert => "insert",
      Self::Update => "update",
      Self::Delete => "delete",
    };
    f.write_str(label)
  }
}

/// The remote operation a mutation replays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Operation {
  Insert { record: Record },
  Update {
    #[serde(rename = "target_id")]
    id: String,
    patch: Patch,
  },
  Delete {
    table: Table,
    #[serde(rename = "target_id")]
    id: String,
  },
}

/// A write captured while offline, replayed in order on the next drain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
  pub id: String,
  #[serde(flatten)]
  pub operation: Operation,
  pub enqueued_at: DateTime<Utc>,
}

impl PendingMutation {
  /// Queue an insert. The mutation id doubles as the row's temporary id.
  pub fn insert(record: Record) -> Self {
    Self {
      id: temporary_id(),
      operation: Operation::Insert { record },
      enqueued_at: Utc::now(),
    }
  }

  pub fn update(id: impl Into<String>, patch: Patch) -> Self {
    let id = id.into();
    Self {
      id: format!("update_{}_{}", id, unique_suffix()),
      operation: Operation::Update { id, patch },
      enqueued_at: Utc::now(),
    }
  }

  pub fn delete(table: Table, id: impl Into<String>) -> Self {
    let id = id.into();
    Self {
      id: format!("delete_{}_{}", id, unique_suffix()),
      operation: Operation::Delete { table, id },
      enqueued_at: Utc::now(),
    }
  }

  pub fn kind(&self) -> MutationKind {
    match self.operation {
      Operation::Insert { .. } => MutationKind::Insert,
      Operation::Update { .. } => MutationKind::Update,
      Operation::Delete { .. } => MutationKind::Delete,
    }
  }

  pub fn target(&self) -> Table {
    match &self.operation {
      Operation::Insert { record } => record.table(),
      Operation::Update { patch, .. } => patch.table(),
      Operation::Delete { table, .. } => *table,
    }
  }

  /// Id of the remote row this mutation touches (None for inserts).
  pub fn target_id(&self) -> Option<&str> {
    match &self.operation {
      Operation::Insert { .. } => None,
      Operation::Update { id, .. } | Operation::Delete { id, .. } => Some(id),
    }
  }

  /// Apply this mutation against the remote store.
  pub async fn replay<R: RemoteStore>(&self, remote: &R) -> Result<()> {
    match &self.operation {
      Operation::Insert { record } => remote.insert(record).await.map(|_| ()),
      Operation::Update { id, patch } => remote.update(id, patch).await.map(|_| ()),
      Operation::Delete { table, id } => remote.delete(*table, id).await,
    }
  }
}

impl fmt::Display for PendingMutation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.target_id() {
      Some(target_id) => write!(f, "{} {} {}", self.kind(), self.target(), target_id),
      None => write!(f, "{} {} ({})", self.kind(), self.target(), self.id),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::types::{Budget, BudgetPatch};

  fn budget() -> Record {
    Record::Budgets(Budget {
      id: None,
      category: Some("food".to_string()),
      amount: 300.0,
    })
  }

  #[test]
  fn test_insert_gets_temporary_id() {
    let mutation = PendingMutation::insert(budget());
    assert!(is_temporary_id(&mutation.id));
    assert_eq!(mutation.kind(), MutationKind::Insert);
    assert_eq!(mutation.target(), Table::Budgets);
    assert_eq!(mutation.target_id(), None);
  }

  #[test]
  fn test_update_ids_are_unique_per_enqueue() {
    let patch = Patch::Budgets(BudgetPatch::default());
    let a = PendingMutation::update("b1", patch.clone());
    let b = PendingMutation::update("b1", patch);
    assert_ne!(a.id, b.id);
    assert!(a.id.starts_with("update_b1_"));
    assert!(!is_temporary_id(&a.id));
    assert_eq!(a.target_id(), Some("b1"));
  }

  #[test]
  fn test_remote_ids_are_not_temporary() {
    assert!(!is_temporary_id("8f14e45f-ceea-467f-a0e6-1d2b3c4d5e6f"));
    assert!(!is_temporary_id("42"));
  }

  #[test]
  fn test_serialized_shape() {
    let mutation = PendingMutation::delete(Table::Transactions, "t9");
    let json = serde_json::to_value(&mutation).unwrap();
    assert_eq!(json["kind"], "delete");
    assert_eq!(json["table"], "transactions");
    assert_eq!(json["id"], mutation.id.as_str());
    assert_eq!(json["target_id"], "t9");
    assert!(json.get("enqueued_at").is_some());

    let back: PendingMutation = serde_json::from_value(json).unwrap();
    assert_eq!(back, mutation);
  }
}

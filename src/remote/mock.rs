//! Scripted in-memory remote store for tests.

use color_eyre::{eyre::eyre, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::client::RemoteStore;
use super::types::{Patch, Record, Table};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
  Insert(Record),
  Update(String, Patch),
  Delete(Table, String),
  Select(Table),
}

#[derive(Default)]
pub struct MockRemote {
  pub calls: Mutex<Vec<Call>>,
  pub rows: Mutex<Vec<Record>>,
  reject_all: AtomicBool,
  reject_ids: Mutex<HashSet<String>>,
  next_id: AtomicU64,
  delay: Option<Duration>,
}

impl MockRemote {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_delay(delay: Duration) -> Self {
    Self {
      delay: Some(delay),
      ..Self::default()
    }
  }

  pub fn reject_all(&self, reject: bool) {
    self.reject_all.store(reject, Ordering::SeqCst);
  }

  /// Reject updates and deletes targeting `id`.
  pub fn reject_id(&self, id: &str) {
    self.reject_ids.lock().unwrap().insert(id.to_string());
  }

  pub fn accept_id(&self, id: &str) {
    self.reject_ids.lock().unwrap().remove(id);
  }

  /// Add an existing row without recording a call.
  pub fn seed(&self, record: Record) {
    self.rows.lock().unwrap().push(record);
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  async fn record_call(&self, call: Call, target_id: Option<&str>) -> Result<()> {
    self.calls.lock().unwrap().push(call);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.reject_all.load(Ordering::SeqCst) {
      return Err(eyre!("remote unavailable"));
    }
    if let Some(id) = target_id {
      if self.reject_ids.lock().unwrap().contains(id) {
        return Err(eyre!("rejected {}", id));
      }
    }
    Ok(())
  }
}

impl RemoteStore for MockRemote {
  async fn insert(&self, record: &Record) -> Result<Record> {
    self.record_call(Call::Insert(record.clone()), None).await?;
    let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
    let stored = record.clone().with_id(format!("remote-{}", id));
    self.rows.lock().unwrap().push(stored.clone());
    Ok(stored)
  }

  async fn update(&self, id: &str, patch: &Patch) -> Result<Record> {
    self
      .record_call(Call::Update(id.to_string(), patch.clone()), Some(id))
      .await?;
    self
      .rows
      .lock()
      .unwrap()
      .iter()
      .find(|r| r.id() == Some(id))
      .cloned()
      .ok_or_else(|| eyre!("no row {}", id))
  }

  async fn delete(&self, table: Table, id: &str) -> Result<()> {
    self
      .record_call(Call::Delete(table, id.to_string()), Some(id))
      .await?;
    self.rows.lock().unwrap().retain(|r| r.id() != Some(id));
    Ok(())
  }

  async fn select(&self, table: Table) -> Result<Vec<Record>> {
    self.record_call(Call::Select(table), None).await?;
    Ok(
      self
        .rows
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.table() == table)
        .cloned()
        .collect(),
    )
  }
}

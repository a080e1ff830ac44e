//! Durable FIFO queue of pending mutations.
//!
//! The whole queue is stored as one JSON array and always read and written as
//! a snapshot.

use color_eyre::{eyre::eyre, Result};
use tracing::warn;

use super::mutation::PendingMutation;
use crate::db::{KvStore, QUEUE_KEY};

pub struct MutationQueue<K: KvStore> {
  store: K,
}

impl<K: KvStore> MutationQueue<K> {
  pub fn new(store: K) -> Self {
    Self { store }
  }

  /// Read the full queue in enqueue order.
  ///
  /// Unreadable or corrupt storage yields an empty queue; a corrupt entry is
  /// removed so it doesn't fail again on every read.
  pub fn load(&self) -> Vec<PendingMutation> {
    let raw = match self.store.get(QUEUE_KEY) {
      Ok(Some(raw)) => raw,
      Ok(None) => return Vec::new(),
      Err(e) => {
        warn!("Failed to read offline queue, treating as empty: {}", e);
        return Vec::new();
      }
    };

    match serde_json::from_str(&raw) {
      Ok(mutations) => mutations,
      Err(e) => {
        warn!("Discarding corrupt offline queue: {}", e);
        if let Err(e) = self.store.remove(QUEUE_KEY) {
          warn!("Failed to reset offline queue: {}", e);
        }
        Vec::new()
      }
    }
  }

  /// Replace the stored queue. An empty queue removes the key entirely.
  pub fn save(&self, mutations: &[PendingMutation]) -> Result<()> {
    if mutations.is_empty() {
      return self.store.remove(QUEUE_KEY);
    }

    let raw = serde_json::to_string(mutations)
      .map_err(|e| eyre!("Failed to serialize offline queue: {}", e))?;
    self.store.set(QUEUE_KEY, &raw)
  }

  /// Append a mutation and persist immediately. Returns the new queue length.
  pub fn push(&self, mutation: PendingMutation) -> Result<usize> {
    let mut mutations = self.load();
    mutations.push(mutation);
    self.save(&mutations)?;
    Ok(mutations.len())
  }

  pub fn len(&self) -> usize {
    self.load().len()
  }
}

//! Persisted map of cached datasets.

use chrono::{Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::traits::{CachedEntry, Snapshot};
use crate::db::{KvStore, CACHE_KEY};

type EntryMap = BTreeMap<String, CachedEntry>;

/// Key → snapshot cache stored under a single local-storage key.
///
/// Capped at `max_entries`; writes beyond the cap evict the entries with the
/// oldest write time. Reads never modify the map.
pub struct CacheStore<K: KvStore> {
  store: K,
  max_entries: usize,
}

impl<K: KvStore> CacheStore<K> {
  pub fn new(store: K, max_entries: usize) -> Self {
    Self {
      store,
      max_entries: max_entries.max(1),
    }
  }

  fn load(&self) -> EntryMap {
    let raw = match self.store.get(CACHE_KEY) {
      Ok(Some(raw)) => raw,
      Ok(None) => return EntryMap::new(),
      Err(e) => {
        warn!("Failed to read offline cache, treating as empty: {}", e);
        return EntryMap::new();
      }
    };

    match serde_json::from_str(&raw) {
      Ok(entries) => entries,
      Err(e) => {
        warn!("Discarding corrupt offline cache: {}", e);
        if let Err(e) = self.store.remove(CACHE_KEY) {
          warn!("Failed to reset offline cache: {}", e);
        }
        EntryMap::new()
      }
    }
  }

  fn save(&self, entries: &EntryMap) -> Result<()> {
    let raw = serde_json::to_string(entries)
      .map_err(|e| eyre!("Failed to serialize offline cache: {}", e))?;
    self.store.set(CACHE_KEY, &raw)
  }

  /// Create or overwrite the entry for `key`, persisted immediately.
  pub fn cache_data(&self, key: &str, data: Snapshot) -> Result<()> {
    let mut entries = self.load();
    entries.insert(
      key.to_string(),
      CachedEntry {
        key: key.to_string(),
        data,
        timestamp: Utc::now(),
      },
    );

    while entries.len() > self.max_entries {
      let oldest = entries
        .values()
        .filter(|entry| entry.key != key)
        .min_by_key(|entry| entry.timestamp)
        .map(|entry| entry.key.clone());
      match oldest {
        Some(oldest) => {
          debug!(key = %oldest, "Evicting cached dataset");
          entries.remove(&oldest);
        }
        None => break,
      }
    }

    self.save(&entries)
  }

  /// The cached entry for `key`, unless it is missing or older than `max_age`.
  pub fn get_from_cache(&self, key: &str, max_age: Option<Duration>) -> Option<CachedEntry> {
    let entry = self.load().remove(key)?;

    if let Some(max_age) = max_age {
      if Utc::now() - entry.timestamp > max_age {
        return None;
      }
    }

    Some(entry)
  }

  pub fn keys(&self) -> Vec<String> {
    self.load().into_keys().collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::MemoryKv;
  use crate::remote::types::Budget;
  use std::sync::Arc;

  fn budgets(amount: f64) -> Snapshot {
    Snapshot::Budgets(vec![Budget {
      id: Some("b1".to_string()),
      category: None,
      amount,
    }])
  }

  #[test]
  fn test_get_without_max_age_returns_value() {
    let cache = CacheStore::new(MemoryKv::new(), 8);
    cache.cache_data("budgets", budgets(100.0)).unwrap();

    std::thread::sleep(std::time::Duration::from_millis(5));
    let entry = cache.get_from_cache("budgets", None).unwrap();
    assert_eq!(entry.data, budgets(100.0));
  }

  #[test]
  fn test_zero_max_age_is_never_usable() {
    let cache = CacheStore::new(MemoryKv::new(), 8);
    cache.cache_data("budgets", budgets(100.0)).unwrap();

    std::thread::sleep(std::time::Duration::from_millis(5));
    assert!(cache
      .get_from_cache("budgets", Some(Duration::zero()))
      .is_none());
    assert!(cache
      .get_from_cache("budgets", Some(Duration::minutes(5)))
      .is_some());
  }

  #[test]
  fn test_overwrite_replaces_entry() {
    let cache = CacheStore::new(MemoryKv::new(), 8);
    cache.cache_data("budgets", budgets(100.0)).unwrap();
    cache.cache_data("budgets", budgets(250.0)).unwrap();

    assert_eq!(cache.keys(), vec!["budgets".to_string()]);
    let entry = cache.get_from_cache("budgets", None).unwrap();
    assert_eq!(entry.data, budgets(250.0));
  }

  #[test]
  fn test_missing_key() {
    let cache = CacheStore::new(MemoryKv::new(), 8);
    assert!(cache.get_from_cache("nope", None).is_none());
  }

  #[test]
  fn test_evicts_oldest_write_over_capacity() {
    let cache = CacheStore::new(MemoryKv::new(), 2);
    cache.cache_data("a", budgets(1.0)).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(2));
    cache.cache_data("b", budgets(2.0)).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(2));
    cache.cache_data("c", budgets(3.0)).unwrap();

    assert_eq!(cache.keys(), vec!["b".to_string(), "c".to_string()]);
  }

  #[test]
  fn test_eviction_never_drops_the_new_write() {
    // An older entry stamped in the future, as after the clock steps back
    let kv = Arc::new(MemoryKv::new());
    let mut entries = EntryMap::new();
    entries.insert(
      "a".to_string(),
      CachedEntry {
        key: "a".to_string(),
        data: budgets(1.0),
        timestamp: Utc::now() + Duration::days(1),
      },
    );
    kv.set(CACHE_KEY, &serde_json::to_string(&entries).unwrap())
      .unwrap();

    let cache = CacheStore::new(kv, 1);
    cache.cache_data("b", budgets(2.0)).unwrap();

    assert_eq!(cache.keys(), vec!["b".to_string()]);
    assert_eq!(
      cache.get_from_cache("b", None).unwrap().data,
      budgets(2.0)
    );
  }

  #[test]
  fn test_corrupt_cache_resets() {
    let kv = Arc::new(MemoryKv::new());
    kv.set(CACHE_KEY, "[1, 2").unwrap();
    let cache = CacheStore::new(kv.clone(), 8);

    assert!(cache.get_from_cache("a", None).is_none());
    assert_eq!(kv.get(CACHE_KEY).unwrap(), None);

    cache.cache_data("a", budgets(1.0)).unwrap();
    assert!(cache.get_from_cache("a", None).is_some());
  }
}

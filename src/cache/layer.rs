//! Cache layer that orchestrates caching logic with network fetching.

use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use super::storage::CacheStore;
use super::traits::{CacheResult, CacheSource, Cacheable, Snapshot};
use crate::db::KvStore;
use crate::sync::ConnectivityTracker;

/// Cache layer that keeps the last good copy of each dataset for offline display.
///
/// Network first: while online every read goes to the remote store and
/// refreshes the cache; the cache is only served when offline or when the
/// fetch fails.
pub struct CacheLayer<K: KvStore> {
  storage: Arc<CacheStore<K>>,
  connectivity: ConnectivityTracker,
  /// Cached data older than this is not served
  max_age: Option<Duration>,
}

impl<K: KvStore> CacheLayer<K> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: CacheStore<K>, connectivity: ConnectivityTracker) -> Self {
    Self {
      storage: Arc::new(storage),
      connectivity,
      max_age: None,
    }
  }

  /// Refuse to serve cached data older than `max_age`.
  #[allow(dead_code)]
  pub fn with_max_age(mut self, max_age: Duration) -> Self {
    self.max_age = Some(max_age);
    self
  }

  pub fn storage(&self) -> &CacheStore<K> {
    &self.storage
  }

  fn cached<T: Cacheable>(&self, key: &str, source: CacheSource) -> Option<CacheResult<Vec<T>>> {
    let entry = self.storage.get_from_cache(key, self.max_age)?;
    let timestamp = entry.timestamp;
    let rows = T::from_snapshot(entry.data)?;
    Some(CacheResult::from_cache(rows, timestamp, source))
  }

  /// Fetch a list with network-first strategy.
  ///
  /// 1. Offline - return the cached copy, error if there is none
  /// 2. Online - fetch and refresh the cache
  /// 3. On network failure, fall back to the cached copy
  ///
  /// The `key` parameter is used as the cache lookup key (e.g., "transactions").
  pub async fn fetch_list<T, F, Fut>(&self, key: &str, fetcher: F) -> Result<CacheResult<Vec<T>>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    if !self.connectivity.is_online() {
      return self
        .cached(key, CacheSource::Offline)
        .ok_or_else(|| eyre!("No cached data for {} while offline", key));
    }

    match fetcher().await {
      Ok(data) => {
        self.store(key, T::into_snapshot(data.clone()));
        Ok(CacheResult::from_network(data))
      }
      Err(e) => match self.cached(key, CacheSource::CacheFallback) {
        Some(cached) => {
          warn!("Fetch of {} failed, serving cached copy: {}", key, e);
          Ok(cached)
        }
        None => Err(e),
      },
    }
  }

  fn store(&self, key: &str, snapshot: Snapshot) {
    // A failed cache write shouldn't fail a successful read
    if let Err(e) = self.storage.cache_data(key, snapshot) {
      warn!("Failed to cache {}: {}", key, e);
    }
  }
}

impl<K: KvStore> Clone for CacheLayer<K> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      connectivity: self.connectivity.clone(),
      max_age: self.max_age,
    }
  }
}

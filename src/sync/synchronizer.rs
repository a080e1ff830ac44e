//! Offline-aware write path and queue replay.

use color_eyre::Result;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::connectivity::ConnectivityTracker;
use super::mutation::PendingMutation;
use super::queue::MutationQueue;
use crate::db::KvStore;
use crate::notify::{Notifier, Severity};
use crate::remote::{Patch, Record, RemoteStore, Table};

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
  pub succeeded: usize,
  /// Replays that failed and stay queued for the next pass
  pub failed: usize,
  /// Replays that failed for the last allowed time and were discarded
  pub dropped: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
  /// Return the would-be value when the write is queued instead of applied
  pub optimistic: bool,
}

/// Result of an offline-aware write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<A, Q = A> {
  /// The remote store accepted the write
  Applied(A),
  /// The write was queued; `optimistic` is set when requested
  Queued {
    mutation_id: String,
    optimistic: Option<Q>,
  },
}

/// Clears the in-flight flag when a drain finishes, however it finishes.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::SeqCst);
  }
}

/// Routes writes to the remote store or the durable queue, and replays the
/// queue when asked.
///
/// States are `Idle` and `Draining`; `syncing` guards the transition so two
/// overlapping drains never replay the same mutation twice.
pub struct Synchronizer<R: RemoteStore, K: KvStore, N: Notifier> {
  remote: R,
  queue: MutationQueue<K>,
  notifier: N,
  connectivity: ConnectivityTracker,
  syncing: AtomicBool,
  pending: AtomicUsize,
  max_attempts: Option<u32>,
  /// Failed replays per mutation id, kept in memory only
  attempts: Mutex<HashMap<String, u32>>,
}

impl<R: RemoteStore, K: KvStore, N: Notifier> Synchronizer<R, K, N> {
  pub fn new(remote: R, store: K, notifier: N, connectivity: ConnectivityTracker) -> Self {
    let queue = MutationQueue::new(store);
    let pending = queue.len();

    Self {
      remote,
      queue,
      notifier,
      connectivity,
      syncing: AtomicBool::new(false),
      pending: AtomicUsize::new(pending),
      max_attempts: None,
      attempts: Mutex::new(HashMap::new()),
    }
  }

  /// Discard a queued mutation after `max_attempts` failed replays.
  pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
    self.max_attempts = max_attempts.filter(|max| *max > 0);
    self
  }

  pub fn remote(&self) -> &R {
    &self.remote
  }

  pub fn connectivity(&self) -> &ConnectivityTracker {
    &self.connectivity
  }

  pub fn notifier(&self) -> &N {
    &self.notifier
  }

  pub fn pending_count(&self) -> usize {
    self.pending.load(Ordering::SeqCst)
  }

  pub fn pending(&self) -> Vec<PendingMutation> {
    self.queue.load()
  }

  pub fn is_syncing(&self) -> bool {
    self.syncing.load(Ordering::SeqCst)
  }

  /// Append a mutation to the durable queue. Does not touch the remote store.
  pub fn enqueue(&self, mutation: PendingMutation) -> Result<usize> {
    debug!(id = %mutation.id, "Queueing {}", mutation);
    let len = self.queue.push(mutation)?;
    self.pending.store(len, Ordering::SeqCst);
    Ok(len)
  }

  /// Replay every queued mutation in enqueue order.
  ///
  /// No-op while offline or while another drain is in flight. Successful
  /// replays leave the queue; failures stay for the next pass.
  pub async fn drain(&self, notify: bool) -> SyncReport {
    if !self.connectivity.is_online() {
      debug!("Skipping drain while offline");
      return SyncReport::default();
    }

    if self
      .syncing
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .is_err()
    {
      debug!("Drain already in flight");
      return SyncReport::default();
    }
    let _guard = DrainGuard(&self.syncing);

    let snapshot = self.queue.load();
    if snapshot.is_empty() {
      self.pending.store(0, Ordering::SeqCst);
      return SyncReport::default();
    }

    info!("Replaying {} pending change(s)", snapshot.len());

    let mut report = SyncReport::default();
    let mut retained = Vec::new();

    for mutation in &snapshot {
      match mutation.replay(&self.remote).await {
        Ok(()) => {
          debug!(id = %mutation.id, "Replayed {}", mutation);
          self.forget_attempts(&mutation.id);
          report.succeeded += 1;
        }
        Err(e) => {
          let attempts = self.record_failure(&mutation.id);
          match self.max_attempts {
            Some(max) if attempts >= max => {
              warn!(id = %mutation.id, attempts, "Discarding {}: {}", mutation, e);
              self.forget_attempts(&mutation.id);
              report.dropped += 1;
            }
            _ => {
              warn!(id = %mutation.id, attempts, "Failed to replay {}: {}", mutation, e);
              retained.push(mutation.clone());
              report.failed += 1;
            }
          }
        }
      }
    }

    // Keep anything queued while the replay was awaiting the remote store
    let replayed: HashSet<&str> = snapshot.iter().map(|m| m.id.as_str()).collect();
    retained.extend(
      self
        .queue
        .load()
        .into_iter()
        .filter(|m| !replayed.contains(m.id.as_str())),
    );

    match self.queue.save(&retained) {
      Ok(()) => self.pending.store(retained.len(), Ordering::SeqCst),
      Err(e) => {
        // Storage still holds the previous queue
        error!("Failed to persist offline queue: {}", e);
        self.pending.store(self.queue.len(), Ordering::SeqCst);
      }
    }

    info!(
      succeeded = report.succeeded,
      failed = report.failed,
      dropped = report.dropped,
      "Drain finished"
    );

    if notify {
      self.notify_report(&report);
    }

    report
  }

  /// Insert now if online, otherwise queue it under a temporary id.
  pub async fn offline_insert(
    &self,
    record: Record,
    options: WriteOptions,
  ) -> Result<WriteOutcome<Record>> {
    if self.connectivity.is_online() {
      let stored = self.remote.insert(&record).await?;
      return Ok(WriteOutcome::Applied(stored));
    }

    let mutation = PendingMutation::insert(record.clone());
    let mutation_id = mutation.id.clone();
    self.enqueue(mutation)?;

    let optimistic = options
      .optimistic
      .then(|| record.with_id(mutation_id.clone()));
    Ok(WriteOutcome::Queued {
      mutation_id,
      optimistic,
    })
  }

  /// Update now if online, otherwise queue the patch against `id`.
  pub async fn offline_update(
    &self,
    id: &str,
    patch: Patch,
    options: WriteOptions,
  ) -> Result<WriteOutcome<Record, Patch>> {
    if self.connectivity.is_online() {
      let stored = self.remote.update(id, &patch).await?;
      return Ok(WriteOutcome::Applied(stored));
    }

    let mutation = PendingMutation::update(id, patch.clone());
    let mutation_id = mutation.id.clone();
    self.enqueue(mutation)?;

    Ok(WriteOutcome::Queued {
      mutation_id,
      optimistic: options.optimistic.then_some(patch),
    })
  }

  /// Delete now if online, otherwise queue the delete.
  pub async fn offline_delete(
    &self,
    table: Table,
    id: &str,
    options: WriteOptions,
  ) -> Result<WriteOutcome<()>> {
    if self.connectivity.is_online() {
      self.remote.delete(table, id).await?;
      return Ok(WriteOutcome::Applied(()));
    }

    let mutation = PendingMutation::delete(table, id);
    let mutation_id = mutation.id.clone();
    self.enqueue(mutation)?;

    Ok(WriteOutcome::Queued {
      mutation_id,
      optimistic: options.optimistic.then_some(()),
    })
  }

  fn record_failure(&self, id: &str) -> u32 {
    match self.attempts.lock() {
      Ok(mut attempts) => {
        let count = attempts.entry(id.to_string()).or_insert(0);
        *count += 1;
        *count
      }
      Err(_) => 1,
    }
  }

  fn forget_attempts(&self, id: &str) {
    if let Ok(mut attempts) = self.attempts.lock() {
      attempts.remove(id);
    }
  }

  fn notify_report(&self, report: &SyncReport) {
    if report.succeeded > 0 {
      self.notifier.notify(
        Severity::Success,
        &format!("Synced {} change(s)", report.succeeded),
      );
    }
    if report.failed > 0 {
      self.notifier.notify(
        Severity::Warning,
        &format!(
          "{} change(s) failed to sync and will be retried",
          report.failed
        ),
      );
    }
    if report.dropped > 0 {
      self.notifier.notify(
        Severity::Error,
        &format!(
          "{} change(s) could not be synced and were discarded",
          report.dropped
        ),
      );
    }
  }
}

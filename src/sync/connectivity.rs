//! Online/offline signal.
//!
//! The tracker only records what the platform reports; it never probes the
//! remote store. A drain started after an "online" report may still fail.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  CameOnline,
  WentOffline,
}

#[derive(Clone)]
pub struct ConnectivityTracker {
  tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityTracker {
  pub fn new(online: bool) -> Self {
    let (tx, _rx) = watch::channel(online);
    Self { tx: Arc::new(tx) }
  }

  pub fn is_online(&self) -> bool {
    *self.tx.borrow()
  }

  /// Record a connectivity report. Returns the transition if the state changed.
  pub fn set_online(&self, online: bool) -> Option<Transition> {
    let changed = self.tx.send_if_modified(|current| {
      if *current == online {
        false
      } else {
        *current = online;
        true
      }
    });

    match (changed, online) {
      (false, _) => None,
      (true, true) => Some(Transition::CameOnline),
      (true, false) => Some(Transition::WentOffline),
    }
  }

  /// Watch for changes, e.g. to render an online indicator.
  #[allow(dead_code)]
  pub fn subscribe(&self) -> watch::Receiver<bool> {
    self.tx.subscribe()
  }
}

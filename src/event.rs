use crate::commands::{self, Action};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Daemon events
#[derive(Debug, PartialEq, Eq)]
pub enum Event {
  /// Periodic tick driving automatic drains
  Tick,
  /// Control command from stdin
  Command(Action),
  /// Input that matched no command
  Unknown(String),
}

/// Event handler that produces events from stdin and a tick timer
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Spawn tick timer
    let tick_tx = tx.clone();
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(tick_rate);
      interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      loop {
        interval.tick().await;
        if tick_tx.send(Event::Tick).is_err() {
          break;
        }
      }
    });

    // Spawn stdin reader. EOF just stops reading; the daemon keeps ticking.
    tokio::spawn(async move {
      let mut lines = BufReader::new(tokio::io::stdin()).lines();
      while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
          continue;
        }
        let event = match commands::parse(&line) {
          Some(action) => Event::Command(action),
          None => Event::Unknown(line),
        };
        if tx.send(event).is_err() {
          break;
        }
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

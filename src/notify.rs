//! User-facing notification port.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
  Info,
  Success,
  Warning,
  Error,
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      Self::Info => "info",
      Self::Success => "ok",
      Self::Warning => "warn",
      Self::Error => "error",
    };
    f.write_str(label)
  }
}

/// Fire-and-forget message to the user.
pub trait Notifier: Send + Sync {
  fn notify(&self, severity: Severity, message: &str);
}

/// Prints notifications to stderr and mirrors them into the log.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
  fn notify(&self, severity: Severity, message: &str) {
    tracing::info!(%severity, "{}", message);
    eprintln!("[{}] {}", severity, message);
  }
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
  fn notify(&self, severity: Severity, message: &str) {
    (**self).notify(severity, message)
  }
}

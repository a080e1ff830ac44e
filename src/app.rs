use crate::budget::{BudgetAlert, BudgetAlertEvaluator};
use crate::cache::{CacheLayer, CacheResult, CacheSource, CacheStore, Cacheable};
use crate::commands::{self, Action};
use crate::config::Config;
use crate::db::{KvStore, SqliteKv};
use crate::event::{Event, EventHandler};
use crate::notify::{ConsoleNotifier, Notifier, Severity};
use crate::recurring;
use crate::reminders::{self, DueBill};
use crate::remote::types::{
  BillReminder, Budget, RecurringTransaction, RecurringTransactionPatch, Transaction,
};
use crate::remote::{Patch, RemoteStore, RestClient, Row};
use crate::sync::{ConnectivityTracker, SyncReport, Synchronizer, Transition, WriteOptions};
use chrono::NaiveDate;
use color_eyre::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Main application state
pub struct App<R: RemoteStore, K: KvStore + Clone, N: Notifier> {
  /// Application configuration
  config: Config,

  /// Write path and offline queue
  sync: Synchronizer<R, K, N>,

  /// Last-known-good datasets for offline reads
  cache: CacheLayer<K>,

  /// Budget thresholds already surfaced this session
  budget_alerts: BudgetAlertEvaluator,

  /// Whether to quit
  should_quit: bool,
}

impl App<RestClient, Arc<SqliteKv>, ConsoleNotifier> {
  /// Open the local database and remote client described by `config`.
  pub fn open(config: Config, online: bool) -> Result<Self> {
    let kv = Arc::new(SqliteKv::open(&config.database_path()?)?);
    let remote = RestClient::new(&config)?;
    Ok(Self::new(config, remote, kv, ConsoleNotifier, online))
  }
}

impl<R: RemoteStore, K: KvStore + Clone, N: Notifier> App<R, K, N> {
  pub fn new(config: Config, remote: R, kv: K, notifier: N, online: bool) -> Self {
    let connectivity = ConnectivityTracker::new(online);
    let sync = Synchronizer::new(remote, kv.clone(), notifier, connectivity.clone())
      .with_max_attempts(config.sync.max_attempts);
    let cache = CacheLayer::new(CacheStore::new(kv, config.cache.max_entries), connectivity);
    let budget_alerts = BudgetAlertEvaluator::new(config.budget.threshold_percent);

    Self {
      config,
      sync,
      cache,
      budget_alerts,
      should_quit: false,
    }
  }

  pub fn sync(&self) -> &Synchronizer<R, K, N> {
    &self.sync
  }

  fn notify(&self, severity: Severity, message: &str) {
    self.sync.notifier().notify(severity, message);
  }

  /// Run the sync daemon until `quit` is read from stdin.
  pub async fn run(&mut self) -> Result<()> {
    let interval = self.config.sync.interval();
    info!(?interval, "Starting sync daemon");
    println!("finsync daemon running. Commands:\n{}", commands::help());

    // Create event handler; its first tick fires immediately
    let mut events = EventHandler::new(interval);

    self.refresh_alerts().await;

    // Main loop
    while !self.should_quit {
      match events.next().await {
        Some(event) => self.handle_event(event).await,
        None => break,
      }
    }

    info!("Sync daemon stopped");
    Ok(())
  }

  pub async fn handle_event(&mut self, event: Event) {
    match event {
      Event::Tick => {
        let report = self.sync.drain(false).await;
        self.after_drain(&report).await;
      }
      Event::Command(action) => self.handle_action(action).await,
      Event::Unknown(input) => {
        println!("Unknown command: {}\n{}", input.trim(), commands::help());
      }
    }
  }

  async fn handle_action(&mut self, action: Action) {
    match action {
      Action::Online => self.set_online(true).await,
      Action::Offline => self.set_online(false).await,
      Action::Sync => {
        let report = self.sync.drain(true).await;
        self.after_drain(&report).await;
      }
      Action::Status => println!("{}", self.status()),
      Action::Quit => self.should_quit = true,
    }
  }

  /// React to a platform connectivity report.
  pub async fn set_online(&mut self, online: bool) {
    match self.sync.connectivity().set_online(online) {
      Some(Transition::CameOnline) => {
        info!("Connectivity restored");
        self.notify(Severity::Info, "Back online, syncing pending changes");
        let report = self.sync.drain(true).await;
        self.after_drain(&report).await;
      }
      Some(Transition::WentOffline) => {
        info!("Connectivity lost");
        self.notify(
          Severity::Warning,
          "You are offline. Changes will sync when you reconnect",
        );
      }
      None => {}
    }
  }

  async fn after_drain(&mut self, report: &SyncReport) {
    if report.succeeded > 0 {
      self.refresh_alerts().await;
    }
  }

  async fn refresh_alerts(&mut self) {
    if let Err(e) = self.check_budgets(chrono::Local::now().date_naive()).await {
      warn!("Budget check skipped: {}", e);
    }
  }

  pub fn status(&self) -> String {
    let state = match (self.sync.connectivity().is_online(), self.sync.is_syncing()) {
      (true, true) => "online (syncing)",
      (true, false) => "online",
      (false, _) => "offline",
    };
    let mut out = format!("{}, {} pending change(s)", state, self.sync.pending_count());
    for mutation in self.sync.pending() {
      out.push_str(&format!(
        "\n  {}  queued {}",
        mutation,
        mutation.enqueued_at.format("%Y-%m-%d %H:%M:%S")
      ));
    }
    for key in self.cache.storage().keys() {
      if let Some(entry) = self.cache.storage().get_from_cache(&key, None) {
        out.push_str(&format!(
          "\n  cached {} ({} row(s), {})",
          key,
          entry.data.len(),
          entry.timestamp.format("%Y-%m-%d %H:%M:%S")
        ));
      }
    }
    out
  }

  /// Read a whole table, falling back to the cached copy when offline.
  pub async fn list<T: Cacheable>(&self) -> Result<CacheResult<Vec<T>>> {
    let table = T::table();
    let remote = self.sync.remote();
    self
      .cache
      .fetch_list(table.as_str(), || async move {
        let records = remote.select(table).await?;
        let rows: Vec<T> = records.into_iter().filter_map(T::from_record).collect();
        Ok::<_, color_eyre::Report>(rows)
      })
      .await
  }

  /// Evaluate budgets for the month containing `today`, notifying new crossings.
  pub async fn check_budgets(&mut self, today: NaiveDate) -> Result<Vec<BudgetAlert>> {
    let transactions = self.list::<Transaction>().await?.data;
    let budgets = self.list::<Budget>().await?.data;
    Ok(self.budget_alerts.evaluate(
      &transactions,
      &budgets,
      today,
      self.sync.notifier(),
    ))
  }

  /// Write out due recurring transactions and move each item to its next date.
  ///
  /// The advanced schedule is written back to the cache so a later offline
  /// run doesn't generate the same occurrences again.
  ///
  /// Returns the number of transactions created (or queued).
  pub async fn run_recurring(&self, today: NaiveDate) -> Result<usize> {
    let items = self.list::<RecurringTransaction>().await?;
    if items.source != CacheSource::Network {
      warn!("Generating recurring transactions from cached schedule");
    }

    let mut schedule = items.data;
    let mut advanced = HashMap::new();
    let mut created = 0;
    for due in recurring::materialize_due(&schedule, today) {
      for transaction in due.transactions {
        self
          .sync
          .offline_insert(transaction.into_record(), WriteOptions::default())
          .await?;
        created += 1;
      }

      if let Some(id) = due.recurring_id {
        let patch = Patch::RecurringTransactions(RecurringTransactionPatch {
          next_date: Some(due.next_date),
          ..Default::default()
        });
        self
          .sync
          .offline_update(&id, patch, WriteOptions::default())
          .await?;
        advanced.insert(id, due.next_date);
      }
    }

    if !advanced.is_empty() {
      for item in &mut schedule {
        if let Some(next_date) = item.id.as_ref().and_then(|id| advanced.get(id)) {
          item.next_date = *next_date;
        }
      }
      let key = RecurringTransaction::table();
      if let Err(e) = self
        .cache
        .storage()
        .cache_data(key.as_str(), RecurringTransaction::into_snapshot(schedule))
      {
        warn!("Failed to cache advanced recurring schedule: {}", e);
      }
    }

    Ok(created)
  }

  /// Notify about unpaid bills inside their reminder window.
  pub async fn check_reminders(&self, today: NaiveDate) -> Result<Vec<DueBill>> {
    let reminders = self.list::<BillReminder>().await?.data;
    let due = reminders::due_soon(&reminders, today);
    reminders::notify_due(&due, self.sync.notifier());
    Ok(due)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::MemoryKv;
  use crate::notify::testing::RecordingNotifier;
  use crate::remote::mock::{Call, MockRemote};
  use crate::remote::types::{Frequency, TransactionKind};
  use crate::remote::Record;

  type TestApp = App<Arc<MockRemote>, Arc<MemoryKv>, Arc<RecordingNotifier>>;

  fn config() -> Config {
    serde_yaml::from_str("remote:\n  url: https://example.test\n").unwrap()
  }

  fn app(online: bool) -> (TestApp, Arc<MockRemote>, Arc<RecordingNotifier>) {
    let remote = Arc::new(MockRemote::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let app = App::new(
      config(),
      remote.clone(),
      Arc::new(MemoryKv::new()),
      notifier.clone(),
      online,
    );
    (app, remote, notifier)
  }

  fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn expense(amount: f64, date: NaiveDate) -> Transaction {
    Transaction {
      id: None,
      kind: TransactionKind::Expense,
      amount,
      category: "food".to_string(),
      description: None,
      date,
    }
  }

  #[tokio::test]
  async fn test_going_offline_only_notifies() {
    let (mut app, remote, notifier) = app(true);
    app.set_online(false).await;

    assert_eq!(remote.call_count(), 0);
    let messages = notifier.take();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, Severity::Warning);
  }

  #[tokio::test]
  async fn test_reconnect_drains_queue() {
    let (mut app, remote, notifier) = app(false);
    app
      .sync()
      .offline_insert(
        expense(10.0, ymd(2026, 10, 2)).into_record(),
        WriteOptions::default(),
      )
      .await
      .unwrap();

    app.set_online(true).await;

    assert_eq!(app.sync().pending_count(), 0);
    assert!(matches!(remote.calls.lock().unwrap()[0], Call::Insert(_)));
    let messages = notifier.take();
    assert_eq!(
      messages[0],
      (
        Severity::Info,
        "Back online, syncing pending changes".to_string()
      )
    );
    assert!(messages
      .iter()
      .any(|(s, m)| *s == Severity::Success && m == "Synced 1 change(s)"));
  }

  #[tokio::test]
  async fn test_repeated_online_report_is_ignored() {
    let (mut app, remote, notifier) = app(true);
    app.set_online(true).await;
    assert_eq!(remote.call_count(), 0);
    assert!(notifier.take().is_empty());
  }

  #[tokio::test]
  async fn test_quit_command_stops_loop() {
    let (mut app, _, _) = app(true);
    app.handle_event(Event::Command(Action::Quit)).await;
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn test_list_uses_cache_when_offline() {
    let (mut app, remote, _) = app(true);
    remote
      .rows
      .lock()
      .unwrap()
      .push(expense(5.0, ymd(2026, 10, 1)).into_record().with_id("t1"));

    let online = app.list::<Transaction>().await.unwrap();
    assert_eq!(online.source, CacheSource::Network);

    app.set_online(false).await;
    let offline = app.list::<Transaction>().await.unwrap();
    assert_eq!(offline.source, CacheSource::Offline);
    assert_eq!(offline.data, online.data);
  }

  #[tokio::test]
  async fn test_check_budgets_alerts_once() {
    let (mut app, remote, notifier) = app(true);
    {
      let mut rows = remote.rows.lock().unwrap();
      rows.push(expense(850.0, ymd(2026, 10, 3)).into_record().with_id("t1"));
      rows.push(Record::Budgets(Budget {
        id: Some("b1".to_string()),
        category: None,
        amount: 1000.0,
      }));
    }

    let today = ymd(2026, 10, 19);
    assert_eq!(app.check_budgets(today).await.unwrap().len(), 1);
    assert!(app.check_budgets(today).await.unwrap().is_empty());
    assert_eq!(notifier.take().len(), 1);
  }

  #[tokio::test]
  async fn test_run_recurring_offline_queues_writes() {
    let (mut app, remote, _) = app(true);
    remote.rows.lock().unwrap().push(Record::RecurringTransactions(RecurringTransaction {
      id: Some("r1".to_string()),
      kind: TransactionKind::Expense,
      amount: 9.99,
      category: "subscriptions".to_string(),
      description: None,
      frequency: Frequency::Monthly,
      next_date: ymd(2026, 9, 15),
      active: true,
    }));

    // Prime the cache, then lose connectivity
    app.list::<RecurringTransaction>().await.unwrap();
    app.set_online(false).await;

    let created = app.run_recurring(ymd(2026, 10, 19)).await.unwrap();
    assert_eq!(created, 2);
    // Two inserts plus the next-date update
    assert_eq!(app.sync().pending_count(), 3);
  }

  #[tokio::test]
  async fn test_run_recurring_twice_offline_queues_once() {
    let (mut app, remote, _) = app(true);
    remote.seed(Record::RecurringTransactions(RecurringTransaction {
      id: Some("r1".to_string()),
      kind: TransactionKind::Expense,
      amount: 12.0,
      category: "gym".to_string(),
      description: None,
      frequency: Frequency::Monthly,
      next_date: ymd(2026, 9, 30),
      active: true,
    }));
    app.list::<RecurringTransaction>().await.unwrap();
    app.set_online(false).await;

    let today = ymd(2026, 10, 19);
    assert_eq!(app.run_recurring(today).await.unwrap(), 1);
    assert_eq!(app.run_recurring(today).await.unwrap(), 0);
    assert_eq!(app.sync().pending_count(), 2);

    let cached = app.list::<RecurringTransaction>().await.unwrap();
    assert_eq!(cached.data[0].next_date, ymd(2026, 10, 30));

    app.set_online(true).await;
    let inserts = remote
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|c| matches!(c, Call::Insert(_)))
      .count();
    assert_eq!(inserts, 1);
  }

  #[tokio::test]
  async fn test_status_lists_pending() {
    let (app, _, _) = app(false);
    app
      .sync()
      .offline_delete(crate::remote::Table::Budgets, "b7", WriteOptions::default())
      .await
      .unwrap();

    let status = app.status();
    assert!(status.starts_with("offline, 1 pending change(s)"));
    assert!(status.contains("delete budgets b7"));
  }
}

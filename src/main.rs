mod app;
mod budget;
mod cache;
mod commands;
mod config;
mod db;
mod event;
mod notify;
mod recurring;
mod reminders;
mod remote;
mod sync;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::cache::{CacheResult, CacheSource};
use crate::remote::types::{
  BillReminder, BillReminderPatch, Budget, RecurringTransaction, Transaction, TransactionKind,
  TransactionPatch,
};
use crate::remote::{Patch, Row, Table};
use crate::sync::{WriteOptions, WriteOutcome};

#[derive(Parser, Debug)]
#[command(name = "finsync")]
#[command(about = "Offline-first sync client for a personal finance backend")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/finsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Treat the network as unavailable; writes are queued locally
  #[arg(long)]
  offline: bool,

  #[command(subcommand)]
  command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
  /// Record an income or expense
  Add {
    #[arg(long, default_value = "expense")]
    kind: TransactionKind,
    #[arg(long)]
    amount: f64,
    #[arg(long)]
    category: String,
    #[arg(long)]
    description: Option<String>,
    /// Defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,
  },
  /// Set a monthly budget (overall, or for one category)
  AddBudget {
    #[arg(long)]
    amount: f64,
    #[arg(long)]
    category: Option<String>,
  },
  /// Change fields of an existing transaction
  Update {
    id: String,
    #[arg(long)]
    amount: Option<f64>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    date: Option<NaiveDate>,
  },
  /// Mark a bill reminder as paid
  PayBill { id: String },
  /// Delete a row from a table
  Delete { table: Table, id: String },
  /// List a table (served from cache when offline)
  List { table: Table },
  /// Replay pending changes now
  Sync,
  /// Show pending changes and cached datasets
  Status,
  /// Check budgets for the current month
  BudgetCheck,
  /// Create due recurring transactions
  Recurring,
  /// Show bills due soon
  Reminders,
  /// Run the sync daemon (periodic drain, stdin connectivity commands)
  Run,
}

fn init_logging() -> Result<WorkerGuard> {
  let log_dir = config::Config::data_dir()?.join("logs");
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory: {}", e))?;

  let (writer, guard) =
    tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, "finsync.log"));
  let filter =
    EnvFilter::try_from_env("FINSYNC_LOG").unwrap_or_else(|_| EnvFilter::new("finsync=info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

fn print_outcome<A: std::fmt::Debug, Q: std::fmt::Debug>(outcome: &WriteOutcome<A, Q>) {
  match outcome {
    WriteOutcome::Applied(value) => println!("Saved: {:?}", value),
    WriteOutcome::Queued {
      mutation_id,
      optimistic,
    } => {
      println!("Offline: queued as {}", mutation_id);
      if let Some(value) = optimistic {
        println!("  {:?}", value);
      }
    }
  }
}

fn print_rows<T: std::fmt::Debug>(result: &CacheResult<Vec<T>>) {
  if result.source != CacheSource::Network {
    match result.cached_at {
      Some(at) => println!(
        "(showing cached data from {}: {:?})",
        at.format("%Y-%m-%d %H:%M:%S"),
        result.source
      ),
      None => println!("(showing cached data: {:?})", result.source),
    }
  }
  for row in &result.data {
    println!("{:?}", row);
  }
  println!("{} row(s)", result.data.len());
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_logging()?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let mut app = app::App::open(config, !args.offline)?;
  let today = chrono::Local::now().date_naive();
  let options = WriteOptions { optimistic: true };

  match args.command {
    Cmd::Add {
      kind,
      amount,
      category,
      description,
      date,
    } => {
      let record = Transaction {
        id: None,
        kind,
        amount,
        category,
        description,
        date: date.unwrap_or(today),
      }
      .into_record();
      let outcome = app.sync().offline_insert(record, options).await?;
      print_outcome(&outcome);
      if let Err(e) = app.check_budgets(today).await {
        tracing::warn!("Budget check skipped: {}", e);
      }
    }
    Cmd::AddBudget { amount, category } => {
      let record = Budget {
        id: None,
        category,
        amount,
      }
      .into_record();
      let outcome = app.sync().offline_insert(record, options).await?;
      print_outcome(&outcome);
    }
    Cmd::Update {
      id,
      amount,
      category,
      description,
      date,
    } => {
      let patch = Patch::Transactions(TransactionPatch {
        kind: None,
        amount,
        category,
        description,
        date,
      });
      let outcome = app.sync().offline_update(&id, patch, options).await?;
      print_outcome(&outcome);
    }
    Cmd::PayBill { id } => {
      let patch = Patch::BillReminders(BillReminderPatch {
        paid: Some(true),
        ..Default::default()
      });
      let outcome = app.sync().offline_update(&id, patch, options).await?;
      print_outcome(&outcome);
    }
    Cmd::Delete { table, id } => {
      let outcome = app.sync().offline_delete(table, &id, options).await?;
      print_outcome(&outcome);
    }
    Cmd::List { table } => match table {
      Table::Transactions => {
        let result = app.list::<Transaction>().await?;
        print_rows(&result);
      }
      Table::Budgets => {
        let result = app.list::<Budget>().await?;
        print_rows(&result);
      }
      Table::RecurringTransactions => {
        let result = app.list::<RecurringTransaction>().await?;
        print_rows(&result);
      }
      Table::BillReminders => {
        let result = app.list::<BillReminder>().await?;
        print_rows(&result);
      }
    },
    Cmd::Sync => {
      let report = app.sync().drain(true).await;
      println!(
        "{} synced, {} retained, {} discarded, {} still pending",
        report.succeeded,
        report.failed,
        report.dropped,
        app.sync().pending_count()
      );
    }
    Cmd::Status => println!("{}", app.status()),
    Cmd::BudgetCheck => {
      let alerts = app.check_budgets(today).await?;
      if alerts.is_empty() {
        println!("All budgets below threshold");
      }
    }
    Cmd::Recurring => {
      let created = app.run_recurring(today).await?;
      println!("{} recurring transaction(s) created", created);
    }
    Cmd::Reminders => {
      let due = app.check_reminders(today).await?;
      if due.is_empty() {
        println!("No bills due soon");
      }
    }
    Cmd::Run => app.run().await?,
  }

  Ok(())
}

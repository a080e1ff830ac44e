//! Bill reminders that are due soon or overdue.

use chrono::NaiveDate;

use crate::notify::{Notifier, Severity};
use crate::remote::types::BillReminder;

#[derive(Debug, Clone, PartialEq)]
pub struct DueBill {
  pub name: String,
  pub amount: f64,
  pub due_date: NaiveDate,
  /// Negative when overdue
  pub days_left: i64,
}

impl DueBill {
  pub fn is_overdue(&self) -> bool {
    self.days_left < 0
  }

  pub fn message(&self) -> String {
    match self.days_left {
      d if d < 0 => format!("{} ({:.2}) is {} day(s) overdue", self.name, self.amount, -d),
      0 => format!("{} ({:.2}) is due today", self.name, self.amount),
      d => format!(
        "{} ({:.2}) is due in {} day(s), on {}",
        self.name, self.amount, d, self.due_date
      ),
    }
  }
}

/// Unpaid reminders inside their reminder window, soonest first.
pub fn due_soon(reminders: &[BillReminder], today: NaiveDate) -> Vec<DueBill> {
  let mut due: Vec<DueBill> = reminders
    .iter()
    .filter(|r| !r.paid)
    .filter_map(|r| {
      let days_left = (r.due_date - today).num_days();
      (days_left <= i64::from(r.remind_days_before)).then(|| DueBill {
        name: r.name.clone(),
        amount: r.amount,
        due_date: r.due_date,
        days_left,
      })
    })
    .collect();

  due.sort_by_key(|bill| bill.days_left);
  due
}

pub fn notify_due<N: Notifier + ?Sized>(bills: &[DueBill], notifier: &N) {
  for bill in bills {
    let severity = if bill.is_overdue() {
      Severity::Error
    } else {
      Severity::Info
    };
    notifier.notify(severity, &bill.message());
  }
}

//! Turning recurring transactions into concrete ones.

use chrono::{Days, Months, NaiveDate};

use crate::remote::types::{Frequency, RecurringTransaction, Transaction};

/// Upper bound on occurrences generated for one item in a single pass.
const MAX_CATCH_UP: usize = 366;

/// Transactions owed by one recurring item and the date it moves on to.
#[derive(Debug, Clone, PartialEq)]
pub struct DueRecurring {
  pub recurring_id: Option<String>,
  pub transactions: Vec<Transaction>,
  pub next_date: NaiveDate,
}

/// The `n`th occurrence counted from `anchor` (the 0th is `anchor` itself).
///
/// Months are added to the anchor rather than to the previous occurrence, so
/// an item due on the 31st clamps in short months and returns to the 31st.
pub fn occurrence(anchor: NaiveDate, frequency: Frequency, n: u32) -> Option<NaiveDate> {
  match frequency {
    Frequency::Daily => anchor.checked_add_days(Days::new(u64::from(n))),
    Frequency::Weekly => anchor.checked_add_days(Days::new(7 * u64::from(n))),
    Frequency::Monthly => anchor.checked_add_months(Months::new(n)),
    Frequency::Yearly => anchor.checked_add_months(Months::new(n.checked_mul(12)?)),
  }
}

/// Every occurrence on or before `today` for each active item, including
/// occurrences missed while the app wasn't running.
pub fn materialize_due(items: &[RecurringTransaction], today: NaiveDate) -> Vec<DueRecurring> {
  items
    .iter()
    .filter(|item| item.active && item.next_date <= today)
    .filter_map(|item| {
      let mut transactions = Vec::new();
      let mut n = 0;

      let next_date = loop {
        let date = occurrence(item.next_date, item.frequency, n)?;
        if date > today || transactions.len() >= MAX_CATCH_UP {
          break date;
        }
        transactions.push(Transaction {
          id: None,
          kind: item.kind,
          amount: item.amount,
          category: item.category.clone(),
          description: item.description.clone(),
          date,
        });
        n += 1;
      };

      Some(DueRecurring {
        recurring_id: item.id.clone(),
        transactions,
        next_date,
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::types::TransactionKind;

  fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn item(frequency: Frequency, next_date: NaiveDate, active: bool) -> RecurringTransaction {
    RecurringTransaction {
      id: Some("r1".to_string()),
      kind: TransactionKind::Expense,
      amount: 15.0,
      category: "subscriptions".to_string(),
      description: Some("Streaming".to_string()),
      frequency,
      next_date,
      active,
    }
  }

  #[test]
  fn test_not_due_yet() {
    let items = vec![item(Frequency::Monthly, ymd(2026, 11, 1), true)];
    assert!(materialize_due(&items, ymd(2026, 10, 19)).is_empty());
  }

  #[test]
  fn test_inactive_is_skipped() {
    let items = vec![item(Frequency::Monthly, ymd(2026, 10, 1), false)];
    assert!(materialize_due(&items, ymd(2026, 10, 19)).is_empty());
  }

  #[test]
  fn test_catches_up_missed_weeks() {
    let items = vec![item(Frequency::Weekly, ymd(2026, 10, 1), true)];
    let due = materialize_due(&items, ymd(2026, 10, 19));

    assert_eq!(due.len(), 1);
    let dates: Vec<NaiveDate> = due[0].transactions.iter().map(|t| t.date).collect();
    assert_eq!(
      dates,
      vec![ymd(2026, 10, 1), ymd(2026, 10, 8), ymd(2026, 10, 15)]
    );
    assert_eq!(due[0].next_date, ymd(2026, 10, 22));
    assert_eq!(due[0].recurring_id.as_deref(), Some("r1"));
  }

  #[test]
  fn test_month_end_clamps_without_drifting() {
    assert_eq!(
      occurrence(ymd(2026, 1, 31), Frequency::Monthly, 1),
      Some(ymd(2026, 2, 28))
    );
    assert_eq!(
      occurrence(ymd(2024, 2, 29), Frequency::Yearly, 1),
      Some(ymd(2025, 2, 28))
    );
    assert_eq!(
      occurrence(ymd(2024, 2, 29), Frequency::Yearly, 4),
      Some(ymd(2028, 2, 29))
    );
  }

  #[test]
  fn test_month_end_anchor_keeps_its_day() {
    let items = vec![item(Frequency::Monthly, ymd(2026, 1, 31), true)];
    let due = materialize_due(&items, ymd(2026, 4, 30));

    let dates: Vec<NaiveDate> = due[0].transactions.iter().map(|t| t.date).collect();
    assert_eq!(
      dates,
      vec![
        ymd(2026, 1, 31),
        ymd(2026, 2, 28),
        ymd(2026, 3, 31),
        ymd(2026, 4, 30)
      ]
    );
    assert_eq!(due[0].next_date, ymd(2026, 5, 31));
  }
}

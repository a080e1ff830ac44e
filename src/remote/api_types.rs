//! Serde types matching the REST endpoint's wire format.
//!
//! Rows come back as bare JSON objects; they are decoded into domain types
//! by the table they were requested from.

use serde::Deserialize;
use serde_json::Value;

use super::types::{Record, Table};

/// Error body returned by the REST endpoint on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiError {
  #[serde(default)]
  pub message: String,
  #[serde(default)]
  pub code: Option<String>,
  #[serde(default)]
  pub details: Option<String>,
  #[serde(default)]
  pub hint: Option<String>,
}

impl ApiError {
  /// Render the error for logs, falling back to the raw body when it isn't JSON.
  pub fn describe(body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
      Ok(err) => {
        let mut out = err.message;
        if let Some(code) = err.code {
          out = format!("{} ({})", out, code);
        }
        if let Some(details) = err.details {
          out = format!("{}: {}", out, details);
        }
        if let Some(hint) = err.hint {
          out = format!("{} [hint: {}]", out, hint);
        }
        out
      }
      Err(_) => body.trim().to_string(),
    }
  }
}

/// Decode a `return=representation` response: an array of rows.
pub fn rows_into_records(table: Table, rows: Vec<Value>) -> serde_json::Result<Vec<Record>> {
  rows
    .into_iter()
    .map(|row| Record::from_row_json(table, row))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_describe_structured_error() {
    let body = r#"{"message":"violates foreign key","code":"23503","details":null,"hint":null}"#;
    assert_eq!(ApiError::describe(body), "violates foreign key (23503)");
  }

  #[test]
  fn test_describe_plain_body() {
    assert_eq!(ApiError::describe(" bad gateway \n"), "bad gateway");
  }

  #[test]
  fn test_rows_into_records() {
    let rows = vec![serde_json::json!({
      "id": "r1",
      "name": "Rent",
      "amount": 900.0,
      "due_date": "2026-11-01"
    })];
    let records = rows_into_records(Table::BillReminders, rows).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), Some("r1"));
  }
}

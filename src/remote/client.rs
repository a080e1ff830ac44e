use crate::config::Config;
use crate::remote::api_types::{rows_into_records, ApiError};
use crate::remote::types::{Patch, Record, Table};
use color_eyre::{eyre::eyre, Result};
use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use url::Url;

/// Operations the synchronizer and cache layer need from the remote store.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
  /// Insert a row, returning it with the id assigned by the remote store.
  async fn insert(&self, record: &Record) -> Result<Record>;

  /// Apply a partial update to the row with `id`.
  async fn update(&self, id: &str, patch: &Patch) -> Result<Record>;

  async fn delete(&self, table: Table, id: &str) -> Result<()>;

  /// Fetch every row of `table` visible to the current user.
  async fn select(&self, table: Table) -> Result<Vec<Record>>;
}

impl<T: RemoteStore> RemoteStore for std::sync::Arc<T> {
  async fn insert(&self, record: &Record) -> Result<Record> {
    (**self).insert(record).await
  }

  async fn update(&self, id: &str, patch: &Patch) -> Result<Record> {
    (**self).update(id, patch).await
  }

  async fn delete(&self, table: Table, id: &str) -> Result<()> {
    (**self).delete(table, id).await
  }

  async fn select(&self, table: Table) -> Result<Vec<Record>> {
    (**self).select(table).await
  }
}

/// Client for a PostgREST-style HTTPS endpoint
#[derive(Clone)]
pub struct RestClient {
  http: reqwest::Client,
  base: String,
  api_key: String,
  access_token: String,
}

impl RestClient {
  pub fn new(config: &Config) -> Result<Self> {
    let api_key = Config::get_api_key()?;
    let access_token = Config::get_access_token().unwrap_or_else(|| api_key.clone());

    let http = reqwest::Client::builder()
      .user_agent(concat!("finsync/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let base = format!(
      "{}/{}",
      config.remote.url.trim_end_matches('/'),
      config.remote.schema_path.trim_matches('/')
    );
    // Validate at startup
    Url::parse(&base).map_err(|e| eyre!("Invalid remote url {}: {}", base, e))?;

    Ok(Self {
      http,
      base,
      api_key,
      access_token,
    })
  }

  fn table_url(&self, table: Table, id: Option<&str>) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/{}", self.base, table))
      .map_err(|e| eyre!("Invalid table url for {}: {}", table, e))?;
    match id {
      Some(id) => {
        url.query_pairs_mut().append_pair("id", &format!("eq.{}", id));
      }
      None => {
        url.query_pairs_mut().append_pair("select", "*");
      }
    }
    Ok(url)
  }

  fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
    request
      .header("apikey", &self.api_key)
      .bearer_auth(&self.access_token)
  }

  async fn send(&self, request: RequestBuilder, action: &str) -> Result<Response> {
    let response = self
      .authorized(request)
      .send()
      .await
      .map_err(|e| eyre!("Failed to {}: {}", action, e))?;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(eyre!(
      "Failed to {}: {} {}",
      action,
      status,
      ApiError::describe(&body)
    ))
  }

  async fn single_row(&self, table: Table, response: Response, action: &str) -> Result<Record> {
    let rows: Vec<Value> = response
      .json()
      .await
      .map_err(|e| eyre!("Failed to read {} response: {}", action, e))?;

    rows_into_records(table, rows)
      .map_err(|e| eyre!("Failed to parse {} response: {}", action, e))?
      .into_iter()
      .next()
      .ok_or_else(|| eyre!("Failed to {}: no row returned", action))
  }
}

impl RemoteStore for RestClient {
  async fn insert(&self, record: &Record) -> Result<Record> {
    let table = record.table();
    let action = format!("insert into {}", table);
    let body = record
      .to_row_json()
      .map_err(|e| eyre!("Failed to serialize row: {}", e))?;

    let request = self
      .http
      .post(self.table_url(table, None)?)
      .header("Prefer", "return=representation")
      .json(&body);

    let response = self.send(request, &action).await?;
    self.single_row(table, response, &action).await
  }

  async fn update(&self, id: &str, patch: &Patch) -> Result<Record> {
    let table = patch.table();
    let action = format!("update {} {}", table, id);
    let body = patch
      .to_row_json()
      .map_err(|e| eyre!("Failed to serialize patch: {}", e))?;

    let request = self
      .http
      .patch(self.table_url(table, Some(id))?)
      .header("Prefer", "return=representation")
      .json(&body);

    let response = self.send(request, &action).await?;
    self.single_row(table, response, &action).await
  }

  async fn delete(&self, table: Table, id: &str) -> Result<()> {
    let action = format!("delete {} {}", table, id);
    let request = self.http.delete(self.table_url(table, Some(id))?);
    self.send(request, &action).await?;
    Ok(())
  }

  async fn select(&self, table: Table) -> Result<Vec<Record>> {
    let action = format!("list {}", table);
    let request = self.http.get(self.table_url(table, None)?);
    let response = self.send(request, &action).await?;

    let rows: Vec<Value> = response
      .json()
      .await
      .map_err(|e| eyre!("Failed to read {} response: {}", action, e))?;

    rows_into_records(table, rows).map_err(|e| eyre!("Failed to parse {} response: {}", action, e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client() -> RestClient {
    RestClient {
      http: reqwest::Client::new(),
      base: "https://example.test/rest/v1".to_string(),
      api_key: "key".to_string(),
      access_token: "key".to_string(),
    }
  }

  #[test]
  fn test_table_url_with_id_filter() {
    let url = client().table_url(Table::Budgets, Some("42")).unwrap();
    assert_eq!(url.as_str(), "https://example.test/rest/v1/budgets?id=eq.42");
  }

  #[test]
  fn test_table_url_select_all() {
    let url = client().table_url(Table::BillReminders, None).unwrap();
    assert_eq!(
      url.as_str(),
      "https://example.test/rest/v1/bill_reminders?select=*"
    );
  }
}

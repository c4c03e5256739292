//! REST table client for mirroring results to a hosted database

use reqwest::Client;
use serde::Serialize;

/// One table behind a PostgREST-style endpoint, authenticated with an API key
#[derive(Clone)]
pub struct RemoteTable {
    client: Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl RemoteTable {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
        }
    }

    fn rest_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    /// Insert a row, merging with an existing one on `on_conflict`
    pub async fn upsert<T: Serialize>(&self, data: &T, on_conflict: &str) -> Result<(), RemoteError> {
        let url = format!("{}?on_conflict={}", self.rest_url(), on_conflict);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(data)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_table_url_without_double_slash() {
        let table = RemoteTable::new("https://db.example.com/", "key", "leaderboard");
        assert_eq!(table.rest_url(), "https://db.example.com/rest/v1/leaderboard");
    }
}

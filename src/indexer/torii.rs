//! GraphQL-over-HTTP chamber lookups against a Torii indexer.

use super::{chamber_query, decode_chamber_response, ChamberSource, IndexerError};
use crate::config::IndexerConfig;
use crate::game::types::Chamber;
use log::debug;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;

pub struct ToriiIndexer {
    config: IndexerConfig,
    client: reqwest::Client,
}

impl ToriiIndexer {
    pub fn new(config: IndexerConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn post_query(&self, query: String) -> Result<Value, IndexerError> {
        let request = self
            .client
            .post(&self.config.url)
            .json(&json!({ "query": query }));
        let timeout_duration = Duration::from_secs(self.config.timeout_seconds);

        let response = timeout(timeout_duration, request.send())
            .await
            .map_err(|_| {
                IndexerError::Transport(format!(
                    "request timeout after {}s",
                    self.config.timeout_seconds
                ))
            })?
            .map_err(|e| IndexerError::Transport(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(IndexerError::Transport(format!(
                "indexer returned status: {}",
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| IndexerError::Malformed(format!("failed to parse JSON response: {e}")))
    }
}

impl ChamberSource for ToriiIndexer {
    async fn fetch_chamber(&self, chamber_id: u32) -> Result<Chamber, IndexerError> {
        let query = chamber_query(&self.config.model_query, chamber_id);
        debug!("Fetching chamber {} from {}", chamber_id, self.config.url);
        let body = self.post_query(query).await?;
        decode_chamber_response(&body, &self.config.model_query, chamber_id)
    }
}

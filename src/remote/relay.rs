//! HTTP relay executor: posts `{account, entrypoint, calldata}` to a signing relay and reads
//! back `{transaction_hash, code}`. Signing and account sessions live behind the relay.

use super::{ContractCall, RemoteExecutor, RemoteError, TxResponse};
use crate::config::RemoteConfig;
use crate::logutil::escape_log;
use log::debug;
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;

pub struct RelayExecutor {
    url: String,
    timeout_seconds: u64,
    client: reqwest::Client,
}

impl RelayExecutor {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            url: config.relay_url.clone(),
            timeout_seconds: config.timeout_seconds,
            client: reqwest::Client::new(),
        }
    }
}

impl RemoteExecutor for RelayExecutor {
    async fn execute(&self, account: &str, call: &ContractCall) -> Result<TxResponse, RemoteError> {
        let body = json!({
            "account": account,
            "entrypoint": call.entrypoint.name(),
            "calldata": call.calldata,
        });
        debug!("Relaying {} for {}", call.entrypoint, escape_log(account));

        let request = self.client.post(&self.url).json(&body);
        let response = timeout(Duration::from_secs(self.timeout_seconds), request.send())
            .await
            .map_err(|_| RemoteError::Timeout(self.timeout_seconds))?
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RemoteError::Transport(format!(
                "relay returned status: {}",
                response.status()
            )));
        }

        response
            .json::<TxResponse>()
            .await
            .map_err(|e| RemoteError::Malformed(e.to_string()))
    }
}

//! # Remote Execution Boundary
//!
//! Every state-changing game action is a contract call submitted on behalf of an account.
//! The client treats the chain as an opaque asynchronous RPC: a call goes out, a response
//! comes back with a status `code` and, usually, a transaction hash. `"SUCCESS"` is the only
//! recognized success sentinel; anything else, or a transport failure, is a rejection.
//!
//! Implementations:
//!
//! - [`local::LocalChain`] - in-process simulator used by the CLI's offline mode and tests
//! - [`relay::RelayExecutor`] - HTTP JSON relay (requires the `net` feature)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use thiserror::Error;

pub mod local;
#[cfg(feature = "net")]
pub mod relay;

/// Status code that marks an accepted transaction.
pub const SUCCESS_CODE: &str = "SUCCESS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entrypoint {
    SpawnPlayer,
    CreateGameRun,
    CreateChamber,
    EnterChamber,
    MovePlayer,
    EmitPulse,
    CompleteChamber,
}

impl Entrypoint {
    pub fn name(self) -> &'static str {
        match self {
            Entrypoint::SpawnPlayer => "spawn_player",
            Entrypoint::CreateGameRun => "create_game_run",
            Entrypoint::CreateChamber => "create_chamber",
            Entrypoint::EnterChamber => "enter_chamber",
            Entrypoint::MovePlayer => "move_player",
            Entrypoint::EmitPulse => "emit_pulse",
            Entrypoint::CompleteChamber => "complete_chamber",
        }
    }
}

impl fmt::Display for Entrypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single contract invocation: entrypoint plus positional arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub entrypoint: Entrypoint,
    pub calldata: Vec<i64>,
}

impl ContractCall {
    pub fn spawn_player() -> Self {
        Self::bare(Entrypoint::SpawnPlayer)
    }

    pub fn create_game_run() -> Self {
        Self::bare(Entrypoint::CreateGameRun)
    }

    pub fn create_chamber(chamber_id: u32, seed: u64, width: u32, height: u32) -> Self {
        ContractCall {
            entrypoint: Entrypoint::CreateChamber,
            calldata: vec![
                i64::from(chamber_id),
                seed as i64,
                i64::from(width),
                i64::from(height),
            ],
        }
    }

    pub fn enter_chamber(chamber_id: u32) -> Self {
        ContractCall {
            entrypoint: Entrypoint::EnterChamber,
            calldata: vec![i64::from(chamber_id)],
        }
    }

    pub fn move_player(dx: i32, dy: i32) -> Self {
        ContractCall {
            entrypoint: Entrypoint::MovePlayer,
            calldata: vec![i64::from(dx), i64::from(dy)],
        }
    }

    pub fn emit_pulse(radius: u32) -> Self {
        ContractCall {
            entrypoint: Entrypoint::EmitPulse,
            calldata: vec![i64::from(radius)],
        }
    }

    pub fn complete_chamber() -> Self {
        Self::bare(Entrypoint::CompleteChamber)
    }

    fn bare(entrypoint: Entrypoint) -> Self {
        ContractCall {
            entrypoint,
            calldata: Vec::new(),
        }
    }
}

/// What the chain reports for a submitted call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResponse {
    #[serde(default)]
    pub transaction_hash: Option<String>,
    pub code: String,
}

impl TxResponse {
    pub fn success(hash: impl Into<String>) -> Self {
        TxResponse {
            transaction_hash: Some(hash.into()),
            code: SUCCESS_CODE.to_string(),
        }
    }

    pub fn rejected(code: impl Into<String>) -> Self {
        TxResponse {
            transaction_hash: None,
            code: code.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

/// Failures that prevented a response from arriving at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Asynchronous contract execution on behalf of `account`.
pub trait RemoteExecutor: Send + Sync + 'static {
    fn execute(
        &self,
        account: &str,
        call: &ContractCall,
    ) -> impl Future<Output = Result<TxResponse, RemoteError>> + Send;
}

/// Submit `calls` in order, stopping at the first non-success response.
///
/// Multi-call actions (create then enter a chamber) report the response of the call that
/// stopped the sequence, or the last one when all succeeded.
pub async fn submit_sequence<R: RemoteExecutor>(
    remote: &R,
    account: &str,
    calls: &[ContractCall],
) -> Result<TxResponse, RemoteError> {
    let mut last = TxResponse::rejected("EMPTY");
    for call in calls {
        last = remote.execute(account, call).await?;
        if !last.is_success() {
            break;
        }
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calldata_encodes_signed_deltas() {
        let call = ContractCall::move_player(0, -1);
        assert_eq!(call.entrypoint, Entrypoint::MovePlayer);
        assert_eq!(call.calldata, vec![0, -1]);
    }

    #[test]
    fn only_success_sentinel_counts() {
        assert!(TxResponse::success("0xabc").is_success());
        assert!(!TxResponse::rejected("success").is_success());
        assert!(!TxResponse::rejected("REVERTED").is_success());
    }

    #[test]
    fn response_deserializes_without_hash() {
        let r: TxResponse = serde_json::from_str(r#"{"code":"REVERTED"}"#).unwrap();
        assert_eq!(r.transaction_hash, None);
        assert_eq!(r.code, "REVERTED");
    }

    #[test]
    fn entrypoint_names_match_contract() {
        let json = serde_json::to_string(&Entrypoint::EmitPulse).unwrap();
        assert_eq!(json, "\"emit_pulse\"");
        assert_eq!(Entrypoint::CreateGameRun.name(), "create_game_run");
    }
}

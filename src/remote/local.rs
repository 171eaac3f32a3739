//! In-process stand-in for the game contract and its indexer.
//!
//! `LocalChain` accepts the same entrypoints as the deployed world, keeps just enough state
//! to answer chamber lookups, and records every call it sees. Chambers are generated
//! deterministically from their seed unless a fixed layout was installed with
//! [`LocalChain::install_layout`]. Rejections can be scripted per entrypoint.

use super::{ContractCall, Entrypoint, RemoteError, RemoteExecutor, TxResponse};
use crate::game::types::{CellType, Chamber, MAX_CHAMBER_DIM};
use crate::indexer::{ChamberSource, IndexerError};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub account: String,
    pub call: ContractCall,
}

#[derive(Default)]
struct ChainState {
    players: HashSet<String>,
    chambers: HashMap<u32, Chamber>,
    layouts: HashMap<u32, Chamber>,
    rejections: HashMap<Entrypoint, VecDeque<String>>,
    failures: HashMap<Entrypoint, VecDeque<String>>,
    calls: Vec<RecordedCall>,
    tx_counter: u64,
}

#[derive(Default)]
pub struct LocalChain {
    state: Mutex<ChainState>,
    latency: Duration,
}

impl LocalChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().expect("local chain mutex poisoned")
    }

    /// Use `chamber` verbatim whenever its id is created.
    pub fn install_layout(&self, chamber: Chamber) {
        self.lock().layouts.insert(chamber.chamber_id, chamber);
    }

    /// Make an already-created chamber visible to the indexer.
    pub fn insert_chamber(&self, chamber: Chamber) {
        self.lock().chambers.insert(chamber.chamber_id, chamber);
    }

    /// The next call to `entrypoint` answers with `code` instead of success.
    pub fn reject_next(&self, entrypoint: Entrypoint, code: &str) {
        self.lock()
            .rejections
            .entry(entrypoint)
            .or_default()
            .push_back(code.to_string());
    }

    /// The next call to `entrypoint` fails in transport with `message`.
    pub fn fail_next(&self, entrypoint: Entrypoint, message: &str) {
        self.lock()
            .failures
            .entry(entrypoint)
            .or_default()
            .push_back(message.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, entrypoint: Entrypoint) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.call.entrypoint == entrypoint)
            .count()
    }

    pub fn has_player(&self, account: &str) -> bool {
        self.lock().players.contains(account)
    }

    fn apply(&self, account: &str, call: &ContractCall) -> Result<TxResponse, RemoteError> {
        let mut st = self.lock();
        st.calls.push(RecordedCall {
            account: account.to_string(),
            call: call.clone(),
        });
        if let Some(msg) = st
            .failures
            .get_mut(&call.entrypoint)
            .and_then(VecDeque::pop_front)
        {
            return Err(RemoteError::Transport(msg));
        }
        if let Some(code) = st
            .rejections
            .get_mut(&call.entrypoint)
            .and_then(VecDeque::pop_front)
        {
            return Ok(TxResponse::rejected(code));
        }

        let arg = |i: usize| call.calldata.get(i).copied().unwrap_or_default();
        match call.entrypoint {
            Entrypoint::SpawnPlayer => {
                st.players.insert(account.to_string());
            }
            Entrypoint::CreateChamber => {
                let id = u32::try_from(arg(0)).unwrap_or_default();
                let seed = u64::try_from(arg(1)).unwrap_or_default();
                let width = u32::try_from(arg(2)).unwrap_or_default();
                let height = u32::try_from(arg(3)).unwrap_or_default();
                let generated = match st.layouts.get(&id) {
                    Some(layout) => Some(layout.clone()),
                    None => generate_chamber(id, seed, width, height),
                };
                let Some(chamber) = generated.filter(|_| id != 0) else {
                    return Ok(TxResponse::rejected("INVALID_CHAMBER"));
                };
                st.chambers.insert(id, chamber);
            }
            Entrypoint::EnterChamber => {
                let id = u32::try_from(arg(0)).unwrap_or_default();
                if !st.chambers.contains_key(&id) {
                    return Ok(TxResponse::rejected("CHAMBER_NOT_FOUND"));
                }
            }
            Entrypoint::CreateGameRun
            | Entrypoint::MovePlayer
            | Entrypoint::EmitPulse
            | Entrypoint::CompleteChamber => {}
        }

        st.tx_counter += 1;
        let hash = format!("0x{:064x}", st.tx_counter);
        Ok(TxResponse::success(hash))
    }
}

impl RemoteExecutor for LocalChain {
    async fn execute(&self, account: &str, call: &ContractCall) -> Result<TxResponse, RemoteError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = self.apply(account, call);
        debug!("local chain {} -> {:?}", call.entrypoint, result);
        result
    }
}

impl ChamberSource for LocalChain {
    async fn fetch_chamber(&self, chamber_id: u32) -> Result<Chamber, IndexerError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let found = self.lock().chambers.get(&chamber_id).cloned();
        found.ok_or(IndexerError::NotFound(chamber_id))
    }
}

/// Deterministic chamber layout for `seed`: scattered walls and void pockets, with an
/// L-shaped corridor along the top row and right column so the exit is always reachable.
/// `None` when either dimension is zero or above [`MAX_CHAMBER_DIM`].
pub fn generate_chamber(chamber_id: u32, seed: u64, width: u32, height: u32) -> Option<Chamber> {
    if width == 0 || height == 0 || width > MAX_CHAMBER_DIM || height > MAX_CHAMBER_DIM {
        return None;
    }
    let cells = width.checked_mul(height)?;
    let mut rng = StdRng::seed_from_u64(seed ^ (u64::from(chamber_id) << 32));
    let mut map = Vec::with_capacity(cells as usize);
    for _ in 0..cells {
        let roll: u32 = rng.gen_range(0..100);
        let kind = match roll {
            0..=14 => CellType::Wall,
            15..=20 => CellType::Void,
            _ => CellType::Path,
        };
        map.push(kind.code());
    }
    for x in 0..width {
        map[x as usize] = CellType::Path.code();
    }
    for y in 0..height {
        map[(y * width + width - 1) as usize] = CellType::Path.code();
    }
    Some(Chamber {
        chamber_id,
        width,
        height,
        map,
        start_x: 0,
        start_y: 0,
        exit_x: width - 1,
        exit_y: height - 1,
        seed,
    })
}

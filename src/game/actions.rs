//! Action executors: one asynchronous remote interaction each, with a transaction-status
//! state machine and an optimistic store update on success.
//!
//! ```text
//!  none ──begin──▶ pending ──resolve──▶ success ──(delay)──▶ none
//!                               └─────▶ rejected ──(delay)──▶ none
//! ```
//!
//! An executor never performs I/O itself. [`ActionExecutor::begin`] checks preconditions and
//! hands back the calls to submit; the owner runs them and feeds the outcome to
//! [`ActionExecutor::resolve`].

use super::types::{Direction, Player};
use crate::metrics;
use crate::remote::{ContractCall, RemoteError, TxResponse};
use crate::storage::{GameStore, StoreCommand};
use log::{debug, warn};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Spawn,
    StartGame,
    InitChamber,
    Move,
    Pulse,
    CompleteChamber,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::Spawn,
        ActionKind::StartGame,
        ActionKind::InitChamber,
        ActionKind::Move,
        ActionKind::Pulse,
        ActionKind::CompleteChamber,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ActionKind::Spawn => "spawn",
            ActionKind::StartGame => "start_game",
            ActionKind::InitChamber => "init_chamber",
            ActionKind::Move => "move",
            ActionKind::Pulse => "pulse",
            ActionKind::CompleteChamber => "complete_chamber",
        }
    }

    /// Human name used in failure messages ("Move transaction failed ...").
    pub fn title(self) -> &'static str {
        match self {
            ActionKind::Spawn => "Spawn",
            ActionKind::StartGame => "Start game",
            ActionKind::InitChamber => "Chamber init",
            ActionKind::Move => "Move",
            ActionKind::Pulse => "Pulse",
            ActionKind::CompleteChamber => "Complete chamber",
        }
    }

    /// `(after success, after rejection)`; `None` means the status stays until reset.
    pub fn clear_delays(self) -> (Option<Duration>, Option<Duration>) {
        let s = Duration::from_secs;
        match self {
            ActionKind::Move | ActionKind::Pulse => (Some(s(2)), Some(s(3))),
            ActionKind::InitChamber | ActionKind::Spawn => (Some(s(3)), Some(s(5))),
            ActionKind::CompleteChamber | ActionKind::StartGame => (None, Some(s(5))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxPhase {
    #[default]
    None,
    Pending,
    Success,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxStatus {
    pub phase: TxPhase,
    pub hash: Option<String>,
    pub error: Option<String>,
}

/// A concrete request for one executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    Spawn,
    StartGame,
    InitChamber {
        chamber_id: u32,
        seed: u64,
        width: u32,
        height: u32,
    },
    Move(Direction),
    Pulse {
        radius: u32,
    },
    CompleteChamber {
        points: u64,
    },
}

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRequest::Spawn => ActionKind::Spawn,
            ActionRequest::StartGame => ActionKind::StartGame,
            ActionRequest::InitChamber { .. } => ActionKind::InitChamber,
            ActionRequest::Move(_) => ActionKind::Move,
            ActionRequest::Pulse { .. } => ActionKind::Pulse,
            ActionRequest::CompleteChamber { .. } => ActionKind::CompleteChamber,
        }
    }

    /// Contract calls for this request, submitted in order.
    pub fn calls(&self) -> Vec<ContractCall> {
        match *self {
            ActionRequest::Spawn => vec![ContractCall::spawn_player()],
            ActionRequest::StartGame => vec![ContractCall::create_game_run()],
            ActionRequest::InitChamber {
                chamber_id,
                seed,
                width,
                height,
            } => vec![
                ContractCall::create_chamber(chamber_id, seed, width, height),
                ContractCall::enter_chamber(chamber_id),
            ],
            ActionRequest::Move(dir) => {
                let (dx, dy) = dir.delta();
                vec![ContractCall::move_player(dx, dy)]
            }
            ActionRequest::Pulse { radius } => vec![ContractCall::emit_pulse(radius)],
            ActionRequest::CompleteChamber { .. } => vec![ContractCall::complete_chamber()],
        }
    }

    /// Store mutation applied when the remote side accepts the request.
    pub fn optimistic_update(&self, identity: &str) -> StoreCommand {
        match *self {
            ActionRequest::Spawn => StoreCommand::SetPlayer(Player::new(identity)),
            ActionRequest::StartGame => StoreCommand::StartRun {
                identity: identity.to_string(),
            },
            ActionRequest::InitChamber { chamber_id, .. } => StoreCommand::EnterChamber(chamber_id),
            ActionRequest::Move(dir) => {
                let (dx, dy) = dir.delta();
                StoreCommand::Translate { dx, dy }
            }
            ActionRequest::Pulse { .. } => StoreCommand::RecordPulse,
            ActionRequest::CompleteChamber { points } => StoreCommand::CompleteChamber { points },
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("Please connect your controller")]
    NotConnected,

    #[error("No player found. Spawn a player first.")]
    NoPlayer,

    #[error("Player already spawned")]
    PlayerExists,

    #[error("{0} already in progress")]
    Busy(&'static str),

    #[error("Cannot move into wall")]
    Blocked,

    #[error("Pulse is on cooldown! Wait a moment...")]
    Cooldown,

    #[error("Cannot move right now")]
    Dying,

    #[error("Chamber map not loaded")]
    MapNotLoaded,

    #[error("Reach the exit first")]
    NotAtExit,
}

/// Outcome of one resolved request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub request: ActionRequest,
    pub succeeded: bool,
    pub hash: Option<String>,
    pub error: Option<String>,
}

impl Resolution {
    pub fn kind(&self) -> ActionKind {
        self.request.kind()
    }
}

struct InFlight {
    request: ActionRequest,
    identity: String,
    ticket: u64,
}

pub struct ActionExecutor {
    kind: ActionKind,
    status: TxStatus,
    in_flight: Option<InFlight>,
    clear_at: Option<Instant>,
    next_ticket: u64,
}

impl ActionExecutor {
    pub fn new(kind: ActionKind) -> Self {
        ActionExecutor {
            kind,
            status: TxStatus::default(),
            in_flight: None,
            clear_at: None,
            next_ticket: 0,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn status(&self) -> &TxStatus {
        &self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status.phase == TxPhase::Pending
    }

    /// Check preconditions and move to pending. Returns the ticket the result must carry
    /// and the calls the owner must submit.
    pub fn begin(
        &mut self,
        request: ActionRequest,
        identity: Option<&str>,
        store: &GameStore,
    ) -> Result<(u64, Vec<ContractCall>), ActionError> {
        debug_assert_eq!(request.kind(), self.kind);
        let identity = self.check(identity, store)?;
        let calls = request.calls();
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.status = TxStatus {
            phase: TxPhase::Pending,
            hash: None,
            error: None,
        };
        self.clear_at = None;
        self.in_flight = Some(InFlight {
            request,
            identity: identity.to_string(),
            ticket,
        });
        metrics::record_submitted(self.kind.label());
        Ok((ticket, calls))
    }

    fn check<'a>(&self, identity: Option<&'a str>, store: &GameStore) -> Result<&'a str, ActionError> {
        let identity = identity.ok_or(ActionError::NotConnected)?;
        match (self.kind, store.player().is_some()) {
            (ActionKind::Spawn, true) => return Err(ActionError::PlayerExists),
            (ActionKind::Spawn, false) => {}
            (_, false) => return Err(ActionError::NoPlayer),
            (_, true) => {}
        }
        if self.is_pending() {
            return Err(ActionError::Busy(self.kind.title()));
        }
        Ok(identity)
    }

    /// Apply the remote outcome for `ticket`. `None` when that request is no longer in
    /// flight (a late result after [`ActionExecutor::reset`]).
    pub fn resolve(
        &mut self,
        ticket: u64,
        result: Result<TxResponse, RemoteError>,
        store: &mut GameStore,
        now: Instant,
    ) -> Option<Resolution> {
        if self.in_flight.as_ref().map(|f| f.ticket) != Some(ticket) {
            debug!("Dropping stale {} result #{}", self.kind.label(), ticket);
            return None;
        }
        let InFlight {
            request, identity, ..
        } = self.in_flight.take()?;
        let (on_success, on_reject) = self.kind.clear_delays();
        let resolution = match result {
            Ok(response) if response.is_success() => {
                store.apply(request.optimistic_update(&identity));
                metrics::record_succeeded(self.kind.label());
                self.status = TxStatus {
                    phase: TxPhase::Success,
                    hash: response.transaction_hash.clone(),
                    error: None,
                };
                self.clear_at = on_success.map(|d| now + d);
                Resolution {
                    request,
                    succeeded: true,
                    hash: response.transaction_hash,
                    error: None,
                }
            }
            other => {
                let message = match other {
                    Ok(response) => format!(
                        "{} transaction failed with code: {}",
                        self.kind.title(),
                        response.code
                    ),
                    Err(e) => e.to_string(),
                };
                warn!("{} rejected: {}", self.kind.label(), message);
                metrics::record_rejected(self.kind.label());
                self.status = TxStatus {
                    phase: TxPhase::Rejected,
                    hash: None,
                    error: Some(message.clone()),
                };
                self.clear_at = on_reject.map(|d| now + d);
                Resolution {
                    request,
                    succeeded: false,
                    hash: None,
                    error: Some(message),
                }
            }
        };
        Some(resolution)
    }

    /// Revert a settled status once its clear deadline has passed.
    pub fn tick(&mut self, now: Instant) {
        if let Some(at) = self.clear_at {
            if now >= at {
                self.status = TxStatus::default();
                self.clear_at = None;
            }
        }
    }

    /// Back to none immediately, dropping anything in flight.
    pub fn reset(&mut self) {
        self.status = TxStatus::default();
        self.clear_at = None;
        self.in_flight = None;
    }
}

//! # Game Session Controller
//!
//! [`GameSession`] owns the store, the chamber map, one [`ActionExecutor`] per action kind
//! and every session timer. It validates input against the map, dispatches remote calls as
//! spawned tasks and applies their results when the owner feeds them back through
//! [`GameSession::handle_event`].
//!
//! ## Driving a session
//!
//! ```rust,no_run
//! use echoes::game::session::{GameSession, SessionSettings};
//! use echoes::remote::local::LocalChain;
//! use echoes::storage::GameStore;
//! use std::sync::Arc;
//! use tokio::time::Instant;
//!
//! #[tokio::main]
//! async fn main() {
//!     let chain = Arc::new(LocalChain::new());
//!     let (mut session, mut events) = GameSession::new(
//!         chain.clone(),
//!         chain,
//!         GameStore::in_memory(),
//!         SessionSettings::default(),
//!     );
//!     session.connect("0x0123");
//!     session.spawn_player(Instant::now()).ok();
//!     while session.in_flight() > 0 {
//!         if let Some(ev) = events.recv().await {
//!             session.handle_event(ev, Instant::now());
//!         }
//!     }
//! }
//! ```
//!
//! ## Timers
//!
//! Timers are deadlines checked by [`GameSession::tick`]. They are not cancelled when a later
//! action makes them moot: a collapse scheduled before a death still fires after the respawn.
//!
//! | timer          | armed by                        | fires                          |
//! |----------------|---------------------------------|--------------------------------|
//! | death          | arrival on a void cell          | respawn at entrance, deaths +1 |
//! | pulse cooldown | pulse submission                | pulse allowed again            |
//! | collapse       | accepted pulse reveal           | reveal shrinks to anchors      |
//! | status         | any settled status line         | status line cleared            |

use super::actions::{
    ActionError, ActionExecutor, ActionKind, ActionRequest, Resolution, TxStatus,
};
use super::arrival::ArrivalTracker;
use super::input::{parse_token, Command};
use super::map::ChamberMap;
use super::types::{CellType, Chamber, Direction, Position};
use crate::config::Config;
use crate::indexer::{ChamberSource, IndexerError};
use crate::logutil::{escape_log, short_hash};
use crate::metrics;
use crate::remote::{submit_sequence, ContractCall, RemoteError, RemoteExecutor, TxResponse};
use crate::storage::{GameStore, StoreCommand};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;

/// Delay before retrying a chamber fetch that failed in transport.
const FETCH_RETRY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub chamber_width: u32,
    pub chamber_height: u32,
    pub max_seed: u64,
    pub death_delay: Duration,
    pub success_status: Duration,
    pub pulse_remote_radius: u32,
    pub pulse_reveal_radius: u32,
    pub pulse_cooldown: Duration,
    pub pulse_collapse: Duration,
    pub points_per_chamber: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings::from_config(&Config::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        SessionSettings {
            chamber_width: config.chamber.width,
            chamber_height: config.chamber.height,
            max_seed: config.chamber.max_seed,
            death_delay: config.timing.death_delay(),
            success_status: config.timing.success_status(),
            pulse_remote_radius: config.pulse.remote_radius,
            pulse_reveal_radius: config.pulse.reveal_radius,
            pulse_cooldown: config.pulse.cooldown(),
            pulse_collapse: config.pulse.collapse(),
            points_per_chamber: config.run.points_per_chamber,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Player exists but the chamber map is still being created or fetched.
    Initializing,
    /// No connected identity or no player yet.
    Idle,
    Active,
    PendingDeath,
    PendingCompletion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub kind: StatusKind,
    pub message: String,
}

/// Results delivered back to the session by spawned remote tasks.
#[derive(Debug)]
pub enum SessionEvent {
    Resolved {
        kind: ActionKind,
        ticket: u64,
        result: Result<TxResponse, RemoteError>,
    },
    ChamberFetched {
        chamber_id: u32,
        ticket: u64,
        result: Result<Chamber, IndexerError>,
    },
}

pub struct GameSession<R, I> {
    remote: Arc<R>,
    indexer: Arc<I>,
    events: UnboundedSender<SessionEvent>,
    settings: SessionSettings,
    identity: Option<String>,
    store: GameStore,
    executors: HashMap<ActionKind, ActionExecutor>,
    map: Option<ChamberMap>,
    in_flight: usize,
    started: bool,
    fetching: Option<u32>,
    fetch_ticket: u64,
    fetch_retry_at: Option<Instant>,
    place_at_start: bool,
    status: Option<StatusLine>,
    status_clear_at: Option<Instant>,
    notification: Option<String>,
    death_at: Option<Instant>,
    pulse_ready_at: Option<Instant>,
    collapse_at: Option<Instant>,
    arrivals: ArrivalTracker,
    completion_pending: bool,
    chambers_cleared: u32,
    rng: StdRng,
}

fn executor(
    executors: &mut HashMap<ActionKind, ActionExecutor>,
    kind: ActionKind,
) -> &mut ActionExecutor {
    executors
        .entry(kind)
        .or_insert_with(|| ActionExecutor::new(kind))
}

impl<R: RemoteExecutor, I: ChamberSource> GameSession<R, I> {
    /// Create a session and the receiver its remote results arrive on.
    pub fn new(
        remote: Arc<R>,
        indexer: Arc<I>,
        store: GameStore,
        settings: SessionSettings,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = unbounded_channel();
        let executors = ActionKind::ALL
            .iter()
            .map(|k| (*k, ActionExecutor::new(*k)))
            .collect();
        let session = GameSession {
            remote,
            indexer,
            events: tx,
            settings,
            identity: None,
            store,
            executors,
            map: None,
            in_flight: 0,
            started: false,
            fetching: None,
            fetch_ticket: 0,
            fetch_retry_at: None,
            place_at_start: false,
            status: None,
            status_clear_at: None,
            notification: None,
            death_at: None,
            pulse_ready_at: None,
            collapse_at: None,
            arrivals: ArrivalTracker::new(),
            completion_pending: false,
            chambers_cleared: 0,
            rng: StdRng::from_entropy(),
        };
        (session, rx)
    }

    /// Use a fixed seed for chamber seeds.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn connect(&mut self, identity: &str) {
        info!("Controller connected: {}", short_hash(identity));
        self.identity = Some(identity.to_string());
    }

    pub fn disconnect(&mut self) {
        self.identity = None;
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn store(&self) -> &GameStore {
        &self.store
    }

    /// Consume the marker left by an accepted game start.
    pub fn take_pending_transition(&mut self) -> bool {
        self.store.take_pending_transition()
    }

    pub fn map(&self) -> Option<&ChamberMap> {
        self.map.as_ref()
    }

    pub fn status(&self) -> Option<&StatusLine> {
        self.status.as_ref()
    }

    pub fn notification(&self) -> Option<&str> {
        self.notification.as_deref()
    }

    /// Remote tasks whose result has not been handled yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Completions submitted this session.
    pub fn chambers_cleared(&self) -> u32 {
        self.chambers_cleared
    }

    pub fn tx_status(&self, kind: ActionKind) -> TxStatus {
        self.executors
            .get(&kind)
            .map(|e| e.status().clone())
            .unwrap_or_default()
    }

    pub fn any_pending(&self) -> bool {
        self.executors.values().any(ActionExecutor::is_pending)
    }

    pub fn pulse_ready(&self, now: Instant) -> bool {
        self.pulse_ready_at.map_or(true, |at| now >= at)
    }

    pub fn phase(&self) -> Phase {
        if self.identity.is_none() || self.store.player().is_none() {
            return Phase::Idle;
        }
        if self.death_at.is_some() {
            Phase::PendingDeath
        } else if self.completion_pending {
            Phase::PendingCompletion
        } else if self.map.is_none() {
            Phase::Initializing
        } else {
            Phase::Active
        }
    }

    /// Reset a settled executor; used by consumers that observe a persistent success.
    pub fn acknowledge(&mut self, kind: ActionKind) {
        executor(&mut self.executors, kind).reset();
    }

    pub fn spawn_player(&mut self, now: Instant) -> Result<(), ActionError> {
        self.submit(ActionRequest::Spawn, "Spawning player...", now)
    }

    pub fn start_game(&mut self, now: Instant) -> Result<(), ActionError> {
        self.submit(ActionRequest::StartGame, "Starting game...", now)
    }

    /// Enter the game view: create the first chamber or load the current one.
    pub fn start(&mut self, now: Instant) -> Result<(), ActionError> {
        if self.identity.is_none() {
            return Err(self.local_error(ActionKind::StartGame, ActionError::NotConnected, now));
        }
        let Some(player) = self.store.player() else {
            return Err(self.local_error(ActionKind::StartGame, ActionError::NoPlayer, now));
        };
        let chamber_id = player.chamber_id;
        self.started = true;
        if chamber_id == 0 {
            self.init_chamber(1, now)
        } else {
            self.fetch_chamber(chamber_id);
            Ok(())
        }
    }

    /// Create and enter `chamber_id` with a fresh seed.
    pub fn init_chamber(&mut self, chamber_id: u32, now: Instant) -> Result<(), ActionError> {
        let seed = self.rng.gen_range(0..self.settings.max_seed.max(1));
        let request = ActionRequest::InitChamber {
            chamber_id,
            seed,
            width: self.settings.chamber_width,
            height: self.settings.chamber_height,
        };
        let pending = format!("Initializing chamber {}...", chamber_id);
        self.submit(request, &pending, now)
    }

    /// Apply one input token. Returns `false` when the token was ignored.
    pub fn handle_input(&mut self, token: &str, now: Instant) -> bool {
        if self.any_pending() {
            debug!("Input ignored while a transaction is pending");
            return false;
        }
        let Some(command) = parse_token(token) else {
            return false;
        };
        let result = match command {
            Command::Move(dir) => self.request_move(dir, now),
            Command::Pulse => self.request_pulse(now),
            Command::Complete => self.request_completion(now),
            Command::Restart => self.restart(now),
        };
        if let Err(e) = result {
            debug!("Input {:?} refused: {}", command, e);
        }
        true
    }

    pub fn request_move(&mut self, dir: Direction, now: Instant) -> Result<(), ActionError> {
        let kind = ActionKind::Move;
        if self.identity.is_none() {
            return Err(self.local_error(kind, ActionError::NotConnected, now));
        }
        let Some(from) = self.store.player().map(|p| p.position()) else {
            return Err(self.local_error(kind, ActionError::NoPlayer, now));
        };
        if self.death_at.is_some() {
            return Err(self.local_error(kind, ActionError::Dying, now));
        }
        let Some(map) = self.map.as_ref() else {
            return Err(self.local_error(kind, ActionError::MapNotLoaded, now));
        };
        let (dx, dy) = dir.delta();
        let walkable = from
            .offset(dx, dy)
            .and_then(|to| map.kind_at(to))
            .is_some_and(CellType::is_walkable);
        if !walkable {
            return Err(self.local_error(kind, ActionError::Blocked, now));
        }
        let pending = format!("Moving {}...", dir.label());
        self.submit(ActionRequest::Move(dir), &pending, now)
    }

    pub fn request_pulse(&mut self, now: Instant) -> Result<(), ActionError> {
        let kind = ActionKind::Pulse;
        if !self.pulse_ready(now) {
            let err = self.local_error(kind, ActionError::Cooldown, now);
            self.notification = Some(err.to_string());
            return Err(err);
        }
        let radius = self.settings.pulse_remote_radius;
        self.submit(ActionRequest::Pulse { radius }, "Emitting pulse...", now)?;
        self.pulse_ready_at = Some(now + self.settings.pulse_cooldown);
        Ok(())
    }

    /// Submit completion of the current chamber. The player must stand on the exit.
    pub fn request_completion(&mut self, now: Instant) -> Result<(), ActionError> {
        let kind = ActionKind::CompleteChamber;
        let Some(player) = self.store.player() else {
            return Err(self.local_error(kind, ActionError::NoPlayer, now));
        };
        let (chamber_id, pos) = (player.chamber_id, player.position());
        let at_exit = self.map.as_ref().is_some_and(|m| m.is_exit(pos));
        if !at_exit {
            return Err(self.local_error(kind, ActionError::NotAtExit, now));
        }
        let points = self.settings.points_per_chamber;
        self.submit(
            ActionRequest::CompleteChamber { points },
            "Completing chamber...",
            now,
        )?;
        self.completion_pending = true;
        self.chambers_cleared = self.chambers_cleared.saturating_add(1);
        self.notification = Some(format!("Chamber {} completed!", chamber_id));
        Ok(())
    }

    /// Reset the player to defaults and start over from chamber 1.
    pub fn restart(&mut self, now: Instant) -> Result<(), ActionError> {
        if self.store.player().is_none() {
            return Err(self.local_error(ActionKind::InitChamber, ActionError::NoPlayer, now));
        }
        info!("Restarting run");
        for exec in self.executors.values_mut() {
            exec.reset();
        }
        self.store.apply(StoreCommand::RestartRun);
        self.map = None;
        self.fetching = None;
        self.fetch_retry_at = None;
        self.place_at_start = false;
        self.death_at = None;
        self.pulse_ready_at = None;
        self.collapse_at = None;
        self.completion_pending = false;
        self.chambers_cleared = 0;
        self.notification = None;
        self.status = None;
        self.status_clear_at = None;
        self.arrivals.forget();
        self.started = true;
        self.init_chamber(1, now)?;
        self.notification = Some("Game restarted! Welcome to Chamber 1.".to_string());
        Ok(())
    }

    /// Apply a remote result. Stale results (after a reset) are dropped.
    pub fn handle_event(&mut self, event: SessionEvent, now: Instant) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match event {
            SessionEvent::Resolved {
                kind,
                ticket,
                result,
            } => {
                let resolved = executor(&mut self.executors, kind).resolve(
                    ticket,
                    result,
                    &mut self.store,
                    now,
                );
                if let Some(resolution) = resolved {
                    self.on_resolved(resolution, now);
                }
            }
            SessionEvent::ChamberFetched {
                chamber_id,
                ticket,
                result,
            } => {
                if self.fetching != Some(chamber_id) || ticket != self.fetch_ticket {
                    debug!("Dropping stale fetch for chamber {}", chamber_id);
                    return;
                }
                self.fetching = None;
                self.on_chamber_fetched(chamber_id, result, now);
            }
        }
    }

    /// Fire every deadline that has passed.
    pub fn tick(&mut self, now: Instant) {
        for exec in self.executors.values_mut() {
            exec.tick(now);
        }
        if self.status_clear_at.is_some_and(|at| now >= at) {
            self.status = None;
            self.status_clear_at = None;
        }
        if self.pulse_ready_at.is_some_and(|at| now >= at) {
            self.pulse_ready_at = None;
        }
        if self.death_at.is_some_and(|at| now >= at) {
            self.death_at = None;
            self.respawn(now);
        }
        if self.collapse_at.is_some_and(|at| now >= at) {
            self.collapse_at = None;
            self.collapse();
        }
        self.refetch_if_missing(now);
    }

    fn submit(
        &mut self,
        request: ActionRequest,
        pending: &str,
        now: Instant,
    ) -> Result<(), ActionError> {
        let kind = request.kind();
        let begun = executor(&mut self.executors, kind).begin(
            request,
            self.identity.as_deref(),
            &self.store,
        );
        let (ticket, calls) = match begun {
            Ok(begun) => begun,
            Err(e) => return Err(self.local_error(kind, e, now)),
        };
        self.set_status(StatusKind::Pending, pending.to_string(), None, now);
        self.dispatch(kind, ticket, calls);
        Ok(())
    }

    fn dispatch(&mut self, kind: ActionKind, ticket: u64, calls: Vec<ContractCall>) {
        let Some(account) = self.identity.clone() else {
            return;
        };
        let remote = Arc::clone(&self.remote);
        let tx = self.events.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let result = submit_sequence(remote.as_ref(), &account, &calls).await;
            let event = SessionEvent::Resolved {
                kind,
                ticket,
                result,
            };
            if tx.send(event).is_err() {
                debug!("Session gone before {} resolved", kind.label());
            }
        });
    }

    fn fetch_chamber(&mut self, chamber_id: u32) {
        if self.fetching == Some(chamber_id) {
            return;
        }
        debug!("Fetching chamber {}", chamber_id);
        self.fetching = Some(chamber_id);
        self.fetch_ticket += 1;
        self.fetch_retry_at = None;
        let ticket = self.fetch_ticket;
        let indexer = Arc::clone(&self.indexer);
        let tx = self.events.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let result = indexer.fetch_chamber(chamber_id).await;
            let event = SessionEvent::ChamberFetched {
                chamber_id,
                ticket,
                result,
            };
            if tx.send(event).is_err() {
                debug!("Session gone before chamber {} arrived", chamber_id);
            }
        });
    }

    fn on_resolved(&mut self, res: Resolution, now: Instant) {
        let kind = res.kind();
        if !res.succeeded {
            if kind == ActionKind::CompleteChamber {
                self.completion_pending = false;
                self.chambers_cleared = self.chambers_cleared.saturating_sub(1);
                self.notification = None;
            }
            let message = res
                .error
                .unwrap_or_else(|| format!("{} failed", kind.title()));
            let clear = kind.clear_delays().1;
            self.set_status(StatusKind::Error, message, clear, now);
            return;
        }
        if let Some(hash) = &res.hash {
            info!("{} accepted: {}", kind.label(), short_hash(hash));
        }
        let ok = Some(self.settings.success_status);
        match res.request {
            ActionRequest::Spawn => {
                self.set_status(StatusKind::Success, "Player spawned!".into(), ok, now);
            }
            ActionRequest::StartGame => {
                if let Err(e) = self.store.set_pending_transition() {
                    warn!("Failed to record pending transition: {}", e);
                }
                self.set_status(StatusKind::Success, "Game started!".into(), ok, now);
            }
            ActionRequest::InitChamber { chamber_id, .. } => {
                self.place_at_start = true;
                self.map = None;
                self.set_status(
                    StatusKind::Success,
                    format!("Chamber {} ready", chamber_id),
                    ok,
                    now,
                );
                self.fetch_chamber(chamber_id);
            }
            ActionRequest::Move(_) => {
                self.set_status(StatusKind::Success, "Move successful!".into(), ok, now);
                self.check_arrival(now);
            }
            ActionRequest::Pulse { .. } => {
                let radius = self.settings.pulse_reveal_radius;
                if let (Some(map), Some(p)) = (self.map.as_mut(), self.store.player()) {
                    let newly = map.reveal_area(i64::from(p.x), i64::from(p.y), radius);
                    debug!("Pulse revealed {} cells", newly.len());
                    self.collapse_at = Some(now + self.settings.pulse_collapse);
                }
                self.set_status(StatusKind::Success, "Pulse emitted!".into(), ok, now);
            }
            ActionRequest::CompleteChamber { .. } => {
                metrics::inc_completions();
                self.acknowledge(ActionKind::CompleteChamber);
                self.completion_pending = false;
                self.place_at_start = true;
                self.map = None;
                self.arrivals.forget();
                let next = self.store.player().map(|p| p.chamber_id).unwrap_or(1);
                self.set_status(
                    StatusKind::Success,
                    format!("Entering Chamber {}...", next),
                    ok,
                    now,
                );
                self.fetch_chamber(next);
            }
        }
    }

    fn on_chamber_fetched(
        &mut self,
        chamber_id: u32,
        result: Result<Chamber, IndexerError>,
        now: Instant,
    ) {
        match result {
            Ok(chamber) => {
                if std::mem::take(&mut self.place_at_start) {
                    self.store.apply(StoreCommand::PlacePlayer(chamber.start()));
                }
                let pos = self
                    .store
                    .player()
                    .map(|p| p.position())
                    .unwrap_or_else(|| chamber.start());
                info!(
                    "Chamber {} loaded ({}x{}), player at {}",
                    chamber.chamber_id, chamber.width, chamber.height, pos
                );
                self.map = Some(ChamberMap::from_chamber(&chamber, pos));
                self.store.apply(StoreCommand::SetChamber(chamber));
                self.arrivals.forget();
                self.check_arrival(now);
            }
            Err(IndexerError::NotFound(id)) => {
                info!("Chamber {} does not exist yet; creating it", id);
                if let Err(e) = self.init_chamber(id, now) {
                    warn!("Could not create chamber {}: {}", id, e);
                }
            }
            Err(e) => {
                warn!(
                    "Failed to load chamber {}: {}",
                    chamber_id,
                    escape_log(&e.to_string())
                );
                self.fetch_retry_at = Some(now + FETCH_RETRY);
                self.set_status(
                    StatusKind::Error,
                    format!("Failed to load chamber: {}", e),
                    Some(FETCH_RETRY),
                    now,
                );
            }
        }
    }

    /// Edge-triggered death and exit detection for the player's current cell.
    fn check_arrival(&mut self, now: Instant) {
        let (Some(map), Some(player)) = (self.map.as_ref(), self.store.player()) else {
            return;
        };
        let pos = player.position();
        if !self.arrivals.observe(player.chamber_id, pos) {
            return;
        }
        if map.kind_at(pos) == Some(CellType::Void) {
            if self.death_at.is_none() {
                info!("Player fell into the void at {}", pos);
                self.death_at = Some(now + self.settings.death_delay);
                self.notification =
                    Some("You fell into the void... The darkness consumes you...".to_string());
            }
        } else if map.is_exit(pos) && !self.completion_pending {
            if let Err(e) = self.request_completion(now) {
                debug!("Completion not submitted: {}", e);
            }
        }
    }

    fn respawn(&mut self, now: Instant) {
        let entrance = match (&self.map, self.store.chamber()) {
            (Some(map), _) => map.player_start,
            (None, Some(chamber)) => chamber.start(),
            (None, None) => Position::default(),
        };
        metrics::inc_deaths();
        self.store.apply(StoreCommand::RecordDeath { respawn: entrance });
        if let Some(chamber) = self.store.chamber() {
            self.map = Some(ChamberMap::from_chamber(chamber, entrance));
        }
        self.notification = Some("You have been reborn at the entrance...".to_string());
        self.arrivals.forget();
        self.check_arrival(now);
    }

    fn collapse(&mut self) {
        let player = self.store.player().map(|p| p.position());
        if let Some(map) = self.map.as_mut() {
            let mut anchors = vec![map.player_start];
            anchors.extend(player);
            map.collapse_reveal(&anchors);
        }
    }

    /// A player with a chamber but no map means the map was lost; fetch it again.
    fn refetch_if_missing(&mut self, now: Instant) {
        if !self.started || self.map.is_some() || self.fetching.is_some() || self.any_pending() {
            return;
        }
        if self.fetch_retry_at.is_some_and(|at| now < at) {
            return;
        }
        let Some(player) = self.store.player() else {
            return;
        };
        if player.has_chamber() {
            let id = player.chamber_id;
            self.fetch_chamber(id);
        }
    }

    fn local_error(&mut self, kind: ActionKind, err: ActionError, now: Instant) -> ActionError {
        // A busy executor keeps its own pending line.
        if !matches!(err, ActionError::Busy(_)) {
            let clear = kind.clear_delays().1;
            self.set_status(StatusKind::Error, err.to_string(), clear, now);
        }
        metrics::record_blocked(kind.label());
        err
    }

    fn set_status(
        &mut self,
        kind: StatusKind,
        message: String,
        clear_after: Option<Duration>,
        now: Instant,
    ) {
        self.status = Some(StatusLine { kind, message });
        self.status_clear_at = clear_after.map(|d| now + d);
    }

    /// Terminal snapshot: header, map, status and notification.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(p) = self.store.player() {
            let score = self.store.game_run().map(|r| r.score).unwrap_or(0);
            out.push_str(&format!(
                "Chamber {} | Pos {} | Pulses {} | Deaths {} | Score {}\n",
                p.chamber_id,
                p.position(),
                p.pulses_used,
                p.deaths,
                score
            ));
            match &self.map {
                Some(map) => out.push_str(&map.render_ascii(p.position())),
                None => out.push_str("Loading chamber...\n"),
            }
        } else {
            out.push_str("No player. Run `echoes spawn` first.\n");
        }
        if let Some(status) = &self.status {
            let tag = match status.kind {
                StatusKind::Pending => "...",
                StatusKind::Success => "ok",
                StatusKind::Error => "!!",
            };
            out.push_str(&format!("[{}] {}\n", tag, status.message));
        }
        if let Some(note) = &self.notification {
            out.push_str(&format!("* {}\n", note));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::actions::TxPhase;
    use crate::game::types::Player;
    use crate::remote::local::LocalChain;
    use crate::remote::Entrypoint;

    type Session = GameSession<LocalChain, LocalChain>;

    fn open_chamber(id: u32, w: u32, h: u32) -> Chamber {
        Chamber {
            chamber_id: id,
            width: w,
            height: h,
            map: vec![CellType::Path.code(); (w * h) as usize],
            start_x: 0,
            start_y: 0,
            exit_x: w - 1,
            exit_y: h - 1,
            seed: 1,
        }
    }

    fn session_with_player(chain: Arc<LocalChain>) -> (Session, UnboundedReceiver<SessionEvent>) {
        let mut store = GameStore::in_memory();
        store.apply(StoreCommand::SetPlayer(Player::new("0xabc")));
        let (mut session, rx) =
            GameSession::new(chain.clone(), chain, store, SessionSettings::default());
        session.connect("0xabc");
        (session.with_rng_seed(7), rx)
    }

    async fn drain(session: &mut Session, rx: &mut UnboundedReceiver<SessionEvent>, now: Instant) {
        while session.in_flight() > 0 {
            let ev = rx.recv().await.expect("event channel open");
            session.handle_event(ev, now);
        }
    }

    #[tokio::test]
    async fn start_without_chamber_inits_chamber_one_and_places_player() {
        let chain = Arc::new(LocalChain::new());
        chain.install_layout(open_chamber(1, 5, 5));
        let (mut s, mut rx) = session_with_player(chain.clone());
        let now = Instant::now();
        assert_eq!(s.phase(), Phase::Initializing);
        s.start(now).unwrap();
        drain(&mut s, &mut rx, now).await;

        assert_eq!(s.phase(), Phase::Active);
        assert_eq!(s.store().player().unwrap().chamber_id, 1);
        assert_eq!(chain.calls_to(Entrypoint::CreateChamber), 1);
        assert_eq!(chain.calls_to(Entrypoint::EnterChamber), 1);
        let map = s.map().unwrap();
        assert_eq!(map.revealed_positions(), vec![Position::new(0, 0)]);
    }

    #[tokio::test]
    async fn wall_blocks_without_remote_call() {
        let chain = Arc::new(LocalChain::new());
        let mut layout = open_chamber(1, 4, 4);
        layout.map[1] = CellType::Wall.code();
        chain.install_layout(layout);
        let (mut s, mut rx) = session_with_player(chain.clone());
        let now = Instant::now();
        s.start(now).unwrap();
        drain(&mut s, &mut rx, now).await;

        assert_eq!(
            s.request_move(Direction::Right, now),
            Err(ActionError::Blocked)
        );
        assert_eq!(
            s.request_move(Direction::Up, now),
            Err(ActionError::Blocked)
        );
        assert_eq!(s.status().unwrap().message, "Cannot move into wall");
        assert_eq!(chain.calls_to(Entrypoint::MovePlayer), 0);
    }

    #[tokio::test]
    async fn input_is_ignored_while_pending() {
        let chain = Arc::new(LocalChain::new());
        chain.install_layout(open_chamber(1, 4, 4));
        let (mut s, mut rx) = session_with_player(chain.clone());
        let now = Instant::now();
        s.start(now).unwrap();
        drain(&mut s, &mut rx, now).await;

        assert!(s.handle_input("d", now));
        assert!(s.any_pending());
        assert_eq!(s.status().unwrap().message, "Moving right...");
        assert!(!s.handle_input("d", now));
        drain(&mut s, &mut rx, now).await;
        assert_eq!(chain.calls_to(Entrypoint::MovePlayer), 1);
        assert_eq!(s.store().player().unwrap().x, 1);
        assert_eq!(s.status().unwrap().message, "Move successful!");
    }

    #[tokio::test]
    async fn rejected_move_keeps_position_and_reports_code() {
        let chain = Arc::new(LocalChain::new());
        chain.install_layout(open_chamber(1, 4, 4));
        let (mut s, mut rx) = session_with_player(chain.clone());
        let now = Instant::now();
        s.start(now).unwrap();
        drain(&mut s, &mut rx, now).await;

        chain.reject_next(Entrypoint::MovePlayer, "OUT_OF_GAS");
        s.request_move(Direction::Down, now).unwrap();
        drain(&mut s, &mut rx, now).await;
        assert_eq!(s.store().player().unwrap().position(), Position::new(0, 0));
        let status = s.status().unwrap();
        assert_eq!(status.kind, StatusKind::Error);
        assert_eq!(status.message, "Move transaction failed with code: OUT_OF_GAS");
        s.tick(now + Duration::from_secs(3));
        assert!(s.status().is_none());
        assert_eq!(s.tx_status(ActionKind::Move).phase, TxPhase::None);
    }

    #[tokio::test]
    async fn pulse_reveals_then_collapses_and_respects_cooldown() {
        let chain = Arc::new(LocalChain::new());
        chain.install_layout(open_chamber(1, 9, 9));
        let (mut s, mut rx) = session_with_player(chain.clone());
        let t0 = Instant::now();
        s.start(t0).unwrap();
        drain(&mut s, &mut rx, t0).await;

        s.request_pulse(t0).unwrap();
        drain(&mut s, &mut rx, t0).await;
        assert_eq!(chain.calls()[2].call, ContractCall::emit_pulse(5));
        // radius 2 disc clipped to the corner: 6 cells
        assert_eq!(s.map().unwrap().revealed_positions().len(), 6);
        assert_eq!(s.store().player().unwrap().pulses_used, 1);

        let during = t0 + Duration::from_secs(1);
        s.tick(during);
        assert_eq!(s.request_pulse(during), Err(ActionError::Cooldown));
        assert_eq!(chain.calls_to(Entrypoint::EmitPulse), 1);

        let later = t0 + Duration::from_secs(3);
        s.tick(later);
        assert_eq!(
            s.map().unwrap().revealed_positions(),
            vec![Position::new(0, 0)]
        );
        assert!(s.pulse_ready(later));
    }

    #[tokio::test]
    async fn indexer_not_found_triggers_init_of_that_chamber() {
        let chain = Arc::new(LocalChain::new());
        let mut store = GameStore::in_memory();
        let mut player = Player::new("0xabc");
        player.chamber_id = 3;
        store.apply(StoreCommand::SetPlayer(player));
        let (mut s, mut rx) = GameSession::new(
            chain.clone(),
            chain.clone(),
            store,
            SessionSettings::default(),
        );
        s.connect("0xabc");
        let now = Instant::now();
        s.start(now).unwrap();
        drain(&mut s, &mut rx, now).await;
        let creates: Vec<_> = chain
            .calls()
            .into_iter()
            .filter(|c| c.call.entrypoint == Entrypoint::CreateChamber)
            .collect();
        assert_eq!(creates.len(), 1);
        assert_eq!(creates[0].call.calldata[0], 3);
        assert_eq!(creates[0].call.calldata[2], 16);
        assert!(s.map().is_some());
    }

    #[tokio::test]
    async fn fetch_from_before_restart_is_dropped() {
        let chain = Arc::new(LocalChain::new());
        chain.insert_chamber(open_chamber(1, 4, 4));
        let mut store = GameStore::in_memory();
        let mut player = Player::new("0xabc");
        player.chamber_id = 1;
        player.x = 2;
        store.apply(StoreCommand::SetPlayer(player));
        let (mut s, mut rx) = GameSession::new(
            chain.clone(),
            chain.clone(),
            store,
            SessionSettings::default(),
        );
        s.connect("0xabc");
        let now = Instant::now();
        s.start(now).unwrap();
        chain.install_layout(open_chamber(1, 6, 6));
        s.restart(now).unwrap();

        // deliver the pre-restart fetch only after the fresh init has resolved
        let first = rx.recv().await.expect("event channel open");
        let second = rx.recv().await.expect("event channel open");
        let (old_fetch, init) = match first {
            SessionEvent::ChamberFetched { .. } => (first, second),
            SessionEvent::Resolved { .. } => (second, first),
        };
        s.handle_event(init, now);
        assert_eq!(s.in_flight(), 2);
        s.handle_event(old_fetch, now);
        assert!(s.map().is_none());

        drain(&mut s, &mut rx, now).await;
        assert_eq!(s.map().unwrap().width, 6);
        assert_eq!(s.store().player().unwrap().position(), Position::new(0, 0));
    }

    #[tokio::test]
    async fn not_connected_refuses_everything() {
        let chain = Arc::new(LocalChain::new());
        let (mut s, _rx) = GameSession::new(
            chain.clone(),
            chain.clone(),
            GameStore::in_memory(),
            SessionSettings::default(),
        );
        let now = Instant::now();
        assert_eq!(s.spawn_player(now), Err(ActionError::NotConnected));
        assert_eq!(s.status().unwrap().message, "Please connect your controller");
        assert_eq!(s.phase(), Phase::Idle);
        assert!(chain.calls().is_empty());
    }

    #[tokio::test]
    async fn restart_resets_player_and_reinits() {
        let chain = Arc::new(LocalChain::new());
        chain.install_layout(open_chamber(1, 4, 4));
        let (mut s, mut rx) = session_with_player(chain.clone());
        let now = Instant::now();
        s.start(now).unwrap();
        drain(&mut s, &mut rx, now).await;
        s.request_move(Direction::Right, now).unwrap();
        drain(&mut s, &mut rx, now).await;

        assert!(s.handle_input("r", now));
        assert_eq!(
            s.notification(),
            Some("Game restarted! Welcome to Chamber 1.")
        );
        drain(&mut s, &mut rx, now).await;
        let p = s.store().player().unwrap();
        assert_eq!((p.chamber_id, p.x, p.y, p.pulses_used), (1, 0, 0, 0));
        assert_eq!(chain.calls_to(Entrypoint::CreateChamber), 2);
    }
}

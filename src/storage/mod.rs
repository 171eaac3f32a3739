//! # Storage Module - Persisted Client Store
//!
//! [`GameStore`] is the single source of truth for the client's view of the game: the
//! player record, the chamber metadata last fetched from the indexer, the current game
//! run and the game-started flag. Everything reads it through [`GameStore::snapshot`] and
//! writes it through [`GameStore::apply`] with a [`StoreCommand`]; mutations are synchronous
//! last-writer-wins merges into the existing record.
//!
//! ## Persistence
//!
//! Only a subset survives a reload: the player snapshot and the game-started flag. Chamber
//! data, reveal state and run bookkeeping are rebuilt from the remote side on load.
//!
//! ```text
//! data/
//! └── store/
//!     ├── <store_name>.json         ← persisted subset (atomic write + rename)
//!     └── <store_name>.transition   ← one-shot "enter the game view" marker
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use echoes::storage::{GameStore, StoreCommand};
//! use echoes::game::types::Player;
//!
//! fn main() -> Result<(), echoes::storage::StoreError> {
//!     let mut store = GameStore::open("./data", "echoes-of-the-void-store")?;
//!     store.apply(StoreCommand::SetPlayer(Player::new("0x0123")));
//!     store.apply(StoreCommand::Translate { dx: 1, dy: 0 });
//!     assert_eq!(store.snapshot().player.map(|p| p.x), Some(1));
//!     Ok(())
//! }
//! ```

use crate::game::types::{Chamber, GameRun, Player, Position};
use crate::validation::{safe_filename, secure_json_parse};
use chrono::Utc;
use fs2::FileExt;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound for a persisted store file.
const MAX_STORE_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt store file {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

/// Every way the store can change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCommand {
    /// Replace (or clear) the player record.
    SetPlayer(Player),
    ClearPlayer,
    /// Move the player by a signed delta; coordinates saturate at zero.
    Translate { dx: i32, dy: i32 },
    /// Put the player on an absolute cell.
    PlacePlayer(Position),
    RecordPulse,
    EnterChamber(u32),
    /// Advance to the next chamber and credit the run.
    CompleteChamber { points: u64 },
    /// Count a death and respawn at `respawn`.
    RecordDeath { respawn: Position },
    StartRun { identity: String },
    SetChamber(Chamber),
    SetGameStarted(bool),
    /// Reset the player to defaults while keeping its identity.
    RestartRun,
    /// Forget everything.
    Reset,
}

/// Read-only copy of the store's contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub player: Option<Player>,
    pub game_started: bool,
    pub chamber: Option<Chamber>,
    pub game_run: Option<GameRun>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default)]
    player: Option<Player>,
    #[serde(default)]
    game_started: bool,
}

pub struct GameStore {
    state: StoreSnapshot,
    path: Option<PathBuf>,
    /// In-memory transition marker when no path is configured.
    transition: bool,
    runs_started: u32,
}

impl GameStore {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        GameStore {
            state: StoreSnapshot::default(),
            path: None,
            transition: false,
            runs_started: 0,
        }
    }

    /// Open the named store under `data_dir`, loading the persisted subset if present.
    pub fn open(data_dir: &str, name: &str) -> Result<Self, StoreError> {
        let path = store_path(data_dir, name);
        let mut store = GameStore {
            path: Some(path.clone()),
            ..GameStore::in_memory()
        };
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let persisted: PersistedState =
                secure_json_parse(&content, MAX_STORE_BYTES).map_err(|e| StoreError::Corrupt {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            debug!(
                "Loaded store {} (player: {}, started: {})",
                path.display(),
                persisted.player.is_some(),
                persisted.game_started
            );
            store.state.player = persisted.player;
            store.state.game_started = persisted.game_started;
        }
        Ok(store)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.clone()
    }

    pub fn player(&self) -> Option<&Player> {
        self.state.player.as_ref()
    }

    pub fn chamber(&self) -> Option<&Chamber> {
        self.state.chamber.as_ref()
    }

    pub fn game_run(&self) -> Option<&GameRun> {
        self.state.game_run.as_ref()
    }

    pub fn game_started(&self) -> bool {
        self.state.game_started
    }

    /// Apply one mutation. Commands that need a player are no-ops without one.
    pub fn apply(&mut self, command: StoreCommand) {
        let before = self.persisted();
        let st = &mut self.state;
        match command {
            StoreCommand::SetPlayer(player) => st.player = Some(player),
            StoreCommand::ClearPlayer => st.player = None,
            StoreCommand::Translate { dx, dy } => {
                if let Some(p) = st.player.as_mut() {
                    p.x = p.x.saturating_add_signed(dx);
                    p.y = p.y.saturating_add_signed(dy);
                }
            }
            StoreCommand::PlacePlayer(pos) => {
                if let Some(p) = st.player.as_mut() {
                    p.x = pos.x;
                    p.y = pos.y;
                }
            }
            StoreCommand::RecordPulse => {
                if let Some(p) = st.player.as_mut() {
                    p.pulses_used = p.pulses_used.saturating_add(1);
                }
            }
            StoreCommand::EnterChamber(chamber_id) => {
                if let Some(p) = st.player.as_mut() {
                    p.chamber_id = chamber_id;
                }
            }
            StoreCommand::CompleteChamber { points } => {
                if let Some(p) = st.player.as_mut() {
                    p.chamber_id = p.chamber_id.saturating_add(1);
                }
                if let Some(run) = st.game_run.as_mut() {
                    run.completed_chambers = run.completed_chambers.saturating_add(1);
                    run.score = run.score.saturating_add(points);
                }
            }
            StoreCommand::RecordDeath { respawn } => {
                if let Some(p) = st.player.as_mut() {
                    p.deaths = p.deaths.saturating_add(1);
                    p.x = respawn.x;
                    p.y = respawn.y;
                }
            }
            StoreCommand::StartRun { identity } => {
                self.runs_started = self.runs_started.saturating_add(1);
                st.game_run = Some(GameRun {
                    run_id: self.runs_started,
                    player: identity,
                    score: 0,
                    completed_chambers: 0,
                    started_at: Utc::now(),
                });
                st.game_started = true;
            }
            StoreCommand::SetChamber(chamber) => st.chamber = Some(chamber),
            StoreCommand::SetGameStarted(started) => st.game_started = started,
            StoreCommand::RestartRun => {
                if let Some(p) = st.player.as_mut() {
                    *p = Player::new(&p.player);
                }
                st.chamber = None;
            }
            StoreCommand::Reset => {
                *st = StoreSnapshot::default();
            }
        }
        if self.persisted() != before {
            if let Err(e) = self.flush() {
                warn!("Failed to persist store: {}", e);
            }
        }
    }

    fn persisted(&self) -> PersistedState {
        PersistedState {
            player: self.state.player.clone(),
            game_started: self.state.game_started,
        }
    }

    /// Write the persisted subset now.
    pub fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.persisted())?;
        write_json_atomic(path, &json)?;
        Ok(())
    }

    /// Mark that the next launch should go straight to the game view.
    pub fn set_pending_transition(&mut self) -> Result<(), StoreError> {
        match &self.path {
            Some(path) => {
                let marker = path.with_extension("transition");
                ensure_dir(marker.parent().unwrap_or(Path::new(".")))?;
                std::fs::write(marker, b"1")?;
            }
            None => self.transition = true,
        }
        Ok(())
    }

    /// Consume the transition marker; `true` at most once per `set_pending_transition`.
    pub fn take_pending_transition(&mut self) -> bool {
        match &self.path {
            Some(path) => {
                let marker = path.with_extension("transition");
                std::fs::remove_file(marker).is_ok()
            }
            None => std::mem::take(&mut self.transition),
        }
    }
}

fn store_path(data_dir: &str, name: &str) -> PathBuf {
    Path::new(data_dir)
        .join("store")
        .join(format!("{}.json", safe_filename(name)))
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)
}

fn write_json_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    ensure_dir(dir)?;
    // Lock a sidecar so readers never observe a truncated store file.
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path.with_extension("lock"))?;
    lock_file.lock_exclusive()?;
    let base = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("store.json");
    let mut counter = 0u32;
    let tmp_path = loop {
        let cand = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
        match OpenOptions::new().write(true).create_new(true).open(&cand) {
            Ok(mut tmp) => {
                tmp.write_all(content.as_bytes())?;
                let _ = tmp.flush();
                let _ = tmp.sync_all();
                break cand;
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                counter = counter.saturating_add(1);
                continue;
            }
            Err(e) => return Err(e),
        }
    };
    std::fs::rename(&tmp_path, path)?;
    if let Ok(dirf) = File::open(dir) {
        let _ = dirf.sync_all();
    }
    drop(lock_file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_player() -> GameStore {
        let mut store = GameStore::in_memory();
        store.apply(StoreCommand::SetPlayer(Player::new("0xabc")));
        store
    }

    #[test]
    fn mutations_without_player_are_noops() {
        let mut store = GameStore::in_memory();
        store.apply(StoreCommand::Translate { dx: 1, dy: 1 });
        store.apply(StoreCommand::RecordPulse);
        store.apply(StoreCommand::CompleteChamber { points: 100 });
        assert_eq!(store.snapshot(), StoreSnapshot::default());
    }

    #[test]
    fn translate_saturates_at_origin() {
        let mut store = store_with_player();
        store.apply(StoreCommand::Translate { dx: -1, dy: 2 });
        let p = store.player().unwrap();
        assert_eq!((p.x, p.y), (0, 2));
    }

    #[test]
    fn completion_advances_chamber_and_run() {
        let mut store = store_with_player();
        store.apply(StoreCommand::EnterChamber(1));
        store.apply(StoreCommand::StartRun {
            identity: "0xabc".into(),
        });
        store.apply(StoreCommand::CompleteChamber { points: 100 });
        assert_eq!(store.player().unwrap().chamber_id, 2);
        let run = store.game_run().unwrap();
        assert_eq!(run.completed_chambers, 1);
        assert_eq!(run.score, 100);
        assert_eq!(run.run_id, 1);
        assert!(store.game_started());
    }

    #[test]
    fn death_counts_and_respawns() {
        let mut store = store_with_player();
        store.apply(StoreCommand::PlacePlayer(Position::new(2, 2)));
        store.apply(StoreCommand::RecordDeath {
            respawn: Position::new(0, 1),
        });
        let p = store.player().unwrap();
        assert_eq!(p.deaths, 1);
        assert_eq!(p.position(), Position::new(0, 1));
    }

    #[test]
    fn restart_keeps_identity_only() {
        let mut store = store_with_player();
        store.apply(StoreCommand::EnterChamber(4));
        store.apply(StoreCommand::RecordPulse);
        store.apply(StoreCommand::RestartRun);
        assert_eq!(store.player(), Some(&Player::new("0xabc")));
        assert!(store.chamber().is_none());
    }

    #[test]
    fn unwritable_store_dir_reports_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("store"), b"not a directory").unwrap();
        let dir = tmp.path().to_str().unwrap();
        let mut store = GameStore::open(dir, "echoes-of-the-void-store").unwrap();
        store.apply(StoreCommand::SetGameStarted(true));
        assert!(matches!(store.flush(), Err(StoreError::Io(_))));
        assert!(matches!(
            store.set_pending_transition(),
            Err(StoreError::Io(_))
        ));
        assert!(!store.take_pending_transition());
    }

    #[test]
    fn persisted_subset_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();
        {
            let mut store = GameStore::open(dir, "echoes-of-the-void-store").unwrap();
            store.apply(StoreCommand::SetPlayer(Player::new("0xabc")));
            store.apply(StoreCommand::Translate { dx: 3, dy: 1 });
            store.apply(StoreCommand::SetGameStarted(true));
            store.apply(StoreCommand::SetChamber(crate::remote::local::generate_chamber(
                1, 5, 4, 4,
            )
            .unwrap()));
        }
        let store = GameStore::open(dir, "echoes-of-the-void-store").unwrap();
        let p = store.player().unwrap();
        assert_eq!((p.x, p.y), (3, 1));
        assert!(store.game_started());
        assert!(store.chamber().is_none(), "chamber is rebuilt remotely");
    }

    #[test]
    fn corrupt_file_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();
        let path = store_path(dir, "s");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            GameStore::open(dir, "s"),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn transition_marker_is_consumed_once() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();
        let mut store = GameStore::open(dir, "s").unwrap();
        assert!(!store.take_pending_transition());
        store.set_pending_transition().unwrap();
        assert!(store.take_pending_transition());
        assert!(!store.take_pending_transition());

        let mut mem = GameStore::in_memory();
        mem.set_pending_transition().unwrap();
        assert!(mem.take_pending_transition());
        assert!(!mem.take_pending_transition());
    }
}

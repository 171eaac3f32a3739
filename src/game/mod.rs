//! # Game Module - Chamber Exploration Core
//!
//! Client-side state for the chamber game: the map model and reveal engine, the action
//! executors that wrap each remote interaction, and the session controller that ties them
//! to player input.
//!
//! - [`types`] - Positions, cell codes, directions and the mirrored contract records
//! - [`map`] - Chamber grid, landmarks and reveal/collapse
//! - [`actions`] - Per-action transaction state machines with optimistic store updates
//! - [`arrival`] - Edge-triggered arrival detection for death and completion
//! - [`input`] - Keyboard token parsing
//! - [`session`] - Orchestration, timers and status lines

pub mod actions;
pub mod arrival;
pub mod input;
pub mod map;
pub mod session;
pub mod types;

pub use actions::{ActionError, ActionKind, TxPhase, TxStatus};
pub use map::{Cell, ChamberMap};
pub use session::{GameSession, Phase, SessionEvent, SessionSettings, StatusKind, StatusLine};
pub use types::{CellType, Chamber, Direction, GameRun, Player, Position};

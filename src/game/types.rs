//! Shared value types for the chamber game: coordinates, cell codes, directions and the
//! records mirrored from the contract models (player, chamber, game run).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer grid coordinate. `x` grows to the right, `y` grows downward (screen order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl Position {
    pub const fn new(x: u32, y: u32) -> Self {
        Position { x, y }
    }

    /// Apply a signed delta; `None` when the result would leave the non-negative quadrant.
    pub fn offset(self, dx: i32, dy: i32) -> Option<Position> {
        Some(Position {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Cell type codes as stored in the chamber's flattened map array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    Wall,
    Player,
    Path,
    Void,
    Exit,
    Start,
}

impl CellType {
    pub fn code(self) -> u8 {
        match self {
            CellType::Wall => 0,
            CellType::Player => 1,
            CellType::Path => 2,
            CellType::Void => 3,
            CellType::Exit => 4,
            CellType::Start => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<CellType> {
        match code {
            0 => Some(CellType::Wall),
            1 => Some(CellType::Player),
            2 => Some(CellType::Path),
            3 => Some(CellType::Void),
            4 => Some(CellType::Exit),
            5 => Some(CellType::Start),
            _ => None,
        }
    }

    /// Whether the player may step onto this cell. Void is enterable (and lethal).
    pub fn is_walkable(self) -> bool {
        !matches!(self, CellType::Wall)
    }
}

/// Movement intent. The delta convention is fixed here and used everywhere:
/// validation, the `move_player` arguments and the optimistic store update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

/// Local mirror of the contract's player model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Account identity that owns this player.
    pub player: String,
    /// Current chamber; `0` means no chamber has been entered yet.
    pub chamber_id: u32,
    pub x: u32,
    pub y: u32,
    pub pulses_used: u32,
    pub deaths: u32,
}

impl Player {
    pub fn new(identity: &str) -> Self {
        Player {
            player: identity.to_string(),
            chamber_id: 0,
            x: 0,
            y: 0,
            pulses_used: 0,
            deaths: 0,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn has_chamber(&self) -> bool {
        self.chamber_id > 0
    }
}

/// Largest width or height a chamber may declare.
pub const MAX_CHAMBER_DIM: u32 = 256;

/// Chamber metadata as served by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chamber {
    pub chamber_id: u32,
    pub width: u32,
    pub height: u32,
    /// Row-major cell codes, `width * height` long when complete.
    pub map: Vec<u8>,
    pub start_x: u32,
    pub start_y: u32,
    pub exit_x: u32,
    pub exit_y: u32,
    pub seed: u64,
}

impl Chamber {
    pub fn start(&self) -> Position {
        Position::new(self.start_x, self.start_y)
    }

    pub fn exit(&self) -> Position {
        Position::new(self.exit_x, self.exit_y)
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Both dimensions lie in `1..=MAX_CHAMBER_DIM`.
    pub fn has_valid_dimensions(&self) -> bool {
        (1..=MAX_CHAMBER_DIM).contains(&self.width) && (1..=MAX_CHAMBER_DIM).contains(&self.height)
    }
}

/// One play-through: created by `create_game_run`, advanced by chamber completions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRun {
    pub run_id: u32,
    pub player: String,
    pub score: u64,
    pub completed_chambers: u32,
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_codes_round_trip_and_unknown_is_none() {
        for code in 0u8..=5 {
            let ty = CellType::from_code(code).unwrap();
            assert_eq!(ty.code(), code);
        }
        assert_eq!(CellType::from_code(6), None);
        assert_eq!(CellType::from_code(255), None);
    }

    #[test]
    fn vertical_deltas_use_screen_coordinates() {
        assert_eq!(Direction::Up.delta(), (0, -1));
        assert_eq!(Direction::Down.delta(), (0, 1));
        let p = Position::new(3, 3);
        let (dx, dy) = Direction::Up.delta();
        assert_eq!(p.offset(dx, dy), Some(Position::new(3, 2)));
    }

    #[test]
    fn offset_refuses_negative_coordinates() {
        let origin = Position::new(0, 0);
        assert_eq!(origin.offset(-1, 0), None);
        assert_eq!(origin.offset(0, -1), None);
        assert_eq!(origin.offset(1, 1), Some(Position::new(1, 1)));
    }

    #[test]
    fn only_walls_block_movement() {
        assert!(!CellType::Wall.is_walkable());
        assert!(CellType::Void.is_walkable());
        assert!(CellType::Exit.is_walkable());
        assert!(CellType::Path.is_walkable());
    }
}

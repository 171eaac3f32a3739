//! Chamber map model and reveal engine.
//!
//! A [`ChamberMap`] is derived from indexer metadata: the flattened cell-code array is
//! unfolded into rows, the declared start and exit landmarks are stamped over whatever the
//! array encoded, and only the player's own cell starts out revealed. Reveal state is purely
//! client-side and not monotonic: a pulse grows it ([`ChamberMap::reveal_area`]) and the
//! collapse that follows shrinks it back to a few anchors ([`ChamberMap::collapse_reveal`]).

use super::types::{CellType, Chamber, Position};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub pos: Position,
    pub kind: CellType,
    pub revealed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChamberMap {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    /// `cells[y][x]`
    pub cells: Vec<Vec<Cell>>,
    /// Entrance captured when the chamber was loaded. Never follows the player.
    pub player_start: Position,
    pub exit: Option<Position>,
}

impl ChamberMap {
    /// Build the map for `chamber` with the player standing at `player`.
    pub fn from_chamber(chamber: &Chamber, player: Position) -> Self {
        let mut cells = Vec::with_capacity(chamber.height as usize);
        for y in 0..chamber.height {
            let mut row = Vec::with_capacity(chamber.width as usize);
            for x in 0..chamber.width {
                let idx = (y as usize) * (chamber.width as usize) + x as usize;
                // Missing or unknown codes fall back to void rather than failing the load.
                let kind = chamber
                    .map
                    .get(idx)
                    .and_then(|code| CellType::from_code(*code))
                    .unwrap_or(CellType::Void);
                row.push(Cell {
                    pos: Position::new(x, y),
                    kind,
                    revealed: false,
                });
            }
            cells.push(row);
        }

        let mut map = ChamberMap {
            id: chamber.chamber_id,
            width: chamber.width,
            height: chamber.height,
            cells,
            player_start: chamber.start(),
            exit: None,
        };

        // Landmarks override the encoded data; exit is stamped last so it wins a tie.
        if let Some(cell) = map.cell_mut(chamber.start()) {
            cell.kind = CellType::Start;
        }
        if let Some(cell) = map.cell_mut(chamber.exit()) {
            cell.kind = CellType::Exit;
            map.exit = Some(chamber.exit());
        }
        if let Some(cell) = map.cell_mut(player) {
            cell.revealed = true;
        }
        map
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    pub fn cell(&self, pos: Position) -> Option<&Cell> {
        self.cells.get(pos.y as usize)?.get(pos.x as usize)
    }

    fn cell_mut(&mut self, pos: Position) -> Option<&mut Cell> {
        self.cells.get_mut(pos.y as usize)?.get_mut(pos.x as usize)
    }

    pub fn kind_at(&self, pos: Position) -> Option<CellType> {
        self.cell(pos).map(|c| c.kind)
    }

    pub fn is_revealed(&self, pos: Position) -> bool {
        self.cell(pos).map(|c| c.revealed).unwrap_or(false)
    }

    pub fn is_exit(&self, pos: Position) -> bool {
        self.exit == Some(pos)
    }

    /// Reveal every in-bounds cell whose Euclidean distance to `(cx, cy)` is at most
    /// `radius`. The center may lie outside the grid. Returns the cells that flipped from
    /// hidden to revealed.
    pub fn reveal_area(&mut self, cx: i64, cy: i64, radius: u32) -> Vec<Cell> {
        // i128 keeps extreme centers and radii from overflowing.
        let (cx, cy, r) = (i128::from(cx), i128::from(cy), i128::from(radius));
        let r2 = r * r;
        let y_lo = (cy - r).max(0);
        let y_hi = (cy + r).min(i128::from(self.height) - 1);
        let x_lo = (cx - r).max(0);
        let x_hi = (cx + r).min(i128::from(self.width) - 1);

        let mut newly = Vec::new();
        if y_lo > y_hi || x_lo > x_hi {
            return newly;
        }
        for y in y_lo..=y_hi {
            for x in x_lo..=x_hi {
                let (dx, dy) = (x - cx, y - cy);
                if dx * dx + dy * dy > r2 {
                    continue;
                }
                let cell = &mut self.cells[y as usize][x as usize];
                if !cell.revealed {
                    cell.revealed = true;
                    newly.push(cell.clone());
                }
            }
        }
        newly
    }

    /// Hide everything except the anchor cells.
    pub fn collapse_reveal(&mut self, anchors: &[Position]) {
        for row in self.cells.iter_mut() {
            for cell in row.iter_mut() {
                cell.revealed = anchors.contains(&cell.pos);
            }
        }
    }

    pub fn revealed_positions(&self) -> Vec<Position> {
        self.cells
            .iter()
            .flatten()
            .filter(|c| c.revealed)
            .map(|c| c.pos)
            .collect()
    }

    /// Plain-text snapshot for terminals: `@` player, `?` hidden, then one glyph per type.
    pub fn render_ascii(&self, player: Position) -> String {
        let mut out = String::with_capacity(((self.width as usize) * 2 + 1) * self.height as usize + 64);
        for row in &self.cells {
            for (i, cell) in row.iter().enumerate() {
                let glyph = if cell.pos == player {
                    '@'
                } else if !cell.revealed {
                    '?'
                } else {
                    match cell.kind {
                        CellType::Wall => '#',
                        CellType::Player | CellType::Path => '.',
                        CellType::Void => '~',
                        CellType::Exit => 'E',
                        CellType::Start => 'S',
                    }
                };
                out.push(glyph);
                if i + 1 < row.len() {
                    out.push(' ');
                }
            }
            out.push('\n');
        }
        out.push_str("@=You ?=Dark #=Wall ~=Void S=Entrance E=Exit\n");
        out
    }
}

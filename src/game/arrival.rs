//! Edge-triggered arrival detection.
//!
//! Position is sampled on every tick, but death and completion must fire once per
//! *transition into* a cell, not once per sample. [`ArrivalTracker`] remembers the last
//! `(chamber, position)` it saw and reports only changes.

use super::types::Position;

#[derive(Debug, Default, Clone)]
pub struct ArrivalTracker {
    last: Option<(u32, Position)>,
}

impl ArrivalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when `(chamber_id, pos)` differs from the previous observation.
    pub fn observe(&mut self, chamber_id: u32, pos: Position) -> bool {
        let snapshot = Some((chamber_id, pos));
        if self.last == snapshot {
            return false;
        }
        self.last = snapshot;
        true
    }

    /// Forget the last snapshot so the next observation fires even if unchanged.
    pub fn forget(&mut self) {
        self.last = None;
    }
}

//! Position keys and occurrence counts for the threefold-repetition draw.

use std::fmt::Write;

use hashbrown::HashMap;

use crate::board::Orientation;
use crate::state::MatchState;

/// Occurrences at which a position is declared drawn.
pub const REPETITION_LIMIT: u32 = 3;

/// Rule-equivalence key: turn holder, active pawns sorted by id, walls sorted by
/// `(row, col, orientation)`. Clocks, budgets and history are not part of it.
pub fn canonical_hash(state: &MatchState) -> String {
    let capacity = 16 + 8 * (state.active_players.len() + state.placed_walls.len());
    let mut key = String::with_capacity(capacity);
    match state.player_turn() {
        Some(id) => key.push_str(id.as_str()),
        None => key.push('-'),
    }
    key.push('|');

    let mut active = state.active_players.clone();
    active.sort_unstable();
    for (i, id) in active.iter().enumerate() {
        if i > 0 {
            key.push(';');
        }
        if let Some(cell) = state.pawn_positions.get(id) {
            let _ = write!(key, "{id}:{},{}", cell.row, cell.col);
        }
    }
    key.push('|');

    let mut walls = state.placed_walls.clone();
    walls.sort_unstable_by_key(|w| (w.row, w.col, w.orientation));
    for (i, wall) in walls.iter().enumerate() {
        if i > 0 {
            key.push(';');
        }
        let tag = match wall.orientation {
            Orientation::Horizontal => 'h',
            Orientation::Vertical => 'v',
        };
        let _ = write!(key, "{},{},{tag}", wall.row, wall.col);
    }
    key
}

/// Occurrence counts per canonical position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepetitionTable {
    counts: HashMap<String, u32>,
}

impl RepetitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every snapshot of `history` from scratch.
    pub fn rebuild<'a, I>(history: I) -> Self
    where
        I: IntoIterator<Item = &'a MatchState>,
    {
        let mut table = Self::new();
        for state in history {
            table.record(state);
        }
        table
    }

    /// Count `state` and return how often its position has now been seen.
    pub fn record(&mut self, state: &MatchState) -> u32 {
        let count = self.counts.entry(canonical_hash(state)).or_insert(0);
        *count += 1;
        *count
    }

    pub fn occurrences(&self, state: &MatchState) -> u32 {
        self.counts.get(&canonical_hash(state)).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

//! Remaining time per player, kept beside the snapshots and stamped into each commit.

use std::collections::BTreeMap;

use crate::player::PlayerId;
use crate::state::MatchState;

/// Remaining thinking time per player, in milliseconds.
///
/// Kept outside the snapshots so ticking never rewrites history; each committed snapshot is
/// stamped with the clock as it stood at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clock {
    remaining: BTreeMap<PlayerId, i64>,
}

impl Clock {
    pub fn from_state(state: &MatchState) -> Self {
        Self {
            remaining: state.timers.clone(),
        }
    }

    pub fn remaining(&self, player: PlayerId) -> i64 {
        self.remaining.get(&player).copied().unwrap_or(0)
    }

    pub fn timers(&self) -> &BTreeMap<PlayerId, i64> {
        &self.remaining
    }

    /// Charge `elapsed_ms` to `player`. Returns `true` when their time has run out.
    pub fn charge(&mut self, player: PlayerId, elapsed_ms: i64) -> bool {
        let left = self.remaining.entry(player).or_insert(0);
        *left = (*left - elapsed_ms).max(0);
        *left == 0
    }

    pub fn stamp(&self, mut state: MatchState) -> MatchState {
        state.timers = self.remaining.clone();
        state
    }
}

//! Branch-on-edit timeline of match snapshots with replay navigation.

use serde::{Deserialize, Serialize};

use crate::repetition::{RepetitionTable, REPETITION_LIMIT};
use crate::state::{EndReason, MatchState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Start,
    Prev,
    Next,
    End,
}

impl Direction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "start" => Some(Direction::Start),
            "prev" => Some(Direction::Prev),
            "next" => Some(Direction::Next),
            "end" => Some(Direction::End),
            _ => None,
        }
    }
}

/// Snapshots in commit order plus the index currently on display.
///
/// Never empty: it is created with the initial snapshot. The repetition table always counts
/// exactly the retained snapshots.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    snapshots: Vec<MatchState>,
    viewing: usize,
    repetitions: RepetitionTable,
}

impl HistoryLog {
    pub fn new(initial: MatchState) -> Self {
        let mut repetitions = RepetitionTable::new();
        repetitions.record(&initial);
        Self {
            snapshots: vec![initial],
            viewing: 0,
            repetitions,
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn live_index(&self) -> usize {
        self.snapshots.len() - 1
    }

    pub fn viewing_index(&self) -> usize {
        self.viewing
    }

    pub fn is_viewing_past(&self) -> bool {
        self.viewing < self.live_index()
    }

    pub fn live(&self) -> &MatchState {
        &self.snapshots[self.live_index()]
    }

    pub fn viewed(&self) -> &MatchState {
        &self.snapshots[self.viewing]
    }

    pub fn get(&self, index: usize) -> Option<&MatchState> {
        self.snapshots.get(index)
    }

    pub fn snapshots(&self) -> &[MatchState] {
        &self.snapshots
    }

    pub fn repetitions(&self) -> &RepetitionTable {
        &self.repetitions
    }

    /// Move the view; clamped at both ends. Returns whether the view changed.
    pub fn navigate(&mut self, direction: Direction) -> bool {
        let target = match direction {
            Direction::Start => 0,
            Direction::Prev => self.viewing.saturating_sub(1),
            Direction::Next => (self.viewing + 1).min(self.live_index()),
            Direction::End => self.live_index(),
        };
        let changed = target != self.viewing;
        self.viewing = target;
        changed
    }

    /// Append `state` as the new live snapshot.
    ///
    /// When the view is in the past, everything after it is discarded first and repetition
    /// counts are rebuilt from what remains. An active position seen for the third time is
    /// converted into a draw before it is stored. Returns the stored snapshot.
    pub fn commit(&mut self, state: MatchState) -> &MatchState {
        if self.is_viewing_past() {
            self.snapshots.truncate(self.viewing + 1);
            self.repetitions = RepetitionTable::rebuild(&self.snapshots);
        }

        let seen = self.repetitions.record(&state);
        let state = if state.is_active() && seen >= REPETITION_LIMIT {
            tracing::info!(occurrences = seen, "position repeated, declaring a draw");
            state.end_in_draw(EndReason::DrawByRepetition)
        } else {
            state
        };

        self.snapshots.push(state);
        self.viewing = self.live_index();
        self.live()
    }

    /// The viewed snapshot followed by up to `ahead` later ones.
    pub fn onion_skin(&self, ahead: usize) -> &[MatchState] {
        let end = (self.viewing + 1 + ahead).min(self.snapshots.len());
        &self.snapshots[self.viewing..end]
    }
}

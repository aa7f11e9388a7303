//! Player ids, goal edges and the standard seat layouts for two and four players.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::board::Cell;

/// Seat identifier. Ordering follows the id string (`p1 < p2 < p3 < p4`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerId {
    P1,
    P2,
    P3,
    P4,
}

impl PlayerId {
    pub const ALL: [PlayerId; 4] = [PlayerId::P1, PlayerId::P2, PlayerId::P3, PlayerId::P4];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerId::P1 => "p1",
            PlayerId::P2 => "p2",
            PlayerId::P3 => "p3",
            PlayerId::P4 => "p4",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == value)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Board edge a pawn must reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalEdge {
    /// Row 0.
    North,
    /// Last column.
    East,
    /// Last row.
    South,
    /// Column 0.
    West,
}

impl GoalEdge {
    #[inline]
    pub fn reached(&self, cell: Cell, board_size: u8) -> bool {
        let last = i32::from(board_size) - 1;
        match self {
            GoalEdge::North => cell.row == 0,
            GoalEdge::East => cell.col == last,
            GoalEdge::South => cell.row == last,
            GoalEdge::West => cell.col == 0,
        }
    }
}

/// Per-match seat definition. Immutable for the match's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub start: Cell,
    pub goal: GoalEdge,
    pub wall_budget: u8,
}

impl Player {
    #[inline]
    pub fn goal_reached(&self, cell: Cell, board_size: u8) -> bool {
        self.goal.reached(cell, board_size)
    }

    /// The standard seat for `id` on a board of `board_size`: each pawn starts centred on one
    /// edge and races to the opposite one.
    pub fn standard(id: PlayerId, board_size: u8, wall_budget: u8) -> Self {
        let last = i32::from(board_size) - 1;
        let mid = i32::from(board_size) / 2;
        let (start, goal) = match id {
            PlayerId::P1 => (Cell::new(last, mid), GoalEdge::North),
            PlayerId::P2 => (Cell::new(mid, last), GoalEdge::West),
            PlayerId::P3 => (Cell::new(0, mid), GoalEdge::South),
            PlayerId::P4 => (Cell::new(mid, 0), GoalEdge::East),
        };
        Self {
            id,
            start,
            goal,
            wall_budget,
        }
    }
}

/// Seats used for a given player count: p1 against p3 head-to-head, everyone in a four-way game.
pub fn seats_for(num_players: u8) -> Option<&'static [PlayerId]> {
    match num_players {
        2 => Some(&[PlayerId::P1, PlayerId::P3]),
        4 => Some(&PlayerId::ALL),
        _ => None,
    }
}

pub(crate) fn find(players: &[Player], id: PlayerId) -> Option<&Player> {
    players.iter().find(|player| player.id == id)
}

//! Per-match state machine.
//!
//! [`MatchState`] is a value: every transition returns a fresh snapshot and leaves its input
//! untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::board::{Cell, Wall};
use crate::config::GameConfig;
use crate::error::MoveRejection;
use crate::player::{self, Player, PlayerId};
use crate::rules::{calculate_legal_pawn_moves, is_wall_placement_legal, PawnMoves};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Ended,
}

/// Why a match ended. Attached to every `Ended` snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    Goal,
    Timeout,
    Resignation,
    Disconnection,
    IllegalMove,
    LastPlayerStanding,
    DrawByRepetition,
    DrawByAgreement,
    /// Operator-forced end, e.g. an abandoned all-automated match.
    Terminated,
}

impl EndReason {
    pub fn is_draw(&self) -> bool {
        matches!(self, EndReason::DrawByRepetition | EndReason::DrawByAgreement)
    }
}

/// Why a single player left the rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LossReason {
    Timeout,
    Resignation,
    Disconnection,
    IllegalMove,
}

impl From<LossReason> for EndReason {
    fn from(reason: LossReason) -> Self {
        match reason {
            LossReason::Timeout => EndReason::Timeout,
            LossReason::Resignation => EndReason::Resignation,
            LossReason::Disconnection => EndReason::Disconnection,
            LossReason::IllegalMove => EndReason::IllegalMove,
        }
    }
}

/// A move as submitted by a player. On the wire: `{ "type": "cell" | "wall" | "resign", "data" }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Move {
    #[serde(rename = "cell", alias = "pawn")]
    Pawn(Cell),
    #[serde(rename = "wall")]
    Wall(Wall),
    #[serde(rename = "resign")]
    Resign,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchState {
    pub board_size: u8,
    pub status: Status,
    pub winner: Option<PlayerId>,
    pub reason: Option<EndReason>,
    pub pawn_positions: BTreeMap<PlayerId, Cell>,
    pub walls_left: BTreeMap<PlayerId, u8>,
    pub placed_walls: Vec<Wall>,
    /// Turn rotation. Eliminated players are removed, never re-inserted.
    pub active_players: Vec<PlayerId>,
    /// Index into `active_players`; meaningful only while `Active`.
    pub turn_index: usize,
    /// Remaining clock per player in milliseconds, as of this snapshot.
    pub timers: BTreeMap<PlayerId, i64>,
    /// Cached destinations for the player to move.
    pub legal_pawn_moves: PawnMoves,
}

impl MatchState {
    /// Turn 0, full budgets and clocks, pawns on their start cells.
    pub fn initial(config: &GameConfig) -> Self {
        let players = &config.players;
        let mut state = Self {
            board_size: config.board_size,
            status: Status::Active,
            winner: None,
            reason: None,
            pawn_positions: players.iter().map(|p| (p.id, p.start)).collect(),
            walls_left: players.iter().map(|p| (p.id, p.wall_budget)).collect(),
            placed_walls: Vec::new(),
            active_players: players.iter().map(|p| p.id).collect(),
            turn_index: 0,
            timers: players
                .iter()
                .map(|p| (p.id, config.time_per_player as i64))
                .collect(),
            legal_pawn_moves: PawnMoves::new(),
        };
        state.refresh_legal_moves(players);
        state
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    /// The player holding the turn, `None` once the match has ended.
    pub fn player_turn(&self) -> Option<PlayerId> {
        if !self.is_active() {
            return None;
        }
        self.active_players.get(self.turn_index).copied()
    }

    pub fn is_pawn_move_legal(&self, cell: Cell) -> bool {
        self.legal_pawn_moves.contains(&cell)
    }

    /// Validate and apply `mv` for the player to move.
    pub fn apply_move(&self, mv: &Move, players: &[Player]) -> Result<MatchState, MoveRejection> {
        let Some(mover) = self.player_turn() else {
            return Err(MoveRejection::MatchOver);
        };
        match *mv {
            Move::Pawn(cell) => {
                if !self.is_pawn_move_legal(cell) {
                    return Err(MoveRejection::IllegalPawnMove);
                }
                let mut next = self.clone();
                next.pawn_positions.insert(mover, cell);
                let reached = player::find(players, mover)
                    .is_some_and(|p| p.goal_reached(cell, self.board_size));
                if reached {
                    next.finish(Some(mover), EndReason::Goal);
                } else {
                    next.advance_turn(players);
                }
                Ok(next)
            }
            Move::Wall(wall) => {
                if !is_wall_placement_legal(&wall, self, players) {
                    return Err(MoveRejection::IllegalWall);
                }
                let mut next = self.clone();
                next.placed_walls.push(wall);
                if let Some(left) = next.walls_left.get_mut(&mover) {
                    *left = left.saturating_sub(1);
                }
                next.advance_turn(players);
                Ok(next)
            }
            Move::Resign => Ok(self.apply_player_loss(players, mover, LossReason::Resignation)),
        }
    }

    /// Remove `loser` from the rotation.
    ///
    /// A lone survivor wins with [`EndReason::LastPlayerStanding`]. Losing a player who is no
    /// longer active, or losing anyone after the end, returns an unchanged copy.
    pub fn apply_player_loss(
        &self,
        players: &[Player],
        loser: PlayerId,
        reason: LossReason,
    ) -> MatchState {
        let mut next = self.clone();
        if !self.is_active() {
            return next;
        }
        let Some(removed_at) = self.active_players.iter().position(|&id| id == loser) else {
            return next;
        };
        let mover = self.player_turn();

        next.active_players.remove(removed_at);
        next.pawn_positions.insert(loser, Cell::OFF_BOARD);

        match next.active_players.len() {
            0 => next.finish(None, reason.into()),
            1 => {
                let survivor = next.active_players[0];
                next.turn_index = 0;
                next.finish(Some(survivor), EndReason::LastPlayerStanding);
            }
            len => {
                next.turn_index = if mover == Some(loser) {
                    // The list shifted left, so the same index now names the next player.
                    self.turn_index % len
                } else {
                    mover
                        .and_then(|id| next.active_players.iter().position(|&p| p == id))
                        .unwrap_or(0)
                };
                next.refresh_legal_moves(players);
            }
        }
        next
    }

    /// End without a winner (agreement or repetition).
    pub fn end_in_draw(&self, reason: EndReason) -> MatchState {
        let mut next = self.clone();
        if next.is_active() {
            next.finish(None, reason);
        }
        next
    }

    /// Operator-forced end.
    pub fn terminate(&self) -> MatchState {
        let mut next = self.clone();
        if next.is_active() {
            next.finish(None, EndReason::Terminated);
        }
        next
    }

    fn finish(&mut self, winner: Option<PlayerId>, reason: EndReason) {
        self.status = Status::Ended;
        self.winner = winner;
        self.reason = Some(reason);
        self.legal_pawn_moves.clear();
    }

    fn advance_turn(&mut self, players: &[Player]) {
        if self.active_players.is_empty() {
            return;
        }
        self.turn_index = (self.turn_index + 1) % self.active_players.len();
        self.refresh_legal_moves(players);
    }

    pub(crate) fn refresh_legal_moves(&mut self, players: &[Player]) {
        self.legal_pawn_moves = if self.is_active() {
            calculate_legal_pawn_moves(
                &self.pawn_positions,
                &self.placed_walls,
                players,
                &self.active_players,
                self.turn_index,
                self.board_size,
            )
        } else {
            PawnMoves::new()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::all_players_have_paths;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn setup(num_players: u8) -> (MatchState, Vec<Player>) {
        let config = GameConfig::standard(num_players).expect("valid config");
        (MatchState::initial(&config), config.players)
    }

    #[test]
    fn pawn_move_advances_turn() {
        let (state, players) = setup(2);
        let next = state
            .apply_move(&Move::Pawn(Cell::new(7, 4)), &players)
            .expect("legal step");
        assert_eq!(next.pawn_positions[&PlayerId::P1], Cell::new(7, 4));
        assert_eq!(next.player_turn(), Some(PlayerId::P3));
        assert!(next.legal_pawn_moves.contains(&Cell::new(1, 4)));
        // Input snapshot is untouched.
        assert_eq!(state.player_turn(), Some(PlayerId::P1));
    }

    #[test]
    fn reaching_goal_wins() {
        let (mut state, players) = setup(2);
        state.pawn_positions.insert(PlayerId::P1, Cell::new(1, 0));
        state.refresh_legal_moves(&players);
        let next = state
            .apply_move(&Move::Pawn(Cell::new(0, 0)), &players)
            .expect("legal step");
        assert_eq!(next.status, Status::Ended);
        assert_eq!(next.winner, Some(PlayerId::P1));
        assert_eq!(next.reason, Some(EndReason::Goal));
        assert_eq!(next.player_turn(), None);
        assert!(next.legal_pawn_moves.is_empty());
    }

    #[test]
    fn rejection_is_idempotent() {
        let (state, players) = setup(2);
        let illegal = Move::Pawn(Cell::new(5, 5));
        let first = state.apply_move(&illegal, &players);
        let second = state.apply_move(&illegal, &players);
        assert_eq!(first, Err(MoveRejection::IllegalPawnMove));
        assert_eq!(first, second);

        let bad_wall = Move::Wall(Wall::vertical(8, 8));
        assert_eq!(
            state.apply_move(&bad_wall, &players),
            Err(MoveRejection::IllegalWall)
        );
        assert_eq!(state, setup(2).0);
    }

    #[test]
    fn wall_placement_spends_budget() {
        let (state, players) = setup(2);
        let next = state
            .apply_move(&Move::Wall(Wall::horizontal(3, 3)), &players)
            .expect("legal wall");
        assert_eq!(next.walls_left[&PlayerId::P1], 9);
        assert_eq!(next.walls_left[&PlayerId::P3], 10);
        assert_eq!(next.placed_walls, vec![Wall::horizontal(3, 3)]);
        assert_eq!(next.player_turn(), Some(PlayerId::P3));
    }

    #[test]
    fn resign_ends_a_duel() {
        let (state, players) = setup(2);
        let next = state.apply_move(&Move::Resign, &players).expect("always legal");
        assert_eq!(next.winner, Some(PlayerId::P3));
        assert_eq!(next.reason, Some(EndReason::LastPlayerStanding));
        assert_eq!(next.pawn_positions[&PlayerId::P1], Cell::OFF_BOARD);
        assert_eq!(
            next.apply_move(&Move::Resign, &players),
            Err(MoveRejection::MatchOver)
        );
    }

    #[test]
    fn elimination_keeps_the_mover() {
        let (mut state, players) = setup(4);
        state.turn_index = 2;
        state.refresh_legal_moves(&players);
        assert_eq!(state.player_turn(), Some(PlayerId::P3));

        let next = state.apply_player_loss(&players, PlayerId::P1, LossReason::Disconnection);
        assert_eq!(
            next.active_players,
            vec![PlayerId::P2, PlayerId::P3, PlayerId::P4]
        );
        assert_eq!(next.player_turn(), Some(PlayerId::P3));
        assert_eq!(next.pawn_positions[&PlayerId::P1], Cell::OFF_BOARD);
        assert!(next.is_active());
    }

    #[test]
    fn eliminating_the_mover_passes_the_turn() {
        let (mut state, players) = setup(4);
        state.turn_index = 3;
        let next = state.apply_player_loss(&players, PlayerId::P4, LossReason::Timeout);
        assert_eq!(next.player_turn(), Some(PlayerId::P1));

        state.turn_index = 1;
        let next = state.apply_player_loss(&players, PlayerId::P2, LossReason::Timeout);
        assert_eq!(next.player_turn(), Some(PlayerId::P3));
        assert_eq!(
            next.legal_pawn_moves,
            calculate_legal_pawn_moves(
                &next.pawn_positions,
                &next.placed_walls,
                &players,
                &next.active_players,
                next.turn_index,
                next.board_size,
            )
        );
    }

    #[test]
    fn last_player_standing_overrides_the_loss_reason() {
        let (state, players) = setup(4);
        let state = state.apply_player_loss(&players, PlayerId::P2, LossReason::Resignation);
        let state = state.apply_player_loss(&players, PlayerId::P3, LossReason::Timeout);
        let state = state.apply_player_loss(&players, PlayerId::P1, LossReason::Disconnection);
        assert_eq!(state.status, Status::Ended);
        assert_eq!(state.winner, Some(PlayerId::P4));
        assert_eq!(state.reason, Some(EndReason::LastPlayerStanding));

        let again = state.apply_player_loss(&players, PlayerId::P4, LossReason::Timeout);
        assert_eq!(again, state);
    }

    #[test]
    fn losing_an_inactive_player_is_a_no_op() {
        let (state, players) = setup(4);
        let once = state.apply_player_loss(&players, PlayerId::P2, LossReason::Timeout);
        let twice = once.apply_player_loss(&players, PlayerId::P2, LossReason::Timeout);
        assert_eq!(once, twice);
    }

    #[test]
    fn random_walls_conserve_budget_and_paths() {
        let (mut state, players) = setup(4);
        let mut rng = SmallRng::seed_from_u64(0x9e37_79b9);
        let mut placed: BTreeMap<PlayerId, u8> = BTreeMap::new();

        for _ in 0..400 {
            if !state.is_active() {
                break;
            }
            let Some(mover) = state.player_turn() else {
                break;
            };
            let orientation = if rng.gen_bool(0.5) {
                crate::board::Orientation::Horizontal
            } else {
                crate::board::Orientation::Vertical
            };
            let wall = Wall::new(rng.gen_range(-1..9), rng.gen_range(-1..9), orientation);
            match state.apply_move(&Move::Wall(wall), &players) {
                Ok(next) => {
                    // Soundness: an accepted wall never cuts anyone off.
                    assert!(all_players_have_paths(&next, &players, &next.placed_walls));
                    *placed.entry(mover).or_default() += 1;
                    state = next;
                }
                Err(_) => {
                    let budget_ok = state.walls_left[&mover] > 0;
                    let geometry_ok = wall.anchor_in_bounds(state.board_size)
                        && !state.placed_walls.iter().any(|w| w.overlaps(&wall));
                    if budget_ok && geometry_ok {
                        // Completeness: the only remaining reason is a cut-off player.
                        let mut walls = state.placed_walls.clone();
                        walls.push(wall);
                        assert!(!all_players_have_paths(&state, &players, &walls));
                    }
                    // Pass the turn with any pawn step to keep the rotation moving.
                    if let Some(&step) = state.legal_pawn_moves.first() {
                        if let Ok(next) = state.apply_move(&Move::Pawn(step), &players) {
                            state = next;
                        }
                    }
                }
            }
            for player in &players {
                let spent = placed.get(&player.id).copied().unwrap_or(0);
                assert_eq!(state.walls_left[&player.id], player.wall_budget - spent);
            }
        }
        assert!(placed.values().sum::<u8>() > 0);
    }
}

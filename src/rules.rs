//! Move legality: pawn destinations and wall placement validation.
//!
//! Both entry points are total. Inputs that make no sense (unknown mover, off-board pawn) yield
//! an empty move list or `false` rather than a panic.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::board::{path_exists, wall_between, Cell, Wall, STEPS};
use crate::player::{self, Player, PlayerId};
use crate::state::MatchState;

/// Destinations for one pawn. Never more than four steps plus one extra side-step per blocked
/// jump, so it stays inline.
pub type PawnMoves = SmallVec<[Cell; 8]>;

/// Legal destinations for the pawn of `active[turn_index]`.
pub fn calculate_legal_pawn_moves(
    positions: &BTreeMap<PlayerId, Cell>,
    walls: &[Wall],
    players: &[Player],
    active: &[PlayerId],
    turn_index: usize,
    board_size: u8,
) -> PawnMoves {
    let mut moves = PawnMoves::new();
    let Some(&mover) = active.get(turn_index) else {
        return moves;
    };
    if player::find(players, mover).is_none() {
        return moves;
    }
    let Some(&origin) = positions.get(&mover) else {
        return moves;
    };
    if !origin.in_bounds(board_size) {
        return moves;
    }

    let opponents: SmallVec<[Cell; 4]> = active
        .iter()
        .filter(|&&id| id != mover)
        .filter_map(|id| positions.get(id).copied())
        .filter(|cell| !cell.is_off_board())
        .collect();
    let occupied = |cell: Cell| opponents.contains(&cell);

    for (d_row, d_col) in STEPS {
        let step = origin.offset(d_row, d_col);
        if !step.in_bounds(board_size) || wall_between(walls, origin, step) {
            continue;
        }
        if !occupied(step) {
            moves.push(step);
            continue;
        }

        let jump = step.offset(d_row, d_col);
        if jump.in_bounds(board_size) && !wall_between(walls, step, jump) {
            moves.push(jump);
            continue;
        }

        // Straight jump blocked: side-step around the occupied cell, perpendicular to the approach.
        let sides = if d_row == 0 {
            [step.offset(-1, 0), step.offset(1, 0)]
        } else {
            [step.offset(0, -1), step.offset(0, 1)]
        };
        for side in sides {
            if !wall_between(walls, step, side) {
                moves.push(side);
            }
        }
    }

    let mut legal = PawnMoves::new();
    for cell in moves {
        if cell.in_bounds(board_size) && !occupied(cell) && !legal.contains(&cell) {
            legal.push(cell);
        }
    }
    legal
}

/// Whether the player to move may place `wall` on the board described by `state`.
///
/// Checks budget, slot bounds and overlap first; only then runs a path search for every active
/// player against the hypothetical wall set. Nothing is committed.
pub fn is_wall_placement_legal(wall: &Wall, state: &MatchState, players: &[Player]) -> bool {
    let Some(mover) = state.player_turn() else {
        return false;
    };
    if state.walls_left.get(&mover).copied().unwrap_or(0) == 0 {
        return false;
    }
    if !wall.anchor_in_bounds(state.board_size) {
        return false;
    }
    if state.placed_walls.iter().any(|placed| placed.overlaps(wall)) {
        return false;
    }

    let mut walls = Vec::with_capacity(state.placed_walls.len() + 1);
    walls.extend_from_slice(&state.placed_walls);
    walls.push(*wall);

    all_players_have_paths(state, players, &walls)
}

/// Path check shared by placement validation and the invariant tests.
pub(crate) fn all_players_have_paths(
    state: &MatchState,
    players: &[Player],
    walls: &[Wall],
) -> bool {
    state.active_players.iter().all(|id| {
        let Some(player) = player::find(players, *id) else {
            return true;
        };
        let start = state
            .pawn_positions
            .get(id)
            .copied()
            .unwrap_or(Cell::OFF_BOARD);
        path_exists(
            start,
            |cell| player.goal_reached(cell, state.board_size),
            walls,
            state.board_size,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::state::MatchState;

    fn duel() -> (MatchState, Vec<Player>) {
        let config = GameConfig::standard(2).expect("valid config");
        (MatchState::initial(&config), config.players)
    }

    fn moves_for(
        state: &MatchState,
        players: &[Player],
        walls: &[Wall],
    ) -> PawnMoves {
        calculate_legal_pawn_moves(
            &state.pawn_positions,
            walls,
            players,
            &state.active_players,
            state.turn_index,
            state.board_size,
        )
    }

    #[test]
    fn opening_moves_for_p1() {
        let (state, players) = duel();
        let moves = moves_for(&state, &players, &[]);
        assert_eq!(
            moves.as_slice(),
            &[Cell::new(7, 4), Cell::new(8, 3), Cell::new(8, 5)]
        );
        assert_eq!(state.legal_pawn_moves, moves);
    }

    #[test]
    fn straight_jump_then_diagonal_when_blocked() {
        let (mut state, players) = duel();
        state.pawn_positions.insert(PlayerId::P1, Cell::new(4, 4));
        state.pawn_positions.insert(PlayerId::P3, Cell::new(3, 4));

        let open = moves_for(&state, &players, &[]);
        assert!(open.contains(&Cell::new(2, 4)));
        assert!(!open.contains(&Cell::new(3, 3)));
        assert!(!open.contains(&Cell::new(3, 5)));
        assert!(!open.contains(&Cell::new(3, 4)));

        for wall in [Wall::horizontal(2, 3), Wall::horizontal(2, 4)] {
            let blocked = moves_for(&state, &players, &[wall]);
            assert!(blocked.contains(&Cell::new(3, 3)), "{wall}");
            assert!(blocked.contains(&Cell::new(3, 5)), "{wall}");
            assert!(!blocked.contains(&Cell::new(2, 4)), "{wall}");
        }
    }

    #[test]
    fn jump_off_the_board_becomes_side_steps() {
        let (mut state, players) = duel();
        state.pawn_positions.insert(PlayerId::P1, Cell::new(1, 0));
        state.pawn_positions.insert(PlayerId::P3, Cell::new(0, 0));
        let moves = moves_for(&state, &players, &[]);
        // (0,-1) is off-board and filtered; (0,1) is the only side-step.
        assert!(moves.contains(&Cell::new(0, 1)));
        assert!(!moves.iter().any(|cell| !cell.in_bounds(9)));
    }

    #[test]
    fn side_step_blocked_by_wall() {
        let (mut state, players) = duel();
        state.pawn_positions.insert(PlayerId::P1, Cell::new(4, 4));
        state.pawn_positions.insert(PlayerId::P3, Cell::new(3, 4));
        let walls = [Wall::horizontal(2, 4), Wall::vertical(3, 4)];
        let moves = moves_for(&state, &players, &walls);
        assert!(moves.contains(&Cell::new(3, 3)));
        assert!(!moves.contains(&Cell::new(3, 5)));
    }

    #[test]
    fn walls_block_plain_steps() {
        let (state, players) = duel();
        let moves = moves_for(&state, &players, &[Wall::horizontal(7, 3)]);
        assert!(!moves.contains(&Cell::new(7, 4)));
    }

    #[test]
    fn wall_bounds_and_overlap() {
        let (mut state, players) = duel();
        assert!(is_wall_placement_legal(&Wall::horizontal(0, 0), &state, &players));
        assert!(!is_wall_placement_legal(&Wall::horizontal(8, 0), &state, &players));
        assert!(!is_wall_placement_legal(&Wall::vertical(-1, 3), &state, &players));

        state.placed_walls.push(Wall::horizontal(4, 4));
        assert!(!is_wall_placement_legal(&Wall::horizontal(4, 4), &state, &players));
        assert!(!is_wall_placement_legal(&Wall::vertical(4, 4), &state, &players));
        assert!(!is_wall_placement_legal(&Wall::horizontal(4, 5), &state, &players));
        assert!(!is_wall_placement_legal(&Wall::horizontal(4, 3), &state, &players));
        assert!(is_wall_placement_legal(&Wall::horizontal(4, 6), &state, &players));
        assert!(is_wall_placement_legal(&Wall::vertical(4, 5), &state, &players));
    }

    #[test]
    fn wall_needs_budget() {
        let (mut state, players) = duel();
        state.walls_left.insert(PlayerId::P1, 0);
        assert!(!is_wall_placement_legal(&Wall::horizontal(0, 0), &state, &players));
    }

    #[test]
    fn wall_may_not_seal_a_player() {
        let (mut state, players) = duel();
        // Fence p3's column (0,4)-(1,4) on both sides.
        state.placed_walls = vec![Wall::vertical(0, 3), Wall::vertical(0, 4)];
        assert!(all_players_have_paths(&state, &players, &state.placed_walls));

        assert!(!is_wall_placement_legal(&Wall::horizontal(1, 3), &state, &players));
        assert!(!is_wall_placement_legal(&Wall::horizontal(1, 4), &state, &players));
        assert!(is_wall_placement_legal(&Wall::horizontal(2, 3), &state, &players));
        // Rejection never leaks the candidate into the board.
        assert_eq!(state.placed_walls.len(), 2);
    }

    #[test]
    fn ended_match_accepts_no_walls() {
        let (state, players) = duel();
        let ended = state.terminate();
        assert!(!is_wall_placement_legal(&Wall::horizontal(0, 0), &ended, &players));
    }
}

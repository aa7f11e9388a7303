//! Board geometry: cells, walls, wall overlap and blocking, and goal reachability.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Board edge length used by every standard match.
pub const DEFAULT_BOARD_SIZE: u8 = 9;

/// Orthogonal step order used by move generation and path search: up, down, left, right.
pub(crate) const STEPS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// A square on the board. Eliminated pawns are parked on [`Cell::OFF_BOARD`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: i32,
    pub col: i32,
}

impl Cell {
    pub const OFF_BOARD: Cell = Cell { row: -1, col: -1 };

    #[inline]
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    #[inline]
    pub fn is_off_board(&self) -> bool {
        *self == Self::OFF_BOARD
    }

    #[inline]
    pub fn in_bounds(&self, board_size: u8) -> bool {
        let n = i32::from(board_size);
        (0..n).contains(&self.row) && (0..n).contains(&self.col)
    }

    #[inline]
    pub(crate) fn offset(&self, d_row: i32, d_col: i32) -> Cell {
        Cell::new(self.row + d_row, self.col + d_col)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "horizontal" | "h" => Some(Orientation::Horizontal),
            "vertical" | "v" => Some(Orientation::Vertical),
            _ => None,
        }
    }
}

/// A wall anchored on the `(N-1)×(N-1)` slot grid.
///
/// A horizontal wall at `(r, c)` lies between rows `r` and `r + 1` and spans columns `c` and
/// `c + 1`. A vertical wall at `(r, c)` lies between columns `c` and `c + 1` and spans rows `r`
/// and `r + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Wall {
    pub row: i32,
    pub col: i32,
    pub orientation: Orientation,
}

impl Wall {
    pub const fn new(row: i32, col: i32, orientation: Orientation) -> Self {
        Self {
            row,
            col,
            orientation,
        }
    }

    pub const fn horizontal(row: i32, col: i32) -> Self {
        Self::new(row, col, Orientation::Horizontal)
    }

    pub const fn vertical(row: i32, col: i32) -> Self {
        Self::new(row, col, Orientation::Vertical)
    }

    /// Whether the anchor lies on the slot grid `[0, N-2]²`.
    pub fn anchor_in_bounds(&self, board_size: u8) -> bool {
        let max = i32::from(board_size) - 2;
        (0..=max).contains(&self.row) && (0..=max).contains(&self.col)
    }

    /// Whether `self` and `other` would occupy a common wall slot: same anchor (which also
    /// covers crossing walls) or collinear overlap along the shared axis.
    pub fn overlaps(&self, other: &Wall) -> bool {
        if self.row == other.row && self.col == other.col {
            return true;
        }
        match (self.orientation, other.orientation) {
            (Orientation::Horizontal, Orientation::Horizontal) => {
                self.row == other.row && (self.col - other.col).abs() < 2
            }
            (Orientation::Vertical, Orientation::Vertical) => {
                self.col == other.col && (self.row - other.row).abs() < 2
            }
            _ => false,
        }
    }

    /// Whether this wall blocks the unit edge between two orthogonally adjacent cells.
    pub fn blocks(&self, from: Cell, to: Cell) -> bool {
        if from.col == to.col {
            let edge_row = from.row.min(to.row);
            self.orientation == Orientation::Horizontal
                && self.row == edge_row
                && (self.col == from.col || self.col == from.col - 1)
        } else if from.row == to.row {
            let edge_col = from.col.min(to.col);
            self.orientation == Orientation::Vertical
                && self.col == edge_col
                && (self.row == from.row || self.row == from.row - 1)
        } else {
            false
        }
    }
}

impl fmt::Display for Wall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.orientation {
            Orientation::Horizontal => 'h',
            Orientation::Vertical => 'v',
        };
        write!(f, "{},{},{}", self.row, self.col, tag)
    }
}

/// True when any placed wall blocks the edge between `from` and `to`.
#[inline]
pub fn wall_between<'a, I>(walls: I, from: Cell, to: Cell) -> bool
where
    I: IntoIterator<Item = &'a Wall>,
{
    walls.into_iter().any(|wall| wall.blocks(from, to))
}

/// Breadth-first search from `start` over open edges until `is_goal` accepts a cell.
///
/// Off-board pawns have nothing left to reach and always report a path.
pub fn path_exists<F>(start: Cell, is_goal: F, walls: &[Wall], board_size: u8) -> bool
where
    F: Fn(Cell) -> bool,
{
    if start.is_off_board() {
        return true;
    }
    if !start.in_bounds(board_size) {
        return false;
    }
    let n = usize::from(board_size);
    let index = |cell: Cell| cell.row as usize * n + cell.col as usize;

    let mut visited = vec![false; n * n];
    let mut queue = VecDeque::with_capacity(n * n);
    visited[index(start)] = true;
    queue.push_back(start);

    while let Some(cell) = queue.pop_front() {
        if is_goal(cell) {
            return true;
        }
        for (d_row, d_col) in STEPS {
            let next = cell.offset(d_row, d_col);
            if !next.in_bounds(board_size) || visited[index(next)] {
                continue;
            }
            if wall_between(walls, cell, next) {
                continue;
            }
            visited[index(next)] = true;
            queue.push_back(next);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_wall_blocks_two_vertical_edges() {
        let wall = Wall::horizontal(2, 3);
        assert!(wall.blocks(Cell::new(2, 3), Cell::new(3, 3)));
        assert!(wall.blocks(Cell::new(3, 4), Cell::new(2, 4)));
        assert!(!wall.blocks(Cell::new(2, 5), Cell::new(3, 5)));
        assert!(!wall.blocks(Cell::new(2, 3), Cell::new(2, 4)));
    }

    #[test]
    fn vertical_wall_blocks_two_horizontal_edges() {
        let wall = Wall::vertical(4, 0);
        assert!(wall.blocks(Cell::new(4, 0), Cell::new(4, 1)));
        assert!(wall.blocks(Cell::new(5, 1), Cell::new(5, 0)));
        assert!(!wall.blocks(Cell::new(6, 0), Cell::new(6, 1)));
    }

    #[test]
    fn overlap_rules() {
        let base = Wall::horizontal(3, 3);
        assert!(base.overlaps(&Wall::vertical(3, 3)));
        assert!(base.overlaps(&Wall::horizontal(3, 4)));
        assert!(!base.overlaps(&Wall::horizontal(3, 5)));
        assert!(!base.overlaps(&Wall::vertical(3, 4)));
        assert!(Wall::vertical(2, 6).overlaps(&Wall::vertical(3, 6)));
    }

    #[test]
    fn path_search_respects_a_sealed_row() {
        // Seal the edge between rows 0 and 1 on a 5x5 board.
        let walls = [Wall::horizontal(0, 0), Wall::horizontal(0, 2)];
        let goal_top = |cell: Cell| cell.row == 0;
        assert!(path_exists(Cell::new(4, 2), goal_top, &walls, 5));

        let sealed = [
            Wall::horizontal(0, 0),
            Wall::horizontal(0, 2),
            Wall::vertical(0, 3),
            Wall::horizontal(1, 3),
        ];
        assert!(!path_exists(Cell::new(4, 2), goal_top, &sealed, 5));
        assert!(path_exists(Cell::OFF_BOARD, goal_top, &sealed, 5));
    }
}

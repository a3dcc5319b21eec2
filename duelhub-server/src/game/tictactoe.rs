//! Tic-Tac-Toe Board
//!
//! Nine-cell board plus the two pure rules the session needs:
//! three-in-a-row detection and full-board detection.

use serde::{Deserialize, Serialize};

/// Number of cells on the board.
pub const BOARD_CELLS: usize = 9;

/// Winning lines in check order: rows, columns, diagonals.
pub const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// A player's symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    /// First mover.
    X,
    /// Second mover.
    O,
}

/// Contents of one board cell. Serialized as `""`, `"X"` or `"O"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    /// Nobody has played here.
    #[default]
    #[serde(rename = "")]
    Empty,
    /// Marked by X.
    X,
    /// Marked by O.
    O,
}

impl Cell {
    /// The mark occupying this cell, if any.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Cell::Empty => None,
            Cell::X => Some(Mark::X),
            Cell::O => Some(Mark::O),
        }
    }

    /// Whether the cell is still free.
    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }
}

impl From<Mark> for Cell {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Cell::X,
            Mark::O => Cell::O,
        }
    }
}

/// Row-major 3×3 board, index 0 top-left, 8 bottom-right.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board([Cell; BOARD_CELLS]);

impl Board {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cell at `position`, or `None` if off the board.
    pub fn get(&self, position: usize) -> Option<Cell> {
        self.0.get(position).copied()
    }

    /// Put `mark` at `position`. Callers validate range and emptiness.
    pub fn set(&mut self, position: usize, mark: Mark) {
        self.0[position] = mark.into();
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> &[Cell; BOARD_CELLS] {
        &self.0
    }
}

/// Return the mark holding any complete line, checking lines in [`LINES`] order.
pub fn check_winner(board: &Board) -> Option<Mark> {
    let cells = board.cells();
    LINES.iter().find_map(|&[a, b, c]| {
        let mark = cells[a].mark()?;
        (cells[a] == cells[b] && cells[b] == cells[c]).then_some(mark)
    })
}

/// True iff no cell is empty.
pub fn is_full(board: &Board) -> bool {
    board.cells().iter().all(|cell| !cell.is_empty())
}

//! Game Logic Module
//!
//! Board rules and the session state machine. Nothing here touches the
//! network; every function is synchronous and side-effect free apart from
//! mutating the value it is called on.
//!
//! ## Module Structure
//!
//! - `tictactoe`: 3×3 board, win and draw detection
//! - `battleship`: 10×10 grids, fleet validation, strikes
//! - `state`: Session envelope and its transitions

pub mod battleship;
pub mod state;
pub mod tictactoe;

// Re-export key types
pub use battleship::{AttackOutcome, Orientation, PlacementError, Ship};
pub use state::{
    GameBoard, GameKind, GameSession, JoinOutcome, Player, PlayerId, RestartProgress, Seat,
    SessionError, SessionStatus, Winner,
};
pub use tictactoe::{Board, Cell, Mark};

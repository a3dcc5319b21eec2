//! Game Session State
//!
//! `GameSession` is the authoritative state of one game: a common envelope
//! (code, players, turn, status, winner, votes) plus a kind-specific board.
//! Every permitted transition is a method here; each one validates fully
//! before mutating, so a rejected call leaves the session exactly as it was.
//!
//! The session is a plain value. It holds no connection handles and can be
//! cloned and serialized directly as a snapshot.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::code::SessionCode;
use crate::game::battleship::{grid_index, AttackOutcome, PlacementError, PlayerBoard, Ship};
use crate::game::tictactoe::{self, Board, Mark, BOARD_CELLS};

/// Caller-supplied player identifier.
pub type PlayerId = String;

/// Maximum players per session.
pub const MAX_PLAYERS: usize = 2;

// =============================================================================
// ENVELOPE TYPES
// =============================================================================

/// Which game a session plays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    /// 3×3 tic-tac-toe.
    #[default]
    TicTacToe,
    /// 10×10 battleship.
    Battleship,
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GameKind::TicTacToe => "tictactoe",
            GameKind::Battleship => "battleship",
        })
    }
}

/// A player's position in turn order. Serialized as `0` or `1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Seat {
    /// Creator of the session; moves first.
    #[default]
    First,
    /// Second player to join.
    Second,
}

impl Seat {
    /// Seat for a position in the player list.
    pub fn from_index(index: usize) -> Option<Seat> {
        match index {
            0 => Some(Seat::First),
            1 => Some(Seat::Second),
            _ => None,
        }
    }

    /// Position in the player list.
    pub fn index(self) -> usize {
        match self {
            Seat::First => 0,
            Seat::Second => 1,
        }
    }

    /// The other seat.
    pub fn other(self) -> Seat {
        match self {
            Seat::First => Seat::Second,
            Seat::Second => Seat::First,
        }
    }

    /// Tic-tac-toe symbol played from this seat.
    pub fn mark(self) -> Mark {
        match self {
            Seat::First => Mark::X,
            Seat::Second => Mark::O,
        }
    }

    /// Seat-based winner label (`player1` / `player2`).
    pub fn label(self) -> Winner {
        match self {
            Seat::First => Winner::Player1,
            Seat::Second => Winner::Player2,
        }
    }
}

impl From<Seat> for u8 {
    fn from(seat: Seat) -> u8 {
        seat.index() as u8
    }
}

impl TryFrom<u8> for Seat {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Seat::from_index(value as usize).ok_or_else(|| format!("seat {value} out of range"))
    }
}

/// Session lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// One player seated, waiting for an opponent.
    Waiting,
    /// Battleship only: both seated, placing fleets.
    Setup,
    /// Moves/attacks accepted.
    Playing,
    /// Game over; winner set.
    Finished,
    /// Game over and at least one rematch vote cast.
    RestartRequested,
}

impl SessionStatus {
    /// Whether the game is over. `RestartRequested` counts as over.
    pub fn is_finished(self) -> bool {
        matches!(self, SessionStatus::Finished | SessionStatus::RestartRequested)
    }

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Setup => "setup",
            SessionStatus::Playing => "playing",
            SessionStatus::Finished => "finished",
            SessionStatus::RestartRequested => "restart_requested",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a finished game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winner {
    /// Tic-tac-toe: X completed a line.
    #[serde(rename = "X")]
    X,
    /// Tic-tac-toe: O completed a line.
    #[serde(rename = "O")]
    O,
    /// Tic-tac-toe: full board, no line.
    #[serde(rename = "draw")]
    Draw,
    /// Battleship: seat 0 sank the whole fleet.
    #[serde(rename = "player1")]
    Player1,
    /// Battleship: seat 1 sank the whole fleet.
    #[serde(rename = "player2")]
    Player2,
}

impl From<Mark> for Winner {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Winner::X,
            Mark::O => Winner::O,
        }
    }
}

/// A seated participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Caller-supplied identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Turn-order position.
    pub seat: Seat,
    /// Tic-tac-toe symbol; absent for battleship.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<Mark>,
}

/// Kind-specific board state. Flattened into the session snapshot as
/// `"type": "tictactoe", "board": [...]` or `"type": "battleship", "boards": [...]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GameBoard {
    /// Single shared 3×3 board.
    TicTacToe {
        /// Cells, row-major.
        board: Board,
    },
    /// One board per seat.
    Battleship {
        /// Indexed by seat.
        boards: [PlayerBoard; MAX_PLAYERS],
    },
}

impl GameBoard {
    /// Fresh board for a game kind.
    pub fn new(kind: GameKind) -> Self {
        match kind {
            GameKind::TicTacToe => GameBoard::TicTacToe {
                board: Board::new(),
            },
            GameKind::Battleship => GameBoard::Battleship {
                boards: Default::default(),
            },
        }
    }

    /// Game kind of this board.
    pub fn kind(&self) -> GameKind {
        match self {
            GameBoard::TicTacToe { .. } => GameKind::TicTacToe,
            GameBoard::Battleship { .. } => GameKind::Battleship,
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Rejected session operations. Every variant is recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No session with that code.
    #[error("game not found")]
    NotFound,

    /// Both seats taken.
    #[error("game is full")]
    Full,

    /// Join attempted after the game left the waiting state.
    #[error("game has already started")]
    AlreadyStarted,

    /// Malformed request field.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Action belongs to the other game kind.
    #[error("this action requires a {expected} game")]
    WrongGameKind {
        /// Kind the action needs.
        expected: GameKind,
    },

    /// Action not allowed in the current status.
    #[error("action not allowed while game is {status}")]
    IllegalState {
        /// Status at the time of the request.
        status: SessionStatus,
    },

    /// Caller does not hold the turn.
    #[error("not your turn")]
    NotYourTurn,

    /// Caller has no seat in this session.
    #[error("player is not part of this game")]
    NotInSession,

    /// Tic-tac-toe cell already marked.
    #[error("cell is already occupied")]
    CellOccupied,

    /// Battleship cell already fired at.
    #[error("cell has already been attacked")]
    AlreadyAttacked,

    /// Fleet failed validation.
    #[error("invalid ship placement: {0}")]
    InvalidPlacement(#[from] PlacementError),
}

// =============================================================================
// TRANSITION RESULTS
// =============================================================================

/// How a join request was satisfied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Newly seated.
    Seated(Seat),
    /// Already held this seat; nothing changed.
    AlreadySeated(Seat),
}

/// Progress of a rematch vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartProgress {
    /// Recorded; more votes needed.
    Pending {
        /// Votes cast so far.
        votes: usize,
        /// Votes required.
        needed: usize,
    },
    /// All players voted; the board has been reset.
    Restarted,
}

// =============================================================================
// SESSION
// =============================================================================

/// One game instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    id: SessionCode,
    #[serde(flatten)]
    game: GameBoard,
    players: Vec<Player>,
    turn: Seat,
    status: SessionStatus,
    winner: Option<Winner>,
    #[serde(rename = "created")]
    created_at: DateTime<Utc>,
    restart_votes: BTreeSet<PlayerId>,
}

impl GameSession {
    /// Create a session with its creator in seat 0.
    pub fn new(
        id: SessionCode,
        creator_id: PlayerId,
        creator_name: String,
        kind: GameKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut session = Self {
            id,
            game: GameBoard::new(kind),
            players: Vec::with_capacity(MAX_PLAYERS),
            turn: Seat::First,
            status: SessionStatus::Waiting,
            winner: None,
            created_at,
            restart_votes: BTreeSet::new(),
        };
        session.seat_player(creator_id, creator_name);
        session
    }

    /// Join code.
    pub fn id(&self) -> &SessionCode {
        &self.id
    }

    /// Game kind.
    pub fn kind(&self) -> GameKind {
        self.game.kind()
    }

    /// Kind-specific board state.
    pub fn game(&self) -> &GameBoard {
        &self.game
    }

    /// Seated players in seat order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Seat holding the turn. Only meaningful while playing.
    pub fn turn(&self) -> Seat {
        self.turn
    }

    /// Lifecycle status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Winner, once finished.
    pub fn winner(&self) -> Option<Winner> {
        self.winner
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Players who asked for a rematch.
    pub fn restart_votes(&self) -> &BTreeSet<PlayerId> {
        &self.restart_votes
    }

    /// Seat of a player, if seated.
    pub fn seat_of(&self, player_id: &str) -> Option<Seat> {
        self.players
            .iter()
            .find(|p| p.id == player_id)
            .map(|p| p.seat)
    }

    /// Seat a second player. Idempotent for an already-seated ID.
    pub fn join(&mut self, player_id: &str, name: &str) -> Result<JoinOutcome, SessionError> {
        if let Some(seat) = self.seat_of(player_id) {
            return Ok(JoinOutcome::AlreadySeated(seat));
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(SessionError::Full);
        }
        if self.status != SessionStatus::Waiting {
            return Err(SessionError::AlreadyStarted);
        }

        let seat = self.seat_player(player_id.to_string(), name.to_string());
        if self.players.len() == MAX_PLAYERS {
            self.status = match self.kind() {
                GameKind::TicTacToe => SessionStatus::Playing,
                GameKind::Battleship => SessionStatus::Setup,
            };
        }
        Ok(JoinOutcome::Seated(seat))
    }

    /// Mark a tic-tac-toe cell for the player holding the turn.
    pub fn make_move(&mut self, player_id: &str, position: i64) -> Result<(), SessionError> {
        let status = self.status;
        let turn = self.turn;
        let current = self.players.get(turn.index()).map(|p| p.id.as_str());

        let GameBoard::TicTacToe { board } = &mut self.game else {
            return Err(SessionError::WrongGameKind {
                expected: GameKind::TicTacToe,
            });
        };
        if status != SessionStatus::Playing {
            return Err(SessionError::IllegalState { status });
        }
        let position = usize::try_from(position)
            .ok()
            .filter(|&p| p < BOARD_CELLS)
            .ok_or_else(|| {
                SessionError::InvalidInput(format!("position {position} is not between 0 and 8"))
            })?;
        if !board.get(position).is_some_and(|cell| cell.is_empty()) {
            return Err(SessionError::CellOccupied);
        }
        if current != Some(player_id) {
            return Err(SessionError::NotYourTurn);
        }

        board.set(position, turn.mark());

        if let Some(mark) = tictactoe::check_winner(board) {
            self.finish(mark.into());
        } else if tictactoe::is_full(board) {
            self.finish(Winner::Draw);
        } else {
            self.turn = turn.other();
        }
        Ok(())
    }

    /// Install a player's fleet. Starts play once both fleets are placed.
    pub fn place_ships(&mut self, player_id: &str, ships: Vec<Ship>) -> Result<(), SessionError> {
        let status = self.status;
        let seat = self.seat_of(player_id);

        let GameBoard::Battleship { boards } = &mut self.game else {
            return Err(SessionError::WrongGameKind {
                expected: GameKind::Battleship,
            });
        };
        if status != SessionStatus::Setup {
            return Err(SessionError::IllegalState { status });
        }
        let seat = seat.ok_or(SessionError::NotInSession)?;

        boards[seat.index()].place(ships)?;

        if boards.iter().all(|b| b.ready) {
            self.status = SessionStatus::Playing;
        }
        Ok(())
    }

    /// Fire at the opponent's grid. A hit keeps the turn; a miss passes it.
    pub fn attack(&mut self, player_id: &str, x: i64, y: i64) -> Result<AttackOutcome, SessionError> {
        let status = self.status;
        let turn = self.turn;
        let current = self.players.get(turn.index()).map(|p| p.id.as_str());

        let GameBoard::Battleship { boards } = &mut self.game else {
            return Err(SessionError::WrongGameKind {
                expected: GameKind::Battleship,
            });
        };
        if status != SessionStatus::Playing {
            return Err(SessionError::IllegalState { status });
        }
        let (x, y) = grid_index(x, y).ok_or_else(|| {
            SessionError::InvalidInput(format!("coordinates ({x}, {y}) are off the board"))
        })?;
        if current != Some(player_id) {
            return Err(SessionError::NotYourTurn);
        }

        let target = &mut boards[turn.other().index()];
        let outcome = target.strike(x, y).ok_or(SessionError::AlreadyAttacked)?;

        if !outcome.is_hit() {
            self.turn = turn.other();
        } else if target.all_sunk() {
            self.finish(turn.label());
        }
        Ok(outcome)
    }

    /// Record a rematch vote; reset once every seated player has voted.
    pub fn vote_restart(&mut self, player_id: &str) -> Result<RestartProgress, SessionError> {
        if !self.status.is_finished() {
            return Err(SessionError::IllegalState {
                status: self.status,
            });
        }
        if self.seat_of(player_id).is_none() {
            return Err(SessionError::NotInSession);
        }

        self.restart_votes.insert(player_id.to_string());

        let everyone_voted = self
            .players
            .iter()
            .all(|p| self.restart_votes.contains(&p.id));
        if everyone_voted {
            self.reset();
            return Ok(RestartProgress::Restarted);
        }

        self.status = SessionStatus::RestartRequested;
        Ok(RestartProgress::Pending {
            votes: self.restart_votes.len(),
            needed: self.players.len(),
        })
    }

    fn seat_player(&mut self, id: PlayerId, name: String) -> Seat {
        let seat = Seat::from_index(self.players.len()).unwrap_or(Seat::Second);
        let symbol = match self.kind() {
            GameKind::TicTacToe => Some(seat.mark()),
            GameKind::Battleship => None,
        };
        self.players.push(Player {
            id,
            name,
            seat,
            symbol,
        });
        seat
    }

    fn finish(&mut self, winner: Winner) {
        self.status = SessionStatus::Finished;
        self.winner = Some(winner);
    }

    fn reset(&mut self) {
        self.game = GameBoard::new(self.kind());
        self.status = match self.kind() {
            GameKind::TicTacToe => SessionStatus::Playing,
            GameKind::Battleship => SessionStatus::Setup,
        };
        self.turn = Seat::First;
        self.winner = None;
        self.restart_votes.clear();
    }
}

//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every frame is a JSON text message of the form
//! `{"type": "<camelCaseName>", "data": {...}}`; field names inside `data`
//! are camelCase (`gameId`, `playerId`).

use serde::{Deserialize, Serialize};

use crate::game::battleship::Ship;
use crate::game::state::{GameKind, GameSession, SessionError};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
///
/// `Create`, `JoinGame`, `GetGame` and `Health` are request-style: the reply
/// goes to the requester only. The rest operate on a session the connection
/// has attached to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Create a new session with the caller in seat 0.
    Create(CreateRequest),

    /// Take the second seat of a waiting session.
    JoinGame(JoinGameRequest),

    /// Fetch a session snapshot.
    GetGame(GameRef),

    /// Liveness probe.
    Health,

    /// Attach this connection to a session for live updates.
    Join(PlayerRef),

    /// Tic-tac-toe move.
    Move(MoveRequest),

    /// Battleship shot.
    Attack(AttackRequest),

    /// Battleship fleet placement.
    PlaceShips(PlaceShipsRequest),

    /// Vote for a rematch.
    RestartVote(PlayerRef),

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

/// Session creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    /// Creator's identifier.
    pub player_id: String,
    /// Creator's display name.
    pub player_name: String,
    /// Game to play; tic-tac-toe when absent.
    #[serde(default)]
    pub game_type: Option<GameKind>,
}

/// Request to join a waiting session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameRequest {
    /// Join code.
    pub game_id: String,
    /// Joiner's identifier.
    pub player_id: String,
    /// Joiner's display name.
    pub player_name: String,
}

/// Reference to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRef {
    /// Join code.
    pub game_id: String,
}

/// Reference to a player within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRef {
    /// Join code.
    pub game_id: String,
    /// Acting player.
    pub player_id: String,
}

/// Tic-tac-toe move.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    /// Join code.
    pub game_id: String,
    /// Acting player.
    pub player_id: String,
    /// Cell index, 0 top-left to 8 bottom-right.
    pub position: i64,
}

/// Battleship shot at the opponent's grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackRequest {
    /// Join code.
    pub game_id: String,
    /// Acting player.
    pub player_id: String,
    /// Column, 0-9.
    pub x: i64,
    /// Row, 0-9.
    pub y: i64,
}

/// Battleship fleet placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceShipsRequest {
    /// Join code.
    pub game_id: String,
    /// Acting player.
    pub player_id: String,
    /// Complete fleet.
    pub ships: Vec<Ship>,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Reply to `create`, `joinGame` or `getGame`.
    GameState(GameSession),

    /// Session changed; sent to every attached connection.
    GameUpdate(GameSession),

    /// Reply to `health`.
    Health(HealthReport),

    /// Pong response.
    Pong {
        timestamp: u64,
        #[serde(rename = "serverTime")]
        server_time: u64,
    },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Liveness report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Always `"ok"` while the server answers.
    pub status: String,
    /// Live session count.
    pub games: usize,
    /// Server time, unix seconds.
    pub time: i64,
}

impl HealthReport {
    /// Healthy report for the given session count and time.
    pub fn ok(games: usize, time: i64) -> Self {
        Self {
            status: "ok".to_string(),
            games,
            time,
        }
    }
}

/// Error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Build an error with a message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&SessionError> for ServerError {
    fn from(err: &SessionError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Session does not exist.
    NotFound,
    /// Session already has two players.
    Full,
    /// Session is past the waiting state.
    AlreadyStarted,
    /// Malformed or out-of-range input.
    InvalidInput,
    /// Action belongs to the other game.
    WrongGameKind,
    /// Action not allowed in the current status.
    IllegalState,
    /// Caller does not hold the turn.
    NotYourTurn,
    /// Caller is not seated in the session.
    NotInSession,
    /// Tic-tac-toe cell taken.
    CellOccupied,
    /// Battleship cell already fired at.
    AlreadyAttacked,
    /// Fleet rejected.
    InvalidPlacement,
}

impl SessionError {
    /// Wire code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::NotFound => ErrorCode::NotFound,
            SessionError::Full => ErrorCode::Full,
            SessionError::AlreadyStarted => ErrorCode::AlreadyStarted,
            SessionError::InvalidInput(_) => ErrorCode::InvalidInput,
            SessionError::WrongGameKind { .. } => ErrorCode::WrongGameKind,
            SessionError::IllegalState { .. } => ErrorCode::IllegalState,
            SessionError::NotYourTurn => ErrorCode::NotYourTurn,
            SessionError::NotInSession => ErrorCode::NotInSession,
            SessionError::CellOccupied => ErrorCode::CellOccupied,
            SessionError::AlreadyAttacked => ErrorCode::AlreadyAttacked,
            SessionError::InvalidPlacement(_) => ErrorCode::InvalidPlacement,
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

//! Session Registry
//!
//! Owns every live `GameSession`, keyed by join code. Sessions sit behind
//! their own lock so transitions on different games never contend; the map
//! lock is only held long enough to clone a handle or change membership.
//!
//! Every operation returns a cloned snapshot, so callers never hold a
//! session lock while doing I/O.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::core::code::SessionCode;
use crate::game::battleship::{AttackOutcome, Ship};
use crate::game::state::{GameKind, GameSession, JoinOutcome, RestartProgress, SessionError};

type SessionHandle = Arc<RwLock<GameSession>>;

struct Entry {
    created_at: DateTime<Utc>,
    session: SessionHandle,
}

/// All live sessions.
pub struct SessionRegistry {
    sessions: RwLock<BTreeMap<SessionCode, Entry>>,
    next_code: fn() -> SessionCode,
}

impl SessionRegistry {
    /// Create an empty registry drawing random join codes.
    pub fn new() -> Self {
        Self::with_code_source(SessionCode::random)
    }

    /// Create an empty registry with a custom join code generator.
    ///
    /// Generated codes that collide with a live session are discarded and
    /// drawn again.
    pub fn with_code_source(next_code: fn() -> SessionCode) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            next_code,
        }
    }

    /// Create a session with the caller seated first.
    pub async fn create(
        &self,
        player_id: &str,
        player_name: &str,
        kind: GameKind,
    ) -> Result<GameSession, SessionError> {
        require("playerId", player_id)?;
        require("playerName", player_name)?;

        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let code = loop {
            let candidate = (self.next_code)();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
            debug!(game_id = %candidate, "join code collision, regenerating");
        };

        let session = GameSession::new(
            code.clone(),
            player_id.to_string(),
            player_name.to_string(),
            kind,
            now,
        );
        let snapshot = session.clone();
        sessions.insert(
            code.clone(),
            Entry {
                created_at: now,
                session: Arc::new(RwLock::new(session)),
            },
        );
        drop(sessions);

        info!(game_id = %code, player_id, %kind, "game created");
        Ok(snapshot)
    }

    /// Seat a player in a waiting session.
    pub async fn join(
        &self,
        code: &str,
        player_id: &str,
        player_name: &str,
    ) -> Result<(GameSession, JoinOutcome), SessionError> {
        require("gameId", code)?;
        require("playerId", player_id)?;
        require("playerName", player_name)?;

        let (snapshot, outcome) = self
            .mutate(code, |session| session.join(player_id, player_name))
            .await?;

        match outcome {
            JoinOutcome::Seated(seat) => {
                info!(game_id = %code, player_id, seat = seat.index(), status = %snapshot.status(), "player joined");
            }
            JoinOutcome::AlreadySeated(_) => {
                debug!(game_id = %code, player_id, "player already seated");
            }
        }
        Ok((snapshot, outcome))
    }

    /// Snapshot of a session.
    pub async fn lookup(&self, code: &str) -> Result<GameSession, SessionError> {
        let handle = self.handle(code).await?;
        let session = handle.read().await;
        Ok(session.clone())
    }

    /// Apply a tic-tac-toe move.
    pub async fn make_move(
        &self,
        code: &str,
        player_id: &str,
        position: i64,
    ) -> Result<GameSession, SessionError> {
        let (snapshot, ()) = self
            .mutate(code, |session| session.make_move(player_id, position))
            .await?;

        info!(game_id = %code, player_id, position, "move applied");
        log_if_finished(&snapshot);
        Ok(snapshot)
    }

    /// Install a player's battleship fleet.
    pub async fn place_ships(
        &self,
        code: &str,
        player_id: &str,
        ships: Vec<Ship>,
    ) -> Result<GameSession, SessionError> {
        let (snapshot, ()) = self
            .mutate(code, |session| session.place_ships(player_id, ships))
            .await?;

        info!(game_id = %code, player_id, status = %snapshot.status(), "ships placed");
        Ok(snapshot)
    }

    /// Fire a battleship shot.
    pub async fn attack(
        &self,
        code: &str,
        player_id: &str,
        x: i64,
        y: i64,
    ) -> Result<(GameSession, AttackOutcome), SessionError> {
        let (snapshot, outcome) = self
            .mutate(code, |session| session.attack(player_id, x, y))
            .await?;

        match outcome {
            AttackOutcome::Miss => info!(game_id = %code, player_id, x, y, "attack missed"),
            AttackOutcome::Hit => info!(game_id = %code, player_id, x, y, "attack hit"),
            AttackOutcome::Sunk { length } => {
                info!(game_id = %code, player_id, x, y, length, "ship sunk")
            }
        }
        log_if_finished(&snapshot);
        Ok((snapshot, outcome))
    }

    /// Record a rematch vote.
    pub async fn vote_restart(
        &self,
        code: &str,
        player_id: &str,
    ) -> Result<(GameSession, RestartProgress), SessionError> {
        let (snapshot, progress) = self
            .mutate(code, |session| session.vote_restart(player_id))
            .await?;

        match progress {
            RestartProgress::Pending { votes, needed } => {
                info!(game_id = %code, player_id, votes, needed, "restart vote recorded");
            }
            RestartProgress::Restarted => info!(game_id = %code, "game restarted"),
        }
        Ok((snapshot, progress))
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    /// Remove every session created more than `retention` before `now`.
    /// Returns the evicted codes.
    pub async fn evict_expired(&self, now: DateTime<Utc>, retention: Duration) -> Vec<SessionCode> {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<SessionCode> = sessions
            .iter()
            .filter(|(_, entry)| {
                now.signed_duration_since(entry.created_at)
                    .to_std()
                    .is_ok_and(|age| age > retention)
            })
            .map(|(code, _)| code.clone())
            .collect();

        for code in &expired {
            sessions.remove(code);
        }
        expired
    }

    async fn handle(&self, code: &str) -> Result<SessionHandle, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(code)
            .map(|entry| Arc::clone(&entry.session))
            .ok_or(SessionError::NotFound)
    }

    /// Run one transition under the session's write lock and clone the
    /// resulting state out.
    async fn mutate<T>(
        &self,
        code: &str,
        transition: impl FnOnce(&mut GameSession) -> Result<T, SessionError>,
    ) -> Result<(GameSession, T), SessionError> {
        let handle = self.handle(code).await?;
        let mut session = handle.write().await;
        let value = transition(&mut session)?;
        Ok((session.clone(), value))
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn require(field: &str, value: &str) -> Result<(), SessionError> {
    if value.trim().is_empty() {
        return Err(SessionError::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}

fn log_if_finished(session: &GameSession) {
    if let Some(winner) = session.winner() {
        info!(game_id = %session.id(), ?winner, "game finished");
    }
}

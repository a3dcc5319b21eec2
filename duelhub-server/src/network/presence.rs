//! Presence Table
//!
//! Maps `(session, player)` to the live connection that should receive that
//! player's updates. Kept apart from the registry so session state stays a
//! plain value and connection churn never touches game locks.

use std::collections::BTreeMap;

use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::code::SessionCode;
use crate::game::state::PlayerId;
use crate::network::protocol::ServerMessage;

/// Why a message could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Outbound queue is at capacity.
    #[error("outbound queue full")]
    QueueFull,
    /// Writer task has gone away.
    #[error("connection closed")]
    Closed,
}

/// Send half of one client connection.
#[derive(Debug, Clone)]
pub struct Connection {
    id: Uuid,
    sender: mpsc::Sender<ServerMessage>,
}

impl Connection {
    /// Wrap a connection's outbound queue with a fresh identity.
    pub fn new(sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    /// Unique identity of this connection.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue a message without waiting.
    pub fn send(&self, message: ServerMessage) -> Result<(), DeliveryError> {
        self.sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Which connection receives updates for each seated player.
#[derive(Default)]
pub struct Presence {
    routes: RwLock<BTreeMap<(SessionCode, PlayerId), Connection>>,
}

impl Presence {
    /// Create an empty presence table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `player`'s updates for `code` to `connection`, replacing any
    /// earlier connection. Returns the replaced connection's id.
    pub async fn attach(
        &self,
        code: SessionCode,
        player: PlayerId,
        connection: Connection,
    ) -> Option<Uuid> {
        let mut routes = self.routes.write().await;
        routes
            .insert((code, player), connection)
            .map(|previous| previous.id())
    }

    /// Deliver `message` to every connection attached to `code`.
    ///
    /// Connections that cannot accept the message are detached. Returns the
    /// number of successful deliveries.
    pub async fn publish(&self, code: &SessionCode, message: &ServerMessage) -> usize {
        let targets: Vec<(PlayerId, Connection)> = {
            let routes = self.routes.read().await;
            routes
                .range((code.clone(), PlayerId::new())..)
                .take_while(|((session, _), _)| session == code)
                .map(|((_, player), connection)| (player.clone(), connection.clone()))
                .collect()
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (player, connection) in targets {
            match connection.send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(game_id = %code, player_id = %player, connection = %connection.id(), error = %e, "broadcast failed, detaching");
                    failed.push((player, connection.id()));
                }
            }
        }

        if !failed.is_empty() {
            let mut routes = self.routes.write().await;
            for (player, id) in failed {
                let key = (code.clone(), player);
                // A newer connection may have attached since the snapshot.
                if routes.get(&key).is_some_and(|c| c.id() == id) {
                    routes.remove(&key);
                }
            }
        }
        delivered
    }

    /// Remove every route owned by a closing connection.
    pub async fn detach_connection(&self, id: Uuid) -> usize {
        let mut routes = self.routes.write().await;
        let before = routes.len();
        routes.retain(|_, connection| connection.id() != id);
        let removed = before - routes.len();
        if removed > 0 {
            debug!(connection = %id, removed, "connection detached");
        }
        removed
    }

    /// Drop all routes for a session.
    pub async fn forget_session(&self, code: &SessionCode) {
        let mut routes = self.routes.write().await;
        routes.retain(|(session, _), _| session != code);
    }

    /// Number of connections attached to a session.
    pub async fn attached_count(&self, code: &SessionCode) -> usize {
        let routes = self.routes.read().await;
        routes
            .range((code.clone(), PlayerId::new())..)
            .take_while(|((session, _), _)| session == code)
            .count()
    }
}

//! Message Dispatch
//!
//! Routes decoded client messages to the registry and fans the results out.
//! Request-style messages are answered on the requesting connection only.
//! Successful mutations publish a `gameUpdate` to every connection attached
//! to the session; failures go back to the requester alone.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::core::code::SessionCode;
use crate::game::state::{GameSession, JoinOutcome, SessionError};
use crate::network::presence::{Connection, Presence};
use crate::network::protocol::{ClientMessage, HealthReport, ServerError, ServerMessage};
use crate::network::registry::SessionRegistry;

/// Shared handler for every connection's inbound messages.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    presence: Arc<Presence>,
}

impl Dispatcher {
    /// Create a dispatcher over a registry and presence table.
    pub fn new(registry: Arc<SessionRegistry>, presence: Arc<Presence>) -> Self {
        Self { registry, presence }
    }

    /// Session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Presence table.
    pub fn presence(&self) -> &Arc<Presence> {
        &self.presence
    }

    /// Handle one message from `connection`.
    pub async fn dispatch(&self, connection: &Connection, message: ClientMessage) {
        match self.handle(connection, message).await {
            Ok(Some(reply)) => reply_to(connection, reply),
            Ok(None) => {}
            Err(e) => {
                debug!(connection = %connection.id(), error = %e, "request rejected");
                reply_to(connection, ServerMessage::Error(ServerError::from(&e)));
            }
        }
    }

    async fn handle(
        &self,
        connection: &Connection,
        message: ClientMessage,
    ) -> Result<Option<ServerMessage>, SessionError> {
        match message {
            ClientMessage::Create(req) => {
                let kind = req.game_type.unwrap_or_default();
                let session = self
                    .registry
                    .create(&req.player_id, &req.player_name, kind)
                    .await?;
                Ok(Some(ServerMessage::GameState(session)))
            }

            ClientMessage::JoinGame(req) => {
                let (session, outcome) = self
                    .registry
                    .join(&req.game_id, &req.player_id, &req.player_name)
                    .await?;
                if matches!(outcome, JoinOutcome::Seated(_)) {
                    self.publish(&session).await;
                }
                Ok(Some(ServerMessage::GameState(session)))
            }

            ClientMessage::GetGame(req) => {
                let session = self.registry.lookup(&req.game_id).await?;
                Ok(Some(ServerMessage::GameState(session)))
            }

            ClientMessage::Health => {
                let games = self.registry.session_count().await;
                Ok(Some(ServerMessage::Health(HealthReport::ok(
                    games,
                    Utc::now().timestamp(),
                ))))
            }

            ClientMessage::Join(req) => {
                let session = self.registry.lookup(&req.game_id).await?;
                if session.seat_of(&req.player_id).is_none() {
                    return Err(SessionError::NotInSession);
                }
                let replaced = self
                    .presence
                    .attach(session.id().clone(), req.player_id.clone(), connection.clone())
                    .await;
                debug!(game_id = %session.id(), player_id = %req.player_id, connection = %connection.id(), ?replaced, "connection attached");
                Ok(Some(ServerMessage::GameUpdate(session)))
            }

            ClientMessage::Move(req) => {
                let session = self
                    .registry
                    .make_move(&req.game_id, &req.player_id, req.position)
                    .await?;
                self.publish(&session).await;
                Ok(None)
            }

            ClientMessage::Attack(req) => {
                let (session, _) = self
                    .registry
                    .attack(&req.game_id, &req.player_id, req.x, req.y)
                    .await?;
                self.publish(&session).await;
                Ok(None)
            }

            ClientMessage::PlaceShips(req) => {
                let session = self
                    .registry
                    .place_ships(&req.game_id, &req.player_id, req.ships)
                    .await?;
                self.publish(&session).await;
                Ok(None)
            }

            ClientMessage::RestartVote(req) => {
                let (session, _) = self
                    .registry
                    .vote_restart(&req.game_id, &req.player_id)
                    .await?;
                self.publish(&session).await;
                Ok(None)
            }

            ClientMessage::Ping { timestamp } => Ok(Some(ServerMessage::Pong {
                timestamp,
                server_time: u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default(),
            })),
        }
    }

    async fn publish(&self, session: &GameSession) {
        let code: &SessionCode = session.id();
        let update = ServerMessage::GameUpdate(session.clone());
        let delivered = self.presence.publish(code, &update).await;
        debug!(game_id = %code, delivered, "game update published");
    }
}

fn reply_to(connection: &Connection, message: ServerMessage) {
    if let Err(e) = connection.send(message) {
        debug!(connection = %connection.id(), error = %e, "reply dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::battleship::legal_fleet;
    use crate::game::state::{GameKind, SessionStatus, Winner};
    use crate::network::protocol::{
        AttackRequest, CreateRequest, ErrorCode, GameRef, JoinGameRequest, MoveRequest,
        PlaceShipsRequest, PlayerRef,
    };
    use tokio::sync::mpsc;

    struct Client {
        connection: Connection,
        inbox: mpsc::Receiver<ServerMessage>,
    }

    impl Client {
        fn new() -> Self {
            let (tx, inbox) = mpsc::channel(32);
            Self {
                connection: Connection::new(tx),
                inbox,
            }
        }

        fn next(&mut self) -> ServerMessage {
            self.inbox.try_recv().expect("expected a queued message")
        }

        fn is_idle(&mut self) -> bool {
            self.inbox.try_recv().is_err()
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(SessionRegistry::new()), Arc::new(Presence::new()))
    }

    fn player_ref(code: &SessionCode, player: &str) -> PlayerRef {
        PlayerRef {
            game_id: code.to_string(),
            player_id: player.to_string(),
        }
    }

    fn move_msg(code: &SessionCode, player: &str, position: i64) -> ClientMessage {
        ClientMessage::Move(MoveRequest {
            game_id: code.to_string(),
            player_id: player.to_string(),
            position,
        })
    }

    async fn create(d: &Dispatcher, client: &mut Client, kind: Option<GameKind>) -> SessionCode {
        d.dispatch(
            &client.connection,
            ClientMessage::Create(CreateRequest {
                player_id: "p1".to_string(),
                player_name: "Alice".to_string(),
                game_type: kind,
            }),
        )
        .await;
        match client.next() {
            ServerMessage::GameState(session) => session.id().clone(),
            other => panic!("unexpected reply {other:?}"),
        }
    }

    /// Create, join and attach both players; drains every setup message.
    async fn seated_pair(d: &Dispatcher, kind: GameKind) -> (SessionCode, Client, Client) {
        let mut alice = Client::new();
        let mut bob = Client::new();
        let code = create(d, &mut alice, Some(kind)).await;

        d.dispatch(&alice.connection, ClientMessage::Join(player_ref(&code, "p1"))).await;
        assert!(matches!(alice.next(), ServerMessage::GameUpdate(_)));

        d.dispatch(
            &bob.connection,
            ClientMessage::JoinGame(JoinGameRequest {
                game_id: code.to_string(),
                player_id: "p2".to_string(),
                player_name: "Bob".to_string(),
            }),
        )
        .await;
        assert!(matches!(bob.next(), ServerMessage::GameState(_)));
        assert!(matches!(alice.next(), ServerMessage::GameUpdate(_)));

        d.dispatch(&bob.connection, ClientMessage::Join(player_ref(&code, "p2"))).await;
        assert!(matches!(bob.next(), ServerMessage::GameUpdate(_)));

        (code, alice, bob)
    }

    #[tokio::test]
    async fn test_create_defaults_to_tictactoe() {
        let d = dispatcher();
        let mut client = Client::new();
        let code = create(&d, &mut client, None).await;
        let session = d.registry().lookup(code.as_str()).await.unwrap();
        assert_eq!(session.kind(), GameKind::TicTacToe);
        assert!(client.is_idle());
    }

    #[tokio::test]
    async fn test_get_game_and_not_found() {
        let d = dispatcher();
        let mut client = Client::new();
        let code = create(&d, &mut client, Some(GameKind::Battleship)).await;

        d.dispatch(
            &client.connection,
            ClientMessage::GetGame(GameRef {
                game_id: code.to_string(),
            }),
        )
        .await;
        assert!(matches!(client.next(), ServerMessage::GameState(s) if s.kind() == GameKind::Battleship));

        d.dispatch(
            &client.connection,
            ClientMessage::GetGame(GameRef {
                game_id: "ZZZZZZ".to_string(),
            }),
        )
        .await;
        match client.next() {
            ServerMessage::Error(err) => assert_eq!(err.code, ErrorCode::NotFound),
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_moves_broadcast_to_both_players() {
        let d = dispatcher();
        let (code, mut alice, mut bob) = seated_pair(&d, GameKind::TicTacToe).await;

        for (player, position) in [("p1", 0), ("p2", 3), ("p1", 1), ("p2", 4), ("p1", 2)] {
            let sender = if player == "p1" { &alice } else { &bob };
            d.dispatch(&sender.connection, move_msg(&code, player, position)).await;
            assert!(matches!(alice.next(), ServerMessage::GameUpdate(_)));
            assert!(matches!(bob.next(), ServerMessage::GameUpdate(_)));
        }

        let finished = d.registry().lookup(code.as_str()).await.unwrap();
        assert_eq!(finished.status(), SessionStatus::Finished);
        assert_eq!(finished.winner(), Some(Winner::X));
    }

    #[tokio::test]
    async fn test_error_goes_to_requester_only() {
        let d = dispatcher();
        let (code, mut alice, mut bob) = seated_pair(&d, GameKind::TicTacToe).await;

        d.dispatch(&bob.connection, move_msg(&code, "p2", 0)).await;
        match bob.next() {
            ServerMessage::Error(err) => assert_eq!(err.code, ErrorCode::NotYourTurn),
            other => panic!("unexpected reply {other:?}"),
        }
        assert!(alice.is_idle());
        assert!(bob.is_idle());
    }

    #[tokio::test]
    async fn test_attach_requires_seat() {
        let d = dispatcher();
        let mut client = Client::new();
        let code = create(&d, &mut client, None).await;

        let mut stranger = Client::new();
        d.dispatch(&stranger.connection, ClientMessage::Join(player_ref(&code, "mallory"))).await;
        match stranger.next() {
            ServerMessage::Error(err) => assert_eq!(err.code, ErrorCode::NotInSession),
            other => panic!("unexpected reply {other:?}"),
        }
        assert_eq!(d.presence().attached_count(&code).await, 0);
    }

    #[tokio::test]
    async fn test_battleship_miss_broadcast() {
        let d = dispatcher();
        let (code, mut alice, mut bob) = seated_pair(&d, GameKind::Battleship).await;

        for (client, player) in [(&alice, "p1"), (&bob, "p2")] {
            d.dispatch(
                &client.connection,
                ClientMessage::PlaceShips(PlaceShipsRequest {
                    game_id: code.to_string(),
                    player_id: player.to_string(),
                    ships: legal_fleet(),
                }),
            )
            .await;
        }
        for _ in 0..2 {
            assert!(matches!(alice.next(), ServerMessage::GameUpdate(_)));
            assert!(matches!(bob.next(), ServerMessage::GameUpdate(_)));
        }

        d.dispatch(
            &alice.connection,
            ClientMessage::Attack(AttackRequest {
                game_id: code.to_string(),
                player_id: "p1".to_string(),
                x: 9,
                y: 9,
            }),
        )
        .await;
        match bob.next() {
            ServerMessage::GameUpdate(session) => {
                assert_eq!(session.status(), SessionStatus::Playing);
                assert_eq!(session.turn().index(), 1);
            }
            other => panic!("unexpected reply {other:?}"),
        }
        assert!(matches!(alice.next(), ServerMessage::GameUpdate(_)));
    }

    #[tokio::test]
    async fn test_health_and_ping() {
        let d = dispatcher();
        let mut client = Client::new();
        create(&d, &mut client, None).await;

        d.dispatch(&client.connection, ClientMessage::Health).await;
        match client.next() {
            ServerMessage::Health(report) => {
                assert_eq!(report.status, "ok");
                assert_eq!(report.games, 1);
                assert!(report.time > 0);
            }
            other => panic!("unexpected reply {other:?}"),
        }

        d.dispatch(&client.connection, ClientMessage::Ping { timestamp: 42 }).await;
        assert!(matches!(client.next(), ServerMessage::Pong { timestamp: 42, .. }));
    }
}

// End-to-end test for the WebSocket server.
//
// Starts a server on localhost, connects two clients, and plays a full
// tic-tac-toe game through the wire protocol: create, join, attach, moves,
// rejected moves, and the final broadcast.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use duelhub::network::protocol::{
    ClientMessage, CreateRequest, ErrorCode, JoinGameRequest, MoveRequest, PlayerRef,
};
use duelhub::network::ServerMessage;
use duelhub::{GameKind, GameServer, GameSession, ServerConfig, SessionStatus, Winner};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start a server on a random port. Returns the server and its URL.
async fn start_server() -> (Arc<GameServer>, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(GameServer::new(ServerConfig::default()));

    let running = Arc::clone(&server);
    tokio::spawn(async move { running.serve(listener).await });

    (server, format!("ws://{addr}"))
}

async fn connect(url: &str) -> Ws {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

async fn send(ws: &mut Ws, msg: &ClientMessage) {
    ws.send(Message::Text(msg.to_json().unwrap())).await.unwrap();
}

/// Next decoded server message, skipping control frames.
async fn recv(ws: &mut Ws) -> ServerMessage {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for server")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return ServerMessage::from_json(&text).unwrap();
        }
    }
}

async fn recv_update(ws: &mut Ws) -> GameSession {
    match recv(ws).await {
        ServerMessage::GameUpdate(session) => session,
        other => panic!("expected gameUpdate, got {other:?}"),
    }
}

fn attach(code: &str, player: &str) -> ClientMessage {
    ClientMessage::Join(PlayerRef {
        game_id: code.to_string(),
        player_id: player.to_string(),
    })
}

fn play(code: &str, player: &str, position: i64) -> ClientMessage {
    ClientMessage::Move(MoveRequest {
        game_id: code.to_string(),
        player_id: player.to_string(),
        position,
    })
}

#[tokio::test]
async fn tictactoe_game_over_websocket() {
    let (server, url) = start_server().await;
    let mut alice = connect(&url).await;
    let mut bob = connect(&url).await;

    // 1. Alice creates a game; the type defaults to tic-tac-toe.
    send(
        &mut alice,
        &ClientMessage::Create(CreateRequest {
            player_id: "alice".into(),
            player_name: "Alice".into(),
            game_type: None,
        }),
    )
    .await;
    let created = match recv(&mut alice).await {
        ServerMessage::GameState(session) => session,
        other => panic!("expected gameState, got {other:?}"),
    };
    assert_eq!(created.kind(), GameKind::TicTacToe);
    assert_eq!(created.status(), SessionStatus::Waiting);
    let code = created.id().to_string();

    // 2. Alice attaches for live updates.
    send(&mut alice, &attach(&code, "alice")).await;
    assert_eq!(recv_update(&mut alice).await.players().len(), 1);

    // 3. Bob joins by code; Alice is told.
    send(
        &mut bob,
        &ClientMessage::JoinGame(JoinGameRequest {
            game_id: code.clone(),
            player_id: "bob".into(),
            player_name: "Bob".into(),
        }),
    )
    .await;
    match recv(&mut bob).await {
        ServerMessage::GameState(session) => assert_eq!(session.status(), SessionStatus::Playing),
        other => panic!("expected gameState, got {other:?}"),
    }
    assert_eq!(recv_update(&mut alice).await.status(), SessionStatus::Playing);

    send(&mut bob, &attach(&code, "bob")).await;
    recv_update(&mut bob).await;

    // 4. Bob tries to move out of turn; only Bob hears about it.
    send(&mut bob, &play(&code, "bob", 4)).await;
    match recv(&mut bob).await {
        ServerMessage::Error(err) => assert_eq!(err.code, ErrorCode::NotYourTurn),
        other => panic!("expected error, got {other:?}"),
    }

    // 5. X takes the top row.
    let mut last = None;
    for (player, position) in [("alice", 0), ("bob", 3), ("alice", 1), ("bob", 4), ("alice", 2)] {
        let ws = if player == "alice" { &mut alice } else { &mut bob };
        send(ws, &play(&code, player, position)).await;
        let seen_by_alice = recv_update(&mut alice).await;
        let seen_by_bob = recv_update(&mut bob).await;
        assert_eq!(seen_by_alice, seen_by_bob);
        last = Some(seen_by_alice);
    }

    let finished = last.unwrap();
    assert_eq!(finished.status(), SessionStatus::Finished);
    assert_eq!(finished.winner(), Some(Winner::X));

    // 6. Garbage frames are answered, not fatal.
    alice.send(Message::Text("{\"type\":".into())).await.unwrap();
    match recv(&mut alice).await {
        ServerMessage::Error(err) => assert_eq!(err.code, ErrorCode::InvalidInput),
        other => panic!("expected error, got {other:?}"),
    }

    send(&mut alice, &ClientMessage::Health).await;
    match recv(&mut alice).await {
        ServerMessage::Health(report) => assert_eq!(report.games, 1),
        other => panic!("expected health, got {other:?}"),
    }

    assert_eq!(server.session_count().await, 1);
    server.shutdown();
}

#[tokio::test]
async fn join_unknown_game_is_not_found() {
    let (server, url) = start_server().await;
    let mut ws = connect(&url).await;

    send(
        &mut ws,
        &ClientMessage::JoinGame(JoinGameRequest {
            game_id: "NOPE00".into(),
            player_id: "bob".into(),
            player_name: "Bob".into(),
        }),
    )
    .await;
    match recv(&mut ws).await {
        ServerMessage::Error(err) => assert_eq!(err.code, ErrorCode::NotFound),
        other => panic!("expected error, got {other:?}"),
    }

    server.shutdown();
}

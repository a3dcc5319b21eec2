//! WebSocket Game Server
//!
//! Async WebSocket server for two-player game sessions.
//! Accepts connections, decodes client frames and hands them to the
//! dispatcher, and runs the lifecycle sweeper alongside.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::network::dispatch::Dispatcher;
use crate::network::presence::{Connection, Presence};
use crate::network::protocol::{ClientMessage, ErrorCode, ServerError, ServerMessage};
use crate::network::registry::SessionRegistry;
use crate::network::sweeper::{run_sweeper, SweeperConfig};

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 8080;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Per-connection outbound queue capacity.
    pub outbound_queue: usize,
    /// Session expiry timing.
    pub sweeper: SweeperConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 1000,
            outbound_queue: 64,
            sweeper: SweeperConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read overrides from the process environment.
    ///
    /// Recognised variables: `PORT`, `MAX_CONNECTIONS`,
    /// `SWEEP_INTERVAL_SECS`, `SESSION_RETENTION_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source. Malformed values
    /// are reported and replaced by defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let port = parse_var(&lookup, "PORT", DEFAULT_PORT);
        let max_connections = parse_var(&lookup, "MAX_CONNECTIONS", defaults.max_connections);
        let interval = parse_var(
            &lookup,
            "SWEEP_INTERVAL_SECS",
            defaults.sweeper.interval.as_secs(),
        );
        let retention = parse_var(
            &lookup,
            "SESSION_RETENTION_SECS",
            defaults.sweeper.retention.as_secs(),
        );

        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            max_connections,
            sweeper: SweeperConfig {
                interval: Duration::from_secs(interval.max(1)),
                retention: Duration::from_secs(retention),
            },
            ..defaults
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    match lookup(name) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(variable = name, value = %raw, "ignoring malformed environment value");
                default
            }
        },
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection limit reached.
    #[error("Connection limit reached")]
    ConnectionLimitReached,
}

/// Connected client state.
struct ConnectedClient {
    addr: SocketAddr,
    connected_at: Instant,
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Message routing over the shared registry and presence table.
    dispatcher: Dispatcher,
    /// Connected clients.
    clients: Arc<RwLock<BTreeMap<Uuid, ConnectedClient>>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let dispatcher = Dispatcher::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(Presence::new()),
        );

        Self {
            config,
            dispatcher,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and serve until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game server listening on {}", listener.local_addr()?);

        let sweeper_handle = tokio::spawn(run_sweeper(
            Arc::clone(self.dispatcher.registry()),
            Arc::clone(self.dispatcher.presence()),
            self.config.sweeper.clone(),
        ));

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if let Err(e) = self.handle_connection(stream, addr).await {
                                warn!("Rejecting {}: {}", addr, e);
                            }
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        sweeper_handle.abort();
        Ok(())
    }

    /// Register a new TCP connection and spawn its WebSocket task.
    async fn handle_connection(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
    ) -> Result<(), GameServerError> {
        let (msg_tx, msg_rx) = mpsc::channel::<ServerMessage>(self.config.outbound_queue);
        let connection = Connection::new(msg_tx);

        {
            let mut clients = self.clients.write().await;
            if clients.len() >= self.config.max_connections {
                return Err(GameServerError::ConnectionLimitReached);
            }
            clients.insert(
                connection.id(),
                ConnectedClient {
                    addr,
                    connected_at: Instant::now(),
                },
            );
        }
        info!(connection = %connection.id(), "New connection from {}", addr);

        let clients = Arc::clone(&self.clients);
        let dispatcher = self.dispatcher.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let result =
                Self::serve_connection(stream, &connection, msg_rx, &dispatcher, &mut shutdown_rx)
                    .await;
            if let Err(e) = result {
                warn!(connection = %connection.id(), "Connection from {} ended: {}", addr, e);
            }

            // Cleanup
            dispatcher.presence().detach_connection(connection.id()).await;
            let client = clients.write().await.remove(&connection.id());
            if let Some(client) = client {
                info!(
                    connection = %connection.id(),
                    secs = client.connected_at.elapsed().as_secs(),
                    "Client {} cleaned up",
                    client.addr
                );
            }
        });

        Ok(())
    }

    /// Run the WebSocket protocol for one connection until it closes.
    async fn serve_connection(
        stream: TcpStream,
        connection: &Connection,
        mut outbound: mpsc::Receiver<ServerMessage>,
        dispatcher: &Dispatcher,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<(), GameServerError> {
        let ws_stream = accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        // Spawn message sender task
        let sender_task = tokio::spawn(async move {
            while let Some(msg) = outbound.recv().await {
                let text = match msg.to_json() {
                    Ok(t) => t,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        });

        let outcome = loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match ClientMessage::from_json(&text) {
                                Ok(client_msg) => dispatcher.dispatch(connection, client_msg).await,
                                Err(e) => {
                                    debug!(connection = %connection.id(), "Invalid message: {}", e);
                                    reject_frame(connection, "Invalid message format");
                                }
                            }
                        }
                        Some(Ok(Message::Binary(_))) => {
                            reject_frame(connection, "Binary frames are not supported");
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!(connection = %connection.id(), "Client disconnected");
                            break Ok(());
                        }
                        Some(Err(e)) => break Err(e.into()),
                        // Ping/pong frames are answered by tungstenite.
                        _ => {}
                    }
                }
                _ = shutdown_rx.recv() => {
                    let _ = connection.send(ServerMessage::Shutdown {
                        reason: "Server shutting down".to_string(),
                    });
                    break Ok(());
                }
            }
        };

        sender_task.abort();
        outcome
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        self.dispatcher.registry().session_count().await
    }
}

fn reject_frame(connection: &Connection, message: &str) {
    let _ = connection.send(ServerMessage::Error(ServerError::new(
        ErrorCode::InvalidInput,
        message,
    )));
}

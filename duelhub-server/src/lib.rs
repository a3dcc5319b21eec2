//! # DuelHub Game Server
//!
//! Session server for two-player turn-based games: tic-tac-toe and
//! battleship. Clients create a game, share its six-character join code,
//! and play over a single WebSocket connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      DUELHUB SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Shared primitives                       │
//! │  └── code.rs       - Join code generation                    │
//! │                                                              │
//! │  game/             - Game rules (pure, synchronous)          │
//! │  ├── tictactoe.rs  - 3×3 board, win/draw detection           │
//! │  ├── battleship.rs - Grids, fleet validation, strikes        │
//! │  └── state.rs      - Session envelope and transitions        │
//! │                                                              │
//! │  network/          - Transport and shared state              │
//! │  ├── protocol.rs   - Message types                           │
//! │  ├── registry.rs   - Live sessions keyed by join code        │
//! │  ├── presence.rs   - (session, player) → connection routes   │
//! │  ├── dispatch.rs   - Message routing and fan-out             │
//! │  ├── sweeper.rs    - Expired session eviction                │
//! │  └── server.rs     - WebSocket server                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//!
//! Each session is guarded by its own lock; every transition on a session
//! is applied in full or not at all, and transitions on one session are
//! totally ordered. No lock is held while a message is written to a socket.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::code::SessionCode;
pub use game::state::{GameKind, GameSession, SessionError, SessionStatus, Winner};
pub use network::{GameServer, ServerConfig, SessionRegistry};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Network Layer
//!
//! WebSocket transport, session registry, presence fan-out and expiry.
//! Game rules live in `game/`; nothing here decides a move's legality.

pub mod dispatch;
pub mod presence;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod sweeper;

pub use dispatch::Dispatcher;
pub use presence::{Connection, DeliveryError, Presence};
pub use protocol::{ClientMessage, ErrorCode, ServerError, ServerMessage};
pub use registry::SessionRegistry;
pub use server::{GameServer, GameServerError, ServerConfig};
pub use sweeper::SweeperConfig;

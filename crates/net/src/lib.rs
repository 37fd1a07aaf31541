//! Easel Network Library
//!
//! WebSocket transport for collaboration rooms.
//!
//! # Architecture
//!
//! - **Server**: accepts WebSocket connections and runs the idle reaper
//! - **Router**: gates each inbound event and fans it out to the room
//! - **Connections**: join, leave and kick against the room registry
//! - **Protocol**: one JSON object per text frame, tagged by `type`
//!
//! # Usage
//!
//! ```ignore
//! let server = Server::start(ServerConfig::default()).await?;
//! println!("listening on {}", server.addr());
//!
//! tokio::signal::ctrl_c().await?;
//! server.shutdown();
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod peers;
pub mod protocol;
pub mod reaper;
pub mod router;
pub mod server;

pub use config::{RoomDefaults, ServerConfig};
pub use connection::ConnectionManager;
pub use error::{Error, Result};
pub use peers::{ConnectionId, Outbound, PeerTable};
pub use protocol::{ClientMessage, Sender, ServerMessage};
pub use router::Router;
pub use server::Server;

/// Default port for Easel servers
pub const DEFAULT_PORT: u16 = 7341;

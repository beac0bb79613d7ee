//! Wire-facing side of the host: the player connection registry and the
//! WebSocket acceptor.

pub mod connections;
pub mod websocket;

pub use connections::{BroadcastReport, ConnectionRegistry, InboundMessage};
pub use websocket::WsAcceptor;

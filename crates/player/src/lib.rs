//! Fari player library.
//!
//! A player tab joins a host, mirrors its session read-only and sends the
//! player's own actions back.
//!
//! - `application/` - Host connection and replica sync
//! - `state/` - The local session replica
//! - `infrastructure/` - Configuration and the WebSocket dialer

pub mod application;
pub mod infrastructure;
pub mod state;

pub use application::{ClientError, ConnectionState, PlayerClient, PlayerSync};
pub use state::SessionReplica;

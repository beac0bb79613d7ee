//! Infrastructure for a player tab.

pub mod config;
pub mod websocket;

//! Player-side application logic: the host connection and replica sync.

pub mod client;
pub mod sync;

pub use client::{ClientError, ConnectionState, PlayerClient};
pub use sync::PlayerSync;

//! Infrastructure for the host tab: configuration and the reconciliation tick.

pub mod config;
pub mod tick;

//! Local state of a player tab.

pub mod replica;

pub use replica::SessionReplica;

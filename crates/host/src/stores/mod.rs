//! Host-side state.

pub mod session;

pub use session::{RosterEntry, SessionStore};

//! Fari host library.
//!
//! The GM's tab: it owns the authoritative session, admits players over a
//! peer transport and keeps every player tab in sync.
//!
//! ## Structure
//!
//! - `stores/` - The authoritative session store and its actions
//! - `use_cases/` - Player action dispatch, confetti and the sync loop
//! - `infrastructure/` - Configuration and the reconciliation tick
//! - `api/` - Connection registry and the WebSocket acceptor
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod stores;
pub mod use_cases;

pub use app::{App, Services};
pub use stores::{RosterEntry, SessionStore};

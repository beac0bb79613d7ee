//! Host use cases: applying player actions, celebrations and the sync loop.

pub mod confetti;
pub mod dispatch;
pub mod sync;

pub use confetti::ConfettiObserver;
pub use dispatch::{apply_peer_action, handle_inbound};
pub use sync::HostSync;

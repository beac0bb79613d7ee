//! Fari Shared - contracts used by both the host and player tabs
//!
//! - Wire messages (`PeerAction`, `JoinMeta`, session payload codec)
//! - The peer transport contract and the in-process `MemoryNetwork`
//! - Ports for time, randomness and the confetti view effect
//!
//! # Design Principles
//!
//! 1. **No session logic** - the host's store owns every mutation
//! 2. **Transport-agnostic** - WebSocket transports live with the side that uses them

pub mod messages;
pub mod ports;
pub mod transport;

pub use messages::{decode_session, encode_session, JoinMeta, PeerAction};
pub use ports::{
    roll_dice, ClockPort, ConfettiEffect, LogConfetti, RandomPort, SystemClock, SystemRandom,
};
pub use transport::{
    AcceptConnections, ConnectionEvent, ConnectionIo, DialPeer, MemoryNetwork, MemoryPeer,
    Payload, PeerConnection, PeerStatus, PeerTransport, TransportError,
};

#[cfg(any(test, feature = "testing"))]
pub use ports::{FixedClock, MockClockPort, MockConfettiEffect, MockRandomPort};

//! Aggregate roots - domain objects that own their related data

pub mod session;

pub use session::Session;

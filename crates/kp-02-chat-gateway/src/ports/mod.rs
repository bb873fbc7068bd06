//! Ports for the Chat Gateway.

pub mod outbound;

pub use outbound::{SystemClock, TokenVerifier, WallClock};

//! # Ports Layer
//!
//! - `inbound` - APIs this subsystem exposes
//! - `outbound` - Dependencies this subsystem requires

pub mod inbound;
pub mod outbound;

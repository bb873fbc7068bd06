//! # Adapters Module
//!
//! ## Modules
//!
//! - `memory`: ordered in-memory `KeyValueStore`
//! - `time`: system and manual time sources
//! - `locks`: per-group async critical sections

pub mod locks;
pub mod memory;
pub mod time;

pub use locks::{KeyedGuard, KeyedLocks};
pub use memory::InMemoryKVStore;
pub use time::{ManualTimeSource, SystemTimeSource};

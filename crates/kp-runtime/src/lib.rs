//! # Kalapila Runtime
//!
//! Wires the conversation store (kp-01) and the chat gateway (kp-02) into
//! one process.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from `KP_*` environment variables
//! 2. Validate it (production mode also rejects an empty token secret)
//! 3. Open the selected store (`memory` or `rocksdb`)
//! 4. Clear presence left by a previous run
//! 5. Bind and serve the gateway
//!
//! Shutdown stops the gateway first, then drains the history writer and
//! clears presence.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod broker;
pub mod config;
pub mod runtime;

pub use broker::BrokerHooks;
pub use config::{ConfigError, RuntimeConfig, StorageConfig, StoreBackend};
pub use runtime::{ChatRuntime, RuntimeHooks, RuntimeService};

//! # Kalapila Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Cross-crate flows
//!     ├── epoch_flows.rs     # Membership changes seen by every participant
//!     └── gateway_flows.rs   # Broker writes read back over HTTP
//! benches/
//! └── conversation_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p kp-tests
//! cargo test -p kp-tests integration::epoch_flows
//! cargo bench -p kp-tests
//! ```

pub mod integration;

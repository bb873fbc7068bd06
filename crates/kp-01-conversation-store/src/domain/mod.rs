//! # Domain Layer
//!
//! Pure domain logic for the Conversation Store. No I/O happens here.
//!
//! ## Modules
//!
//! - `address` - Identity Resolver and lineage names
//! - `entities` - Persisted records and listing views
//! - `epoch` - Subscribe/Unsubscribe planning
//! - `keys` - Store key layout
//! - `codec` - Record encoding
//! - `value_objects` - Configuration
//! - `errors` - Domain error types

pub mod address;
pub mod codec;
pub mod entities;
pub mod epoch;
pub mod errors;
pub mod keys;
pub mod value_objects;

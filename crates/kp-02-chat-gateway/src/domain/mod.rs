//! Gateway domain: configuration, claims and error taxonomy.

pub mod claims;
pub mod config;
pub mod error;

pub use claims::{decode_claims, Claims};
pub use config::{AuthConfig, ConfigError, GatewayConfig, HttpConfig};
pub use error::{codes, ApiError, ApiResult, GatewayError, TokenError};

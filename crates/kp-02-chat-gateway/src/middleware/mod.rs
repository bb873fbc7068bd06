//! Middleware stack for the Chat Gateway.
//!
//! Layer order: Request → CORS → Tracing → Auth → Handler

pub mod auth;
pub mod tracing;

pub use self::auth::AuthLayer;
pub use self::tracing::{TracingLayer, REQUEST_ID_HEADER};

use axum::http::{header, HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

/// Browser clients call from any origin with a bearer header.
pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
}

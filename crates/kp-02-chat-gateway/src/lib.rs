//! # Chat Gateway (kp-02)
//!
//! Authenticated HTTP read side over the conversation store: history,
//! conversation listings, presence and session bootstrap.
//!
//! ## Architecture
//!
//! ```text
//! HTTP ──→ CORS ──→ Tracing (api_request span) ──→ Auth (bearer → Claims) ──→ handlers
//!                                                                            │
//!                                                                  Arc<dyn ChatQueries>
//! ```
//!
//! ## Routes
//!
//! | Route | Method | Result |
//! |-------|--------|--------|
//! | `/chat/history?group=&offset=&count=` | GET | messages, newest first |
//! | `/chat/rooms?offset=&count=` | GET | conversations with members |
//! | `/chat/timeline?offset=&count=` | GET | conversations by recency |
//! | `/chat/online/buddies` | GET | online 1:1 counterparts |
//! | `/chat/online/status?user_id=` | GET | `{"status": bool}` |
//! | `/chat/session` | POST | `{"chat_token", "expires_at"}` |
//! | `/health` | GET | unauthenticated liveness |
//!
//! Authentication failures answer 401 with `{"code", "message"}`:
//! 1000 token missing, 1001 token invalid, 1002 wrong client (production only).
//!
//! ## Usage
//!
//! ```ignore
//! use kp_02_chat_gateway::{ChatGateway, GatewayConfig, Hs256Verifier};
//!
//! let gateway = ChatGateway::new(config, service, Arc::new(Hs256Verifier::new(secret)))?;
//! let listener = gateway.bind().await?;
//! gateway.serve(listener, shutdown_signal).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod router;
pub mod service;

pub use adapters::Hs256Verifier;
pub use domain::{
    codes, ApiError, ApiResult, AuthConfig, Claims, ConfigError, GatewayConfig, GatewayError,
    HttpConfig, TokenError,
};
pub use ports::{SystemClock, TokenVerifier, WallClock};
pub use router::{build_router, AppState};
pub use service::ChatGateway;

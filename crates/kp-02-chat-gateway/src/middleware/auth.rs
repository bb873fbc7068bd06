//! Bearer token authentication.
//!
//! Verifies the token, applies the audience check in production mode and
//! hands the typed [`Claims`] to handlers through request extensions.

use crate::domain::{ApiError, AuthConfig, Claims};
use crate::ports::TokenVerifier;
use axum::{
    body::Body,
    http::{header, Method, Request},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Authentication layer
#[derive(Clone)]
pub struct AuthLayer {
    verifier: Arc<dyn TokenVerifier>,
    config: Arc<AuthConfig>,
}

impl AuthLayer {
    pub fn new(verifier: Arc<dyn TokenVerifier>, config: AuthConfig) -> Self {
        Self {
            verifier,
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            verifier: Arc::clone(&self.verifier),
            config: Arc::clone(&self.config),
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    verifier: Arc<dyn TokenVerifier>,
    config: Arc<AuthConfig>,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let verifier = Arc::clone(&self.verifier);
        let config = Arc::clone(&self.config);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if req.method() == Method::OPTIONS {
                return inner.call(req).await;
            }

            match authenticate(&req, verifier.as_ref(), &config) {
                Ok(claims) => {
                    debug!(user = %claims.sub, "Request authenticated");
                    req.extensions_mut().insert(claims);
                    inner.call(req).await
                }
                Err(error) => Ok(error.into_response()),
            }
        })
    }
}

/// Run the token checks in order: presence, validity, audience.
fn authenticate<B>(
    req: &Request<B>,
    verifier: &dyn TokenVerifier,
    config: &AuthConfig,
) -> Result<Claims, ApiError> {
    let token = extract_token(req).ok_or_else(ApiError::token_missing)?;

    let claims = verifier.verify(&token).map_err(|e| {
        warn!(error = %e, "Token rejected");
        ApiError::from(e)
    })?;

    if config.production && config.audience.as_deref() != Some(claims.aud.as_str()) {
        warn!(aud = %claims.aud, "Token issued for another client");
        return Err(ApiError::client_invalid());
    }

    Ok(claims)
}

/// Token from `Authorization: Bearer ...`, else the `access_token` query parameter.
fn extract_token<B>(req: &Request<B>) -> Option<String> {
    if let Some(auth) = req.headers().get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    req.uri().query().and_then(|query| {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("access_token="))
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}

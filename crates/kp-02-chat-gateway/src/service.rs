//! Chat Gateway service - HTTP server lifecycle.

use crate::domain::{GatewayConfig, GatewayError};
use crate::ports::TokenVerifier;
use crate::router::{build_router, AppState};
use axum::Router;
use kp_01_conversation_store::ChatQueries;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Chat Gateway service state
pub struct ChatGateway {
    config: GatewayConfig,
    router: Router,
}

impl ChatGateway {
    /// Create a new gateway over the conversation read side.
    pub fn new(
        config: GatewayConfig,
        queries: Arc<dyn ChatQueries>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let state = AppState {
            queries,
            config: Arc::new(config.clone()),
        };
        let router = build_router(state, verifier);

        Ok(Self { config, router })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The fully layered router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind the configured HTTP address.
    pub async fn bind(&self) -> Result<TcpListener, GatewayError> {
        let addr = self.config.http_addr();
        TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: Option<SocketAddr> = listener.local_addr().ok();
        info!(addr = ?addr, "Starting chat gateway");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GatewayError::Serve(e.to_string()))?;

        info!("Chat gateway stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::Hs256Verifier;
    use crate::domain::AuthConfig;
    use kp_01_conversation_store::{
        ConversationConfig, ConversationDependencies, ConversationService, InMemoryKVStore,
        SystemTimeSource,
    };
    use tokio::sync::oneshot;

    fn queries() -> Arc<dyn ChatQueries> {
        Arc::new(ConversationService::new(
            ConversationDependencies {
                kv_store: InMemoryKVStore::new(),
                time_source: SystemTimeSource,
            },
            ConversationConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = GatewayConfig {
            auth: AuthConfig {
                production: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let result = ChatGateway::new(config, queries(), Arc::new(Hs256Verifier::new("k")));
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let mut config = GatewayConfig::default();
        config.http.host = "127.0.0.1".parse().unwrap();
        config.http.port = 0;
        let gateway =
            ChatGateway::new(config, queries(), Arc::new(Hs256Verifier::new("k"))).unwrap();

        let listener = gateway.bind().await.unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(gateway.serve(listener, async {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        assert!(server.await.unwrap().is_ok());
    }
}

//! Runtime lifecycle: open the store, run the service and the gateway,
//! shut both down in order.

use crate::adapters::open_store;
use crate::broker::BrokerHooks;
use crate::config::RuntimeConfig;
use anyhow::{Context, Result};
use kp_01_conversation_store::{
    ChatQueries, ConversationDependencies, ConversationService, KeyValueStore, SystemTimeSource,
};
use kp_02_chat_gateway::{ChatGateway, GatewayError, Hs256Verifier};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Conversation service over whichever store the configuration selects.
pub type RuntimeService = ConversationService<Arc<dyn KeyValueStore>, SystemTimeSource>;

/// Broker hooks bound to the runtime service.
pub type RuntimeHooks = BrokerHooks<Arc<dyn KeyValueStore>, SystemTimeSource>;

/// The chat runtime owning the conversation service and HTTP gateway.
pub struct ChatRuntime {
    config: RuntimeConfig,
    service: Arc<RuntimeService>,
    /// Consumed by `start`.
    gateway: Mutex<Option<ChatGateway>>,
    server: Mutex<Option<JoinHandle<Result<(), GatewayError>>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ChatRuntime {
    /// Open the store and wire the service into the gateway.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        info!("Creating Kalapila chat runtime");

        let kv_store = open_store(&config.storage).context("Failed to open the store")?;
        let service = Arc::new(ConversationService::new(
            ConversationDependencies {
                kv_store,
                time_source: SystemTimeSource,
            },
            config.conversation.clone(),
        ));

        let verifier = Arc::new(Hs256Verifier::new(&config.gateway.auth.secret));
        let queries: Arc<dyn ChatQueries> = service.clone();
        let gateway = ChatGateway::new(config.gateway.clone(), queries, verifier)
            .context("Failed to build the chat gateway")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            service,
            gateway: Mutex::new(Some(gateway)),
            server: Mutex::new(None),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Clear stale presence, bind the gateway and start serving.
    ///
    /// Returns the bound address.
    pub async fn start(&self) -> Result<SocketAddr> {
        info!("===========================================");
        info!("  Kalapila Chat Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        self.service
            .start()
            .await
            .context("Failed to start the conversation store")?;

        let gateway = self
            .gateway
            .lock()
            .take()
            .context("Runtime already started")?;
        let listener = gateway.bind().await?;
        let addr = listener.local_addr()?;

        let mut shutdown_rx = self.shutdown_rx.clone();
        let server = tokio::spawn(gateway.serve(listener, async move {
            let _ = shutdown_rx.changed().await;
        }));
        *self.server.lock() = Some(server);

        info!("HTTP Addr: {}", addr);
        info!("Store: {:?}", self.config.storage.backend);
        Ok(addr)
    }

    pub fn service(&self) -> &Arc<RuntimeService> {
        &self.service
    }

    /// Hooks for the broker to call on connection and topic events.
    pub fn broker_hooks(&self) -> RuntimeHooks {
        BrokerHooks::new(Arc::clone(&self.service))
    }

    /// Stop the gateway, then drain the history writer and clear presence.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown...");

        let _ = self.shutdown_tx.send(true);

        let server = self.server.lock().take();
        if let Some(server) = server {
            match server.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Gateway stopped with error: {}", e),
                Err(e) => error!("Gateway task failed: {}", e),
            }
        }

        self.service
            .close()
            .await
            .context("Failed to close the conversation store")?;

        let stats = self.service.writer_stats();
        info!(
            appended = stats.appended,
            dropped = stats.dropped,
            "Shutdown complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kp_01_conversation_store::{HistoryApi, PresenceApi};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn local_config() -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.gateway.http.host = "127.0.0.1".parse().unwrap();
        config.gateway.http.port = 0;
        config.gateway.auth.secret = "runtime-test-secret".into();
        config
    }

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_start_serves_and_shutdown_stops() {
        let runtime = ChatRuntime::new(local_config()).unwrap();
        let addr = runtime.start().await.unwrap();

        assert!(get(addr, "/health").await.starts_with("HTTP/1.1 200"));
        assert!(get(addr, "/chat/rooms").await.starts_with("HTTP/1.1 401"));

        runtime.shutdown().await.unwrap();
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let runtime = ChatRuntime::new(local_config()).unwrap();
        runtime.start().await.unwrap();
        assert!(runtime.start().await.is_err());
        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_clears_presence() {
        let runtime = ChatRuntime::new(local_config()).unwrap();
        runtime.start().await.unwrap();

        let hooks = runtime.broker_hooks();
        hooks.on_connect("alice").await.unwrap();
        assert!(runtime.service().is_online("alice").await.unwrap());

        runtime.shutdown().await.unwrap();
        assert!(!runtime.service().is_online("alice").await.unwrap());
        assert!(runtime
            .service()
            .scan("alice", "alice|bob", 0, 10)
            .await
            .unwrap()
            .is_empty());
    }
}

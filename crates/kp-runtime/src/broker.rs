//! # Broker Hooks
//!
//! The calls a publish/subscribe broker makes into the conversation store
//! on connection, subscription and publish events.
//!
//! ```text
//! connect ──→ add_online          subscribe ──→ EpochApi::subscribe (registered participants only)
//! disconnect ──→ remove_online    unsubscribe ──→ EpochApi::unsubscribe
//! publish ──→ EpochApi::flush     reconnect ──→ client_subscriptions
//! ```

use kp_01_conversation_store::{
    ConversationError, ConversationService, EpochApi, KeyValueStore, Message, PresenceApi,
    ProfileApi, RegisteredParticipants, ShadowId, TimeSource, Timestamp,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Broker-facing entry points over one conversation service.
pub struct BrokerHooks<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource,
{
    service: Arc<ConversationService<KV, TS>>,
    authorizer: RegisteredParticipants<KV, TS>,
}

impl<KV, TS> BrokerHooks<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource,
{
    pub fn new(service: Arc<ConversationService<KV, TS>>) -> Self {
        let authorizer = RegisteredParticipants::new(Arc::clone(&service));
        Self {
            service,
            authorizer,
        }
    }

    /// A client connected.
    pub async fn on_connect(&self, user: &str) -> Result<(), ConversationError> {
        debug!(user, "client connected");
        self.service.add_online(user).await
    }

    /// A client disconnected.
    pub async fn on_disconnect(&self, user: &str) -> Result<(), ConversationError> {
        debug!(user, "client disconnected");
        self.service.remove_online(user).await
    }

    /// Resolve the shadow topic the broker should bind `user` to.
    pub async fn on_subscribe(
        &self,
        user: &str,
        topic: &str,
        qos: u8,
    ) -> Result<ShadowId, ConversationError> {
        let result = self
            .service
            .subscribe(topic, user, qos, &self.authorizer)
            .await;
        if let Err(e) = &result {
            warn!(user, topic, error = %e, "subscription refused");
        }
        result
    }

    pub async fn on_unsubscribe(&self, user: &str, topic: &str) -> Result<(), ConversationError> {
        self.service.unsubscribe(topic, user).await
    }

    /// Record a published payload in the topic's history.
    pub async fn on_publish(
        &self,
        user: &str,
        topic: &str,
        payload: &str,
        sent_at: Timestamp,
    ) -> Result<(), ConversationError> {
        self.service
            .flush(topic, Message::new(user, topic, payload, sent_at))
            .await
    }

    /// Topics and QoS to restore for a reconnecting client.
    pub async fn resubscribe_targets(
        &self,
        user: &str,
    ) -> Result<BTreeMap<String, u8>, ConversationError> {
        self.service.client_subscriptions(user).await
    }
}

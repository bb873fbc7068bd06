//! # Gateway Flows
//!
//! Sessions bootstrapped over HTTP, conversations driven through the broker
//! hooks, results read back through the authenticated gateway.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use kp_01_conversation_store::{
        ChatQueries, ConversationConfig, ConversationDependencies, ConversationService,
        InMemoryKVStore, Message, SystemTimeSource,
    };
    use kp_02_chat_gateway::{ChatGateway, Claims, GatewayConfig, Hs256Verifier};
    use kp_runtime::BrokerHooks;
    use serde_json::Value;
    use tower::ServiceExt;

    type Service = ConversationService<InMemoryKVStore, SystemTimeSource>;

    const SECRET: &str = "flow-secret";

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Stack {
        router: Router,
        hooks: BrokerHooks<InMemoryKVStore, SystemTimeSource>,
        service: Arc<Service>,
    }

    fn stack() -> Stack {
        let service = Arc::new(ConversationService::new(
            ConversationDependencies {
                kv_store: InMemoryKVStore::new(),
                time_source: SystemTimeSource,
            },
            ConversationConfig::default(),
        ));
        let queries: Arc<dyn ChatQueries> = service.clone();
        let gateway = ChatGateway::new(
            GatewayConfig::default(),
            queries,
            Arc::new(Hs256Verifier::new(SECRET)),
        )
        .unwrap();
        Stack {
            router: gateway.router(),
            hooks: BrokerHooks::new(Arc::clone(&service)),
            service,
        }
    }

    fn bearer(user: &str) -> String {
        let claims = Claims {
            aud: "web".into(),
            sub: user.into(),
            name: format!("{user} flow"),
            first_name: user.to_uppercase(),
            last_name: "Flow".into(),
            profile_image: None,
            email: Some(format!("{user}@example.com")),
            exp: None,
        };
        let token = Hs256Verifier::new(SECRET).issue(&claims).unwrap();
        format!("Bearer {token}")
    }

    async fn call(router: &Router, method: &str, uri: &str, user: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", bearer(user))
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn sign_in(stack: &Stack, users: &[&str]) {
        for user in users {
            let (status, body) = call(&stack.router, "POST", "/chat/session", user).await;
            assert_eq!(status, StatusCode::OK);
            assert!(body["chat_token"].is_string());
        }
    }

    // =============================================================================
    // FLOWS
    // =============================================================================

    #[tokio::test]
    async fn test_published_message_readable_over_http() {
        let stack = stack();
        sign_in(&stack, &["alice", "bob"]).await;

        stack.hooks.on_subscribe("bob", "bob|alice", 1).await.unwrap();
        stack
            .hooks
            .on_publish("bob", "alice|bob", "hello alice", 42)
            .await
            .unwrap();
        stack.service.settle().await.unwrap();

        let (status, body) = call(
            &stack.router,
            "GET",
            "/chat/history?group=alice%7Cbob&offset=0&count=10",
            "alice",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let messages: Vec<Message> = serde_json::from_value(body).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload, "hello alice");
        assert_eq!(messages[0].sender_name.as_deref(), Some("BOB Flow"));
    }

    #[tokio::test]
    async fn test_unregistered_participant_cannot_open_conversation() {
        let stack = stack();
        sign_in(&stack, &["alice"]).await;

        assert!(stack
            .hooks
            .on_subscribe("alice", "alice|mallory", 1)
            .await
            .is_err());

        let (_, rooms) = call(&stack.router, "GET", "/chat/rooms", "alice").await;
        assert_eq!(rooms.as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn test_buddies_follow_connections() {
        let stack = stack();
        sign_in(&stack, &["alice", "bob", "carol"]).await;
        stack.hooks.on_subscribe("alice", "alice|bob", 1).await.unwrap();
        stack
            .hooks
            .on_subscribe("alice", "alice|bob|carol", 1)
            .await
            .unwrap();

        stack.hooks.on_connect("bob").await.unwrap();
        stack.hooks.on_connect("carol").await.unwrap();

        let (_, buddies) = call(&stack.router, "GET", "/chat/online/buddies", "alice").await;
        let ids: Vec<_> = buddies
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["usr_id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["bob"]);

        stack.hooks.on_disconnect("bob").await.unwrap();
        let (_, status) = call(
            &stack.router,
            "GET",
            "/chat/online/status?user_id=bob",
            "alice",
        )
        .await;
        assert_eq!(status["status"], false);
    }

    #[tokio::test]
    async fn test_timeline_pages_over_http() {
        let stack = stack();
        sign_in(&stack, &["alice", "bob", "carol"]).await;
        stack.hooks.on_subscribe("alice", "alice|bob", 1).await.unwrap();
        stack.hooks.on_subscribe("alice", "alice|carol", 1).await.unwrap();

        stack.hooks.on_publish("alice", "alice|bob", "first", 100).await.unwrap();
        stack.hooks.on_publish("carol", "alice|carol", "second", 200).await.unwrap();
        stack.service.settle().await.unwrap();

        let (_, page) = call(&stack.router, "GET", "/chat/timeline?offset=0&count=1", "alice").await;
        assert_eq!(page[0]["key"], "alice|carol");
        assert_eq!(page.as_array().map(Vec::len), Some(1));

        let (_, page) = call(&stack.router, "GET", "/chat/timeline?offset=1&count=1", "alice").await;
        assert_eq!(page[0]["key"], "alice|bob");
    }
}

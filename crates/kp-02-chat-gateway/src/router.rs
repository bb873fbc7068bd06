use crate::domain::GatewayConfig;
use crate::handlers;
use crate::middleware::{create_cors_layer, AuthLayer, TracingLayer};
use crate::ports::TokenVerifier;
use axum::routing::{get, post};
use axum::Router;
use kp_01_conversation_store::ChatQueries;
use std::sync::Arc;
use tower::ServiceBuilder;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub queries: Arc<dyn ChatQueries>,
    pub config: Arc<GatewayConfig>,
}

/// Build the gateway router.
///
/// `/health` is open; everything under `/chat` requires a bearer token.
pub fn build_router(state: AppState, verifier: Arc<dyn TokenVerifier>) -> Router {
    let auth = AuthLayer::new(verifier, state.config.auth.clone());

    let chat = Router::new()
        .route("/chat/history", get(handlers::history))
        .route("/chat/rooms", get(handlers::chat_rooms))
        .route("/chat/timeline", get(handlers::timeline))
        .route("/chat/online/buddies", get(handlers::online_buddies))
        .route("/chat/online/status", get(handlers::online_status))
        .route("/chat/session", post(handlers::bootstrap_session))
        .route_layer(auth);

    let middleware = ServiceBuilder::new()
        .layer(create_cors_layer())
        .layer(TracingLayer::new());

    Router::new()
        .route("/health", get(handlers::health))
        .merge(chat)
        .layer(middleware)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::Hs256Verifier;
    use crate::domain::{AuthConfig, Claims};
    use crate::handlers::{OnlineStatus, SessionResponse};
    use crate::middleware::REQUEST_ID_HEADER;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use kp_01_conversation_store::{
        AllowAll, ConversationConfig, ConversationDependencies, ConversationService, EpochApi,
        InMemoryKVStore, Message, PresenceApi, ProfileApi, SystemTimeSource,
    };
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    type Service = ConversationService<InMemoryKVStore, SystemTimeSource>;

    const SECRET: &str = "test-secret";

    fn claims(sub: &str, aud: &str) -> Claims {
        Claims {
            aud: aud.into(),
            sub: sub.into(),
            name: format!("{sub} name"),
            first_name: sub.to_uppercase(),
            last_name: "Test".into(),
            profile_image: None,
            email: None,
            exp: None,
        }
    }

    fn bearer(sub: &str) -> String {
        let token = Hs256Verifier::new(SECRET).issue(&claims(sub, "web")).unwrap();
        format!("Bearer {token}")
    }

    fn setup(auth: AuthConfig) -> (Router, Arc<Service>) {
        let service = Arc::new(ConversationService::new(
            ConversationDependencies {
                kv_store: InMemoryKVStore::new(),
                time_source: SystemTimeSource,
            },
            ConversationConfig::default(),
        ));
        let state = AppState {
            queries: service.clone(),
            config: Arc::new(GatewayConfig {
                auth,
                ..Default::default()
            }),
        };
        (
            build_router(state, Arc::new(Hs256Verifier::new(SECRET))),
            service,
        )
    }

    fn get_as(uri: &str, user: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(user) = user {
            builder = builder.header("Authorization", bearer(user));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json<T: DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let (router, _) = setup(AuthConfig::default());
        let response = router.oneshot(get_as("/health", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let (router, _) = setup(AuthConfig::default());
        let response = router
            .oneshot(get_as("/chat/rooms", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = json(response).await;
        assert_eq!(body["code"], 1000);
        assert_eq!(body["message"], "token is missing");
    }

    #[tokio::test]
    async fn test_invalid_token_rejected() {
        let (router, _) = setup(AuthConfig::default());
        let request = Request::builder()
            .uri("/chat/rooms")
            .header("Authorization", "Bearer not.a.token")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        let body: serde_json::Value = json(response).await;
        assert_eq!(body["code"], 1001);
    }

    #[tokio::test]
    async fn test_wrong_audience_rejected_in_production() {
        let (router, _) = setup(AuthConfig {
            secret: SECRET.into(),
            audience: Some("mobile".into()),
            production: true,
        });
        let response = router
            .oneshot(get_as("/chat/rooms", Some("alice")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = json(response).await;
        assert_eq!(body["code"], 1002);
    }

    #[tokio::test]
    async fn test_history_for_token_subject() {
        let (router, service) = setup(AuthConfig::default());
        service
            .subscribe("bob|alice", "alice", 1, &AllowAll)
            .await
            .unwrap();
        service
            .flush("alice|bob", Message::new("bob", "alice|bob", "hi alice", 1))
            .await
            .unwrap();
        service.settle().await.unwrap();

        let response = router
            .clone()
            .oneshot(get_as("/chat/history?group=bob%7Calice", Some("alice")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let messages: Vec<Message> = json(response).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload, "hi alice");

        // An outsider has no pointer and sees nothing.
        let response = router
            .oneshot(get_as("/chat/history?group=alice%7Cbob", Some("eve")))
            .await
            .unwrap();
        let messages: Vec<Message> = json(response).await;
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_history_requires_group() {
        let (router, _) = setup(AuthConfig::default());
        let response = router
            .oneshot(get_as("/chat/history", Some("alice")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_history_bad_address() {
        let (router, _) = setup(AuthConfig::default());
        let response = router
            .oneshot(get_as("/chat/history?group=alice", Some("alice")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = json(response).await;
        assert_eq!(body["code"], 2000);
    }

    #[tokio::test]
    async fn test_online_status() {
        let (router, service) = setup(AuthConfig::default());
        service.add_online("bob").await.unwrap();

        let response = router
            .clone()
            .oneshot(get_as("/chat/online/status?user_id=bob", Some("alice")))
            .await
            .unwrap();
        let status: OnlineStatus = json(response).await;
        assert!(status.status);

        let response = router
            .oneshot(get_as("/chat/online/status?user_id=carol", Some("alice")))
            .await
            .unwrap();
        let status: OnlineStatus = json(response).await;
        assert!(!status.status);
    }

    #[tokio::test]
    async fn test_session_bootstrap_stores_profile() {
        let (router, service) = setup(AuthConfig::default());
        let request = Request::builder()
            .method("POST")
            .uri("/chat/session")
            .header("Authorization", bearer("alice"))
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let session: SessionResponse = json(response).await;

        assert_eq!(
            service.chat_token("alice").await.unwrap(),
            Some(session.chat_token)
        );
        let profile = service.basic_profile("alice").await.unwrap();
        assert_eq!(profile.first_name, "ALICE");
    }

    #[tokio::test]
    async fn test_rooms_and_buddies() {
        let (router, service) = setup(AuthConfig::default());
        service
            .subscribe("alice|bob", "alice", 1, &AllowAll)
            .await
            .unwrap();
        service.add_online("bob").await.unwrap();

        let response = router
            .clone()
            .oneshot(get_as("/chat/rooms", Some("alice")))
            .await
            .unwrap();
        let rooms: serde_json::Value = json(response).await;
        assert_eq!(rooms[0]["key"], "alice|bob");
        assert_eq!(rooms[0]["info"]["members"].as_array().unwrap().len(), 2);

        let response = router
            .oneshot(get_as("/chat/online/buddies", Some("alice")))
            .await
            .unwrap();
        let buddies: serde_json::Value = json(response).await;
        assert_eq!(buddies[0]["usr_id"], "bob");
    }
}

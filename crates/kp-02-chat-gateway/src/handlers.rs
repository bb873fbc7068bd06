//! Read-side HTTP handlers.
//!
//! Every `/chat` handler acts on behalf of the token subject; the auth layer
//! has already placed the verified [`Claims`] in the request extensions.

use crate::domain::{ApiError, ApiResult, Claims};
use crate::router::AppState;
use axum::extract::{Query, State};
use axum::{Extension, Json};
use kp_01_conversation_store::{
    ChatListEntry, HistoryApi, ListingApi, Message, PresenceApi, ProfileApi, ProfileBasics,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// Paging parameters. Unparseable values fall back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<String>,
    pub count: Option<String>,
}

impl PageQuery {
    pub fn resolve(&self, default_count: usize) -> (usize, usize) {
        let offset = parse_or(self.offset.as_deref(), 0);
        let count = parse_or(self.count.as_deref(), default_count);
        (offset, count)
    }
}

fn parse_or(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub group: Option<String>,
    pub offset: Option<String>,
    pub count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineStatus {
    pub status: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub chat_token: String,
    pub expires_at: Timestamp,
}

/// `GET /chat/history?group=&offset=&count=`
pub async fn history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let group = query
        .group
        .as_deref()
        .filter(|g| !g.is_empty())
        .ok_or_else(|| ApiError::invalid_request("group is required"))?;
    let page = PageQuery {
        offset: query.offset.clone(),
        count: query.count.clone(),
    };
    let (offset, count) = page.resolve(state.config.default_page_size);

    let messages = state.queries.scan(&claims.sub, group, offset, count).await?;
    debug!(user = %claims.sub, group, returned = messages.len(), "History served");
    Ok(Json(messages))
}

/// `GET /chat/rooms?offset=&count=`
pub async fn chat_rooms(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<ChatListEntry>>> {
    let (offset, count) = page.resolve(state.config.default_page_size);
    let rooms = state.queries.chat_rooms(&claims.sub, offset, count).await?;
    Ok(Json(rooms))
}

/// `GET /chat/timeline?offset=&count=`
pub async fn timeline(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<ChatListEntry>>> {
    let (offset, count) = page.resolve(state.config.default_page_size);
    let entries = state
        .queries
        .timeline(&claims.sub, offset, offset.saturating_add(count))
        .await?;
    Ok(Json(entries))
}

/// `GET /chat/online/buddies`
pub async fn online_buddies(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<ProfileBasics>>> {
    Ok(Json(state.queries.buddies_online(&claims.sub).await?))
}

/// `GET /chat/online/status?user_id=`
pub async fn online_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<OnlineStatus>> {
    let user = query
        .user_id
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::invalid_request("user_id is required"))?;
    let status = state.queries.is_online(user).await?;
    Ok(Json(OnlineStatus { status }))
}

/// `POST /chat/session`: store the caller's profile and mint a chat token.
pub async fn bootstrap_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<SessionResponse>> {
    let record = state
        .queries
        .bootstrap_session(claims.to_profile(), Uuid::new_v4().to_string())
        .await?;
    info!(user = %claims.sub, expires_at = record.expires_at, "Chat session bootstrapped");
    Ok(Json(SessionResponse {
        chat_token: record.token,
        expires_at: record.expires_at,
    }))
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

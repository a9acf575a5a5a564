use axum::{
    extract::{Path, Query, State},
    http::Method,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use murmur_shared::constants::MAX_NAME_CHARS;
use murmur_shared::protocol::{
    MessageDraft, MessagePayload, NotificationPayload, SendMessage, ServerEvent, UserSummary,
};
use murmur_shared::types::{GroupId, NotificationId, UserId};
use murmur_store::{Group, User};

use crate::auth::AuthUser;
use crate::error::ServerError;
use crate::friends::{self, PendingRequest};
use crate::groups;
use crate::messaging::{self, Conversation, ConversationSummary};
use crate::notifications;
use crate::state::AppState;
use crate::ws;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(ws::ws_handler))
        .route("/api/auth/register", post(register))
        .route("/api/friends", get(list_friends))
        .route("/api/friends/requests", get(list_requests))
        .route("/api/friends/search", get(search_users))
        .route("/api/friends/request", post(send_friend_request))
        .route("/api/friends/accept", post(accept_friend_request))
        .route("/api/friends/decline", post(decline_friend_request))
        .route("/api/friends/remove", post(remove_friend))
        .route("/api/groups", get(list_groups).post(create_group))
        .route("/api/groups/add-member", post(add_group_member))
        .route("/api/groups/remove-member", post(remove_group_member))
        .route("/api/messages/conversations", get(list_conversations))
        .route("/api/messages/:id", get(message_history).post(send_message))
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/unread", get(unread_count))
        .route("/api/notifications/mark-read", put(mark_read))
        .route("/api/notifications/mark-unread", put(mark_unread))
        .route("/api/notifications/mark-all-read", put(mark_all_read))
        .route("/api/notifications/:id", delete(delete_notification))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Health ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    instance: String,
    version: &'static str,
    online: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        instance: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        online: state.registry.len().await,
    })
}

// ─── Registration ───

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    username: String,
    email: String,
    #[serde(default)]
    profile_pic: Option<String>,
}

#[derive(Serialize)]
struct RegisterResponse {
    user: User,
    token: String,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ServerError> {
    if !state.config.registration_open {
        return Err(ServerError::Forbidden("registration is closed".into()));
    }

    let username = req.username.trim();
    if username.is_empty() || username.chars().count() > MAX_NAME_CHARS {
        return Err(ServerError::Validation(format!(
            "username must be 1 to {MAX_NAME_CHARS} characters"
        )));
    }
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ServerError::Validation("invalid email".into()));
    }
    let taken = || ServerError::Conflict("email already registered".into());
    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(taken());
    }

    let mut user = User::new(username, email);
    if let Some(pic) = req.profile_pic {
        user.profile_pic = pic;
    }
    // A concurrent registration can still win the insert.
    state.store.save_user(&user).await.map_err(|e| {
        if e.is_unique_violation() {
            taken()
        } else {
            ServerError::from(e)
        }
    })?;
    info!(user = %user.id, "User registered");

    let token = state.auth.issue(user.id);
    Ok(Json(RegisterResponse { user, token }))
}

// ─── Friends ───

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FriendRequestBody {
    to_user_id: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FromUserBody {
    from_user_id: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FriendIdBody {
    friend_id: UserId,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    query: String,
}

#[derive(Serialize)]
struct AcceptResponse {
    friend: UserSummary,
}

fn ok() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

async fn list_friends(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> Result<Json<Vec<UserSummary>>, ServerError> {
    Ok(Json(friends::list(&state, me.id).await?))
}

async fn list_requests(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> Result<Json<Vec<PendingRequest>>, ServerError> {
    Ok(Json(friends::pending(&state, me.id).await?))
}

async fn search_users(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<UserSummary>>, ServerError> {
    Ok(Json(friends::search(&state, me.id, &q.query).await?))
}

async fn send_friend_request(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Json(body): Json<FriendRequestBody>,
) -> Result<Json<serde_json::Value>, ServerError> {
    friends::send_request(&state, me.id, body.to_user_id).await?;
    Ok(ok())
}

async fn accept_friend_request(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Json(body): Json<FromUserBody>,
) -> Result<Json<AcceptResponse>, ServerError> {
    let friend = friends::accept(&state, me.id, body.from_user_id).await?;
    Ok(Json(AcceptResponse { friend }))
}

async fn decline_friend_request(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Json(body): Json<FromUserBody>,
) -> Result<Json<serde_json::Value>, ServerError> {
    friends::decline(&state, me.id, body.from_user_id).await?;
    Ok(ok())
}

async fn remove_friend(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Json(body): Json<FriendIdBody>,
) -> Result<Json<serde_json::Value>, ServerError> {
    friends::remove(&state, me.id, body.friend_id).await?;
    Ok(ok())
}

// ─── Groups ───

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGroupRequest {
    name: String,
    #[serde(default)]
    members: Vec<UserId>,
    #[serde(default)]
    profile_pic: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddMemberRequest {
    group_id: GroupId,
    user_id_to_add: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveMemberRequest {
    group_id: GroupId,
    user_id_to_remove: UserId,
}

async fn list_groups(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> Result<Json<Vec<Group>>, ServerError> {
    Ok(Json(groups::list(&state, &me).await?))
}

async fn create_group(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Json(req): Json<CreateGroupRequest>,
) -> Result<Json<Group>, ServerError> {
    let group = groups::create(&state, &me, &req.name, &req.members, req.profile_pic).await?;
    Ok(Json(group))
}

async fn add_group_member(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Json(req): Json<AddMemberRequest>,
) -> Result<Json<Group>, ServerError> {
    let group = groups::add_member(&state, &me, req.group_id, req.user_id_to_add).await?;
    Ok(Json(group))
}

async fn remove_group_member(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Json(req): Json<RemoveMemberRequest>,
) -> Result<Json<Group>, ServerError> {
    let group = groups::remove_member(&state, &me, req.group_id, req.user_id_to_remove).await?;
    Ok(Json(group))
}

// ─── Messages ───

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    is_group: bool,
    #[serde(default)]
    active_chat_user_id: Option<String>,
}

#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

async fn send_message(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(to): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<MessagePayload>, ServerError> {
    let send = SendMessage {
        to,
        message: MessageDraft {
            text: req.text,
            image: req.image,
        },
        is_group: req.is_group,
        active_chat_user_id: req.active_chat_user_id,
    };
    let message = messaging::send_message(&state, &me, &send).await?;
    Ok(Json(message.to_payload()))
}

async fn list_conversations(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> Result<Json<Vec<ConversationSummary>>, ServerError> {
    Ok(Json(messaging::conversations(&state, &me).await?))
}

async fn message_history(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessagePayload>>, ServerError> {
    let conversation = match query.kind.as_deref() {
        Some("group") => Conversation::Group(GroupId(id)),
        None | Some("direct") => Conversation::Direct(UserId(id)),
        Some(other) => {
            return Err(ServerError::Validation(format!(
                "unknown conversation type: {other}"
            )));
        }
    };
    Ok(Json(messaging::history(&state, &me, conversation).await?))
}

// ─── Notifications ───

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationIdsRequest {
    notification_ids: Vec<NotificationId>,
}

#[derive(Serialize)]
struct CountResponse {
    count: u64,
}

#[derive(Serialize)]
struct UpdatedResponse {
    updated: u64,
}

async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> Result<Json<Vec<NotificationPayload>>, ServerError> {
    Ok(Json(notifications::list(&state, me.id).await?))
}

async fn unread_count(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> Result<Json<CountResponse>, ServerError> {
    let count = notifications::unread_count(&state, me.id).await?;
    Ok(Json(CountResponse { count }))
}

async fn mark_read(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Json(req): Json<NotificationIdsRequest>,
) -> Result<Json<UpdatedResponse>, ServerError> {
    let updated = notifications::set_read(&state, me.id, &req.notification_ids, true).await?;
    state
        .router
        .deliver_to_user(me.id, ServerEvent::NotificationsMarkedRead(req.notification_ids))
        .await;
    Ok(Json(UpdatedResponse { updated }))
}

async fn mark_unread(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Json(req): Json<NotificationIdsRequest>,
) -> Result<Json<UpdatedResponse>, ServerError> {
    let updated = notifications::set_read(&state, me.id, &req.notification_ids, false).await?;
    Ok(Json(UpdatedResponse { updated }))
}

async fn mark_all_read(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> Result<Json<UpdatedResponse>, ServerError> {
    let updated = notifications::mark_all_read(&state, me.id).await?;
    state
        .router
        .deliver_to_user(me.id, ServerEvent::AllNotificationsMarkedRead)
        .await;
    Ok(Json(UpdatedResponse { updated }))
}

async fn delete_notification(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<NotificationId>,
) -> Result<Json<serde_json::Value>, ServerError> {
    notifications::delete(&state, me.id, id).await?;
    state
        .router
        .deliver_to_user(me.id, ServerEvent::NotificationDeleted(id))
        .await;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use std::sync::Arc;

    use crate::test_support::{connect, drain, seed_user, test_state, test_state_with, FaultyStore};

    async fn call(
        app: Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let state = test_state();
        let (status, body) = call(build_router(state), Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["instance"], "murmur");
        assert_eq!(body["online"], 0);
    }

    #[tokio::test]
    async fn test_register_then_use_token() {
        let state = test_state();
        let app = build_router(state.clone());
        let (status, body) = call(
            app.clone(),
            Method::POST,
            "/api/auth/register",
            None,
            Some(serde_json::json!({ "username": "ada", "email": "ada@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();
        assert_eq!(body["user"]["username"], "ada");

        let (status, _) = call(
            app.clone(),
            Method::POST,
            "/api/auth/register",
            None,
            Some(serde_json::json!({ "username": "ada2", "email": "ADA@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(app, Method::GET, "/api/friends", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_registration_closed() {
        let mut state = test_state();
        let mut config = (*state.config).clone();
        config.registration_open = false;
        state.config = std::sync::Arc::new(config);

        let (status, _) = call(
            build_router(state),
            Method::POST,
            "/api/auth/register",
            None,
            Some(serde_json::json!({ "username": "ada", "email": "ada@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_requires_auth() {
        let state = test_state();
        let app = build_router(state);
        let (status, body) = call(app.clone(), Method::GET, "/api/notifications", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) = call(app, Method::GET, "/api/notifications", Some("nope"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_friend_flow_over_rest() {
        let state = test_state();
        let app = build_router(state.clone());
        let ada = seed_user(&state, "ada").await;
        let bob = seed_user(&state, "bob").await;
        let ada_token = state.auth.issue(ada.id);
        let bob_token = state.auth.issue(bob.id);
        let (_bob_session, mut bob_rx) = connect(&state, &bob).await;
        drain(&mut bob_rx);

        let (status, _) = call(
            app.clone(),
            Method::POST,
            "/api/friends/request",
            Some(ada_token.as_str()),
            Some(serde_json::json!({ "toUserId": ada.id })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            app.clone(),
            Method::POST,
            "/api/friends/request",
            Some(ada_token.as_str()),
            Some(serde_json::json!({ "toUserId": bob.id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(matches!(drain(&mut bob_rx).as_slice(), [ServerEvent::Notification(_)]));

        let (status, body) = call(
            app.clone(),
            Method::POST,
            "/api/friends/decline",
            Some(bob_token.as_str()),
            Some(serde_json::json!({ "fromUserId": ada.id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (status, _) = call(
            app,
            Method::POST,
            "/api/friends/request",
            Some(ada_token.as_str()),
            Some(serde_json::json!({ "toUserId": bob.id })),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_send_and_read_history_over_rest() {
        let state = test_state();
        let app = build_router(state.clone());
        let ada = seed_user(&state, "ada").await;
        let bob = seed_user(&state, "bob").await;
        let ada_token = state.auth.issue(ada.id);

        let (status, body) = call(
            app.clone(),
            Method::POST,
            &format!("/api/messages/{}", bob.id),
            Some(ada_token.as_str()),
            Some(serde_json::json!({ "text": "hi bob", "isGroup": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["senderId"], serde_json::json!(ada.id));

        let (status, body) = call(
            app,
            Method::GET,
            &format!("/api/messages/{}?type=direct", bob.id),
            Some(ada_token.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["text"], "hi bob");
    }

    #[tokio::test]
    async fn test_notification_routes_ack_live_session() {
        let state = test_state();
        let app = build_router(state.clone());
        let ada = seed_user(&state, "ada").await;
        let bob = seed_user(&state, "bob").await;
        let ada_token = state.auth.issue(ada.id);
        let n = murmur_store::Notification::new(
            ada.id,
            bob.id,
            murmur_shared::types::NotificationKind::Message,
            "bob sent you a message",
        );
        state.store.create_notification(&n).await.unwrap();
        let (_session, mut rx) = connect(&state, &ada).await;
        drain(&mut rx);

        let (_, body) = call(app.clone(), Method::GET, "/api/notifications/unread", Some(ada_token.as_str()), None).await;
        assert_eq!(body["count"], 1);

        let (_, body) = call(app.clone(), Method::GET, "/api/notifications", Some(ada_token.as_str()), None).await;
        assert_eq!(body[0]["sender"]["username"], "bob");
        assert_eq!(body[0]["type"], "message");

        let mark = serde_json::json!({ "notificationIds": [n.id] });
        let (_, body) = call(
            app.clone(),
            Method::PUT,
            "/api/notifications/mark-read",
            Some(ada_token.as_str()),
            Some(mark.clone()),
        )
        .await;
        assert_eq!(body["updated"], 1);
        let (_, body) = call(
            app.clone(),
            Method::PUT,
            "/api/notifications/mark-read",
            Some(ada_token.as_str()),
            Some(mark),
        )
        .await;
        assert_eq!(body["updated"], 0);
        let acks = drain(&mut rx);
        assert_eq!(acks.len(), 2);
        assert!(acks.iter().all(|e| matches!(e, ServerEvent::NotificationsMarkedRead(ids) if ids == &vec![n.id])));

        let (status, _) = call(
            app.clone(),
            Method::DELETE,
            &format!("/api/notifications/{}", n.id),
            Some(ada_token.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(matches!(drain(&mut rx).as_slice(), [ServerEvent::NotificationDeleted(id)] if *id == n.id));

        let (status, _) = call(
            app,
            Method::DELETE,
            &format!("/api/notifications/{}", n.id),
            Some(ada_token.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_racing_registration_is_a_conflict() {
        let store = Arc::new(FaultyStore::new());
        let state = test_state_with(store.clone());
        let app = build_router(state);
        let body = serde_json::json!({ "username": "ada", "email": "ada@example.com" });

        let (status, _) = call(app.clone(), Method::POST, "/api/auth/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::OK);

        // The duplicate check misses, so only the unique index catches it.
        store.miss_email_lookups(true);
        let again = serde_json::json!({ "username": "ada2", "email": "Ada@Example.com" });
        let (status, body) = call(app, Method::POST, "/api/auth/register", None, Some(again)).await;
        assert_eq!(status, StatusCode::CONFLICT, "{body}");
    }

    #[tokio::test]
    async fn test_search_users_over_rest() {
        let state = test_state();
        let app = build_router(state.clone());
        let ada = seed_user(&state, "ada").await;
        let adele = seed_user(&state, "Adele").await;
        seed_user(&state, "bob").await;
        let token = state.auth.issue(ada.id);

        let (status, body) = call(
            app.clone(),
            Method::GET,
            "/api/friends/search?query=ad",
            Some(token.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["_id"], serde_json::json!(adele.id));

        let (status, _) = call(app, Method::GET, "/api/friends/search?query=", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_conversations_over_rest() {
        let state = test_state();
        let app = build_router(state.clone());
        let ada = seed_user(&state, "ada").await;
        let bob = seed_user(&state, "bob").await;
        let ada_token = state.auth.issue(ada.id);
        let bob_token = state.auth.issue(bob.id);

        friends::send_request(&state, ada.id, bob.id).await.unwrap();
        friends::accept(&state, bob.id, ada.id).await.unwrap();
        let group = groups::create(&state, &ada, "crew", &[], None).await.unwrap();

        let (status, _) = call(
            app.clone(),
            Method::POST,
            &format!("/api/messages/{}", ada.id),
            Some(bob_token.as_str()),
            Some(serde_json::json!({ "text": "hi ada", "isGroup": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            app,
            Method::GET,
            "/api/messages/conversations",
            Some(ada_token.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(2));
        assert_eq!(body[0]["type"], "user");
        assert_eq!(body[0]["_id"], serde_json::json!(bob.id));
        assert!(body[0]["lastMessageTime"].is_string());
        assert_eq!(body[1]["type"], "group");
        assert_eq!(body[1]["_id"], serde_json::json!(group.id));
        assert!(body[1]["lastMessageTime"].is_null());
    }
}

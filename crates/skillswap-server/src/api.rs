use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, Method, StatusCode},
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use skillswap_relay::Hub;
use skillswap_shared::{SessionId, UserId};
use skillswap_store::{CallSession, Note, Recording};

use crate::auth::{AuthUser, Authenticator};
use crate::config::ServerConfig;
use crate::directory::SharedDb;
use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::{friends, gateway, ratings};

#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub db: SharedDb,
    pub auth: Arc<dyn Authenticator>,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
    pub started_at: Instant,
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/ice-servers", get(ice_servers))
        .route("/calls", get(list_calls).post(create_call))
        .route("/calls/:id", get(get_call))
        .route("/calls/:id/end", post(end_call))
        .route("/calls/:id/recording", get(get_recording))
        .route("/calls/:id/notes", post(save_notes))
        .route("/calls/:id/rating", post(ratings::submit_rating))
        .route("/users/:id/ratings", get(ratings::user_ratings))
        .route("/users/:id/ratings/average", get(ratings::user_average))
        .route("/friends/list", get(friends::list_friends))
        .route("/friends/request", post(friends::send_request))
        .route("/friends/request/cancel", delete(friends::cancel_request))
        .route("/friends/requests", get(friends::incoming_requests))
        .route("/friends/requests/outgoing", get(friends::outgoing_requests))
        .route("/friends/accept", post(friends::accept_request))
        .route("/friends/reject", post(friends::reject_request))
        .route("/friends/unfriend", post(friends::unfriend))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/ws", get(gateway::ws_handler))
        .nest("/api", api)
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if config.client_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .client_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CLIENT_ORIGINS entry");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    ring_timeout_secs: u64,
    typing_timeout_secs: u64,
    online_users: usize,
    uptime_secs: u64,
}

#[derive(Serialize)]
struct IceServer {
    urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IceServersResponse {
    ice_servers: Vec<IceServer>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCallRequest {
    peer_id: UserId,
}

#[derive(Deserialize)]
struct NotesRequest {
    content: String,
}

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

/// `?page=&limit=`, 1-based.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    page: Option<u32>,
    limit: Option<u32>,
}

impl PageParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    data: Vec<T>,
    total_pages: u64,
    current_page: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, params: &PageParams) -> Self {
        Self {
            data,
            total_pages: total.div_ceil(u64::from(params.limit())),
            current_page: params.page(),
        }
    }
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        ring_timeout_secs: state.config.ring_timeout.as_secs(),
        typing_timeout_secs: state.config.typing_timeout.as_secs(),
        online_users: state.hub.online_users().len(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

async fn ice_servers(State(state): State<AppState>, _user: AuthUser) -> Json<IceServersResponse> {
    let config = &state.config;
    let mut servers = Vec::new();
    if !config.stun_urls.is_empty() {
        servers.push(IceServer {
            urls: config.stun_urls.clone(),
            username: None,
            credential: None,
        });
    }
    if config.turn_enabled() {
        servers.push(IceServer {
            urls: config.turn_urls.clone(),
            username: config.turn_user.clone(),
            credential: config.turn_password.clone(),
        });
    }
    Json(IceServersResponse {
        ice_servers: servers,
    })
}

async fn create_call(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateCallRequest>,
) -> Result<(StatusCode, Json<CallSession>), ServerError> {
    if req.peer_id == user {
        return Err(ServerError::BadRequest(
            "Cannot start a call with yourself".into(),
        ));
    }

    let db = state.db.lock().await;
    if !db.are_friends(&user, &req.peer_id)? {
        return Err(ServerError::Forbidden("Not friends".into()));
    }
    if let Some(existing) = db.find_open_session_for_pair(&user, &req.peer_id)? {
        return Err(ServerError::Conflict {
            message: "Session already exists".into(),
            session_id: Some(existing.id),
        });
    }

    let session = db.create_session(&user, &req.peer_id)?;
    info!(session = %session.id, user = %user, peer = %req.peer_id, "Call session created via API");
    Ok((StatusCode::CREATED, Json(session)))
}

/// The caller's call history, newest first.
async fn list_calls(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<CallSession>>, ServerError> {
    let db = state.db.lock().await;
    let (sessions, total) = db.sessions_for_user(&user, params.limit(), params.offset())?;
    Ok(Json(Page::new(sessions, total, &params)))
}

/// Load a session the caller takes part in.
pub(crate) fn participant_session(
    db: &skillswap_store::Database,
    id: SessionId,
    user: &UserId,
) -> Result<CallSession, ServerError> {
    let session = db.get_session(id)?;
    if !session.has_participant(user) {
        return Err(ServerError::Forbidden("Forbidden".into()));
    }
    Ok(session)
}

async fn get_call(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<SessionId>,
) -> Result<Json<CallSession>, ServerError> {
    let db = state.db.lock().await;
    Ok(Json(participant_session(&db, id, &user)?))
}

async fn end_call(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<SessionId>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let db = state.db.lock().await;
    participant_session(&db, id, &user)?;
    let session = db.end_session(id)?;
    info!(session = %session.id, user = %user, "Call session ended");
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn get_recording(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<SessionId>,
) -> Result<Json<Recording>, ServerError> {
    let db = state.db.lock().await;
    Ok(Json(participant_session(&db, id, &user)?.recording))
}

async fn save_notes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<SessionId>,
    Json(req): Json<NotesRequest>,
) -> Result<Json<Note>, ServerError> {
    let db = state.db.lock().await;
    participant_session(&db, id, &user)?;
    let note = db.upsert_session_notes(id, &req.content)?;
    Ok(Json(note))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    use skillswap_relay::Hub;
    use skillswap_shared::UserId;
    use skillswap_store::Database;

    use super::{build_router, AppState, PageParams, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
    use crate::auth::{sign_token, JwtAuthenticator};
    use crate::config::ServerConfig;
    use crate::directory::{SharedDb, StoreDirectory};
    use crate::rate_limit::RateLimiter;

    pub(crate) const SECRET: &str = "router-secret";

    pub(crate) fn test_state() -> AppState {
        test_state_with(RateLimiter::new(100.0, 100.0))
    }

    pub(crate) fn test_state_with(rate_limiter: RateLimiter) -> AppState {
        let db: SharedDb = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let config = ServerConfig {
            access_token_secret: Some(SECRET.into()),
            ..ServerConfig::default()
        };
        let directory = Arc::new(StoreDirectory::new(db.clone()));
        AppState {
            hub: Hub::new(config.relay_config(), directory.clone(), directory),
            auth: Arc::new(JwtAuthenticator::new(Some(SECRET), db.clone())),
            db,
            rate_limiter,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    pub(crate) async fn seed(state: &AppState, users: &[&str], friends: &[(&str, &str)]) {
        let db = state.db.lock().await;
        for u in users {
            db.upsert_user(&UserId::new(*u).unwrap(), None).unwrap();
        }
        for (a, b) in friends {
            db.add_friendship(&UserId::new(*a).unwrap(), &UserId::new(*b).unwrap())
                .unwrap();
        }
    }

    pub(crate) fn token(user: &str) -> String {
        sign_token(SECRET.as_bytes(), user, None)
    }

    pub(crate) async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = build_router(test_state());
        let (status, body) = call(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        let state = test_state();
        seed(&state, &["alice"], &[]).await;
        let app = build_router(state);

        let (status, _) = call(&app, "GET", "/api/ice-servers", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let forged = Request::builder()
            .uri("/api/ice-servers")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", sign_token(b"other-secret", "alice", None)),
            )
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(forged).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let (status, body) = call(&app, "GET", "/api/ice-servers", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["iceServers"][0]["urls"][0], "stun:stun.l.google.com:19302");
        assert_eq!(body["iceServers"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fresh_database_accepts_signed_tokens() {
        let state = test_state();
        let db = state.db.clone();
        let app = build_router(state);

        let (status, _) = call(&app, "GET", "/api/ice-servers", Some("newcomer"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(db
            .lock()
            .await
            .user_exists(&UserId::new("newcomer").unwrap())
            .unwrap());
    }

    #[tokio::test]
    async fn test_call_history_pages() {
        let state = test_state();
        seed(
            &state,
            &["alice", "bob", "carol"],
            &[("alice", "bob"), ("alice", "carol")],
        )
        .await;
        let app = build_router(state);

        let (_, first) =
            call(&app, "POST", "/api/calls", Some("alice"), Some(json!({ "peerId": "bob" }))).await;
        let (_, second) =
            call(&app, "POST", "/api/calls", Some("carol"), Some(json!({ "peerId": "alice" }))).await;

        let (status, page) = call(&app, "GET", "/api/calls?limit=1", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["totalPages"], 2);
        assert_eq!(page["currentPage"], 1);
        assert_eq!(page["data"][0]["id"], second["id"]);

        let (_, page) = call(&app, "GET", "/api/calls?limit=1&page=2", Some("alice"), None).await;
        assert_eq!(page["data"][0]["id"], first["id"]);

        let (_, bobs) = call(&app, "GET", "/api/calls", Some("bob"), None).await;
        assert_eq!(bobs["data"].as_array().unwrap().len(), 1);
        assert_eq!(bobs["totalPages"], 1);
    }

    #[test]
    fn test_page_params_bounds() {
        let params = PageParams {
            page: Some(0),
            limit: Some(500),
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), MAX_PAGE_SIZE);
        assert_eq!(params.offset(), 0);

        let defaults = PageParams::default();
        assert_eq!(defaults.limit(), DEFAULT_PAGE_SIZE);

        let third = PageParams {
            page: Some(3),
            limit: Some(5),
        };
        assert_eq!(third.offset(), 10);
    }

    #[tokio::test]
    async fn test_create_call_rules() {
        let state = test_state();
        seed(&state, &["alice", "bob", "carol"], &[("alice", "bob")]).await;
        let app = build_router(state);

        let (status, _) =
            call(&app, "POST", "/api/calls", Some("alice"), Some(json!({ "peerId": "alice" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            call(&app, "POST", "/api/calls", Some("alice"), Some(json!({ "peerId": "carol" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Not friends");

        let (status, created) =
            call(&app, "POST", "/api/calls", Some("alice"), Some(json!({ "peerId": "bob" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["recording"]["status"], "none");
        assert!(created["endedAt"].is_null());

        let (status, body) =
            call(&app, "POST", "/api/calls", Some("bob"), Some(json!({ "peerId": "alice" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["sessionId"], created["id"]);
    }

    #[tokio::test]
    async fn test_session_access_and_end() {
        let state = test_state();
        seed(&state, &["alice", "bob", "carol"], &[("alice", "bob")]).await;
        let app = build_router(state);

        let (_, created) =
            call(&app, "POST", "/api/calls", Some("alice"), Some(json!({ "peerId": "bob" }))).await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, fetched) = call(&app, "GET", &format!("/api/calls/{id}"), Some("bob"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["id"], created["id"]);

        let (status, _) = call(&app, "GET", &format!("/api/calls/{id}"), Some("carol"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let unknown = skillswap_shared::SessionId::new();
        let (status, _) = call(&app, "GET", &format!("/api/calls/{unknown}"), Some("bob"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&app, "POST", &format!("/api/calls/{id}/end"), Some("bob"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));

        let (status, body) = call(&app, "POST", &format!("/api/calls/{id}/end"), Some("alice"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Session already ended");

        // The pair may open a new session once the old one is ended.
        let (status, _) =
            call(&app, "POST", "/api/calls", Some("bob"), Some(json!({ "peerId": "alice" }))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_recording_and_notes() {
        let state = test_state();
        seed(&state, &["alice", "bob"], &[("alice", "bob")]).await;
        let app = build_router(state);

        let (_, created) =
            call(&app, "POST", "/api/calls", Some("alice"), Some(json!({ "peerId": "bob" }))).await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, recording) =
            call(&app, "GET", &format!("/api/calls/{id}/recording"), Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(recording["status"], "none");

        let uri = format!("/api/calls/{id}/notes");
        let (status, first) =
            call(&app, "POST", &uri, Some("alice"), Some(json!({ "content": "draft" }))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, second) =
            call(&app, "POST", &uri, Some("bob"), Some(json!({ "content": "" }))).await;
        assert_eq!(first["id"], second["id"]);
        assert_eq!(second["content"], "");

        let (_, fetched) = call(&app, "GET", &format!("/api/calls/{id}"), Some("bob"), None).await;
        assert_eq!(fetched["notesId"], first["id"]);
    }

    #[tokio::test]
    async fn test_rate_limit_applies_to_api_only() {
        let state = test_state_with(RateLimiter::new(0.0, 1.0));
        seed(&state, &["alice"], &[]).await;
        let app = build_router(state);

        let forwarded = |uri: &str| {
            Request::builder()
                .uri(uri)
                .header("x-forwarded-for", "203.0.113.9")
                .header(header::AUTHORIZATION, format!("Bearer {}", token("alice")))
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(forwarded("/api/ice-servers")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = app.clone().oneshot(forwarded("/api/ice-servers")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key(header::RETRY_AFTER));

        let health = app.clone().oneshot(forwarded("/health")).await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }
}

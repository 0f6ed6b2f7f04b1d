//! Friend requests and the friend list.
//!
//! Calls and collaboration are only allowed between friends, so this is how
//! a fresh deployment gets from accounts to a first call.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use skillswap_shared::UserId;
use skillswap_store::{Database, Friend, FriendRequest, StoreError};

use crate::api::AppState;
use crate::auth::AuthUser;
use crate::error::ServerError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetBody {
    target_id: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondBody {
    #[serde(alias = "notifId")]
    request_id: Uuid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnfriendBody {
    friend_id: UserId,
}

#[derive(Serialize)]
pub struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
pub struct RequestResponse {
    message: &'static str,
    request: FriendRequest,
}

pub async fn send_request(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<TargetBody>,
) -> Result<Json<RequestResponse>, ServerError> {
    let db = state.db.lock().await;
    let request = db
        .send_friend_request(&user, &body.target_id)
        .map_err(|e| match e {
            StoreError::NotFound => ServerError::NotFound("Target user not found".into()),
            other => other.into(),
        })?;

    info!(user = %user, target = %body.target_id, "Friend request sent");
    Ok(Json(RequestResponse {
        message: "Friend request sent",
        request,
    }))
}

pub async fn incoming_requests(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<FriendRequest>>, ServerError> {
    let db = state.db.lock().await;
    Ok(Json(db.incoming_friend_requests(&user)?))
}

pub async fn outgoing_requests(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<FriendRequest>>, ServerError> {
    let db = state.db.lock().await;
    Ok(Json(db.outgoing_friend_requests(&user)?))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<TargetBody>,
) -> Result<Json<MessageResponse>, ServerError> {
    let db = state.db.lock().await;
    if !db.cancel_friend_request(&user, &body.target_id)? {
        return Err(ServerError::NotFound(
            "No pending request found to cancel".into(),
        ));
    }
    Ok(Json(MessageResponse {
        message: "Friend request cancelled",
    }))
}

/// Settle a request addressed to `user`.
fn respond(
    db: &Database,
    user: &UserId,
    id: Uuid,
    accept: bool,
) -> Result<FriendRequest, ServerError> {
    let request = db.get_friend_request(id).map_err(|e| match e {
        StoreError::NotFound => ServerError::NotFound("Request not found".into()),
        other => other.into(),
    })?;
    if &request.receiver_id != user {
        return Err(ServerError::Forbidden(
            "Not authorized to answer this request".into(),
        ));
    }
    Ok(db.respond_to_friend_request(id, accept)?)
}

pub async fn accept_request(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<RespondBody>,
) -> Result<Json<RequestResponse>, ServerError> {
    let db = state.db.lock().await;
    let request = respond(&db, &user, body.request_id, true)?;
    info!(user = %user, friend = %request.sender_id, "Friend request accepted");
    Ok(Json(RequestResponse {
        message: "Friend request accepted",
        request,
    }))
}

pub async fn reject_request(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<RespondBody>,
) -> Result<Json<RequestResponse>, ServerError> {
    let db = state.db.lock().await;
    let request = respond(&db, &user, body.request_id, false)?;
    Ok(Json(RequestResponse {
        message: "Friend request rejected",
        request,
    }))
}

pub async fn unfriend(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<UnfriendBody>,
) -> Result<Json<MessageResponse>, ServerError> {
    let db = state.db.lock().await;
    let removed = db.remove_friendship(&user, &body.friend_id)?;
    db.clear_friend_requests(&user, &body.friend_id)?;
    if !removed {
        return Err(ServerError::NotFound("Not friends".into()));
    }

    info!(user = %user, former = %body.friend_id, "Unfriended");
    Ok(Json(MessageResponse {
        message: "Unfriended successfully",
    }))
}

pub async fn list_friends(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Friend>>, ServerError> {
    let db = state.db.lock().await;
    Ok(Json(db.list_friends(&user)?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::build_router;
    use crate::api::tests::{call, seed, test_state};

    #[tokio::test]
    async fn test_fresh_deploy_reaches_a_first_call() {
        let app = build_router(test_state());

        // Both sides sign in once, which provisions their accounts.
        for user in ["alice", "bob"] {
            let (status, _) = call(&app, "GET", "/api/friends/list", Some(user), None).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, sent) = call(
            &app,
            "POST",
            "/api/friends/request",
            Some("alice"),
            Some(json!({ "targetId": "bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sent["request"]["status"], "pending");

        let (_, incoming) = call(&app, "GET", "/api/friends/requests", Some("bob"), None).await;
        assert_eq!(incoming[0]["senderId"], "alice");
        let request_id = incoming[0]["id"].clone();

        let (status, accepted) = call(
            &app,
            "POST",
            "/api/friends/accept",
            Some("bob"),
            Some(json!({ "requestId": request_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(accepted["request"]["status"], "accepted");

        let (_, list) = call(&app, "GET", "/api/friends/list", Some("alice"), None).await;
        assert_eq!(list[0]["id"], "bob");

        let (status, _) =
            call(&app, "POST", "/api/calls", Some("alice"), Some(json!({ "peerId": "bob" }))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_request_errors() {
        let state = test_state();
        seed(&state, &["alice", "bob", "carol"], &[]).await;
        let app = build_router(state);

        let (status, body) = call(
            &app,
            "POST",
            "/api/friends/request",
            Some("alice"),
            Some(json!({ "targetId": "nobody" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Target user not found");

        let (status, _) = call(
            &app,
            "POST",
            "/api/friends/request",
            Some("alice"),
            Some(json!({ "targetId": "alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, sent) = call(
            &app,
            "POST",
            "/api/friends/request",
            Some("alice"),
            Some(json!({ "targetId": "bob" })),
        )
        .await;
        let (status, _) = call(
            &app,
            "POST",
            "/api/friends/request",
            Some("bob"),
            Some(json!({ "targetId": "alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Only the receiver may answer.
        let id = sent["request"]["id"].clone();
        let (status, _) = call(
            &app,
            "POST",
            "/api/friends/accept",
            Some("carol"),
            Some(json!({ "requestId": id })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            &app,
            "POST",
            "/api/friends/reject",
            Some("bob"),
            Some(json!({ "requestId": id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(
            &app,
            "POST",
            "/api/friends/accept",
            Some("bob"),
            Some(json!({ "requestId": id })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(
            &app,
            "POST",
            "/api/friends/accept",
            Some("bob"),
            Some(json!({ "requestId": uuid::Uuid::new_v4() })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_and_unfriend() {
        let state = test_state();
        seed(&state, &["alice", "bob"], &[]).await;
        let app = build_router(state);

        call(
            &app,
            "POST",
            "/api/friends/request",
            Some("alice"),
            Some(json!({ "targetId": "bob" })),
        )
        .await;
        let (_, outgoing) =
            call(&app, "GET", "/api/friends/requests/outgoing", Some("alice"), None).await;
        assert_eq!(outgoing.as_array().unwrap().len(), 1);

        let cancel = Some(json!({ "targetId": "bob" }));
        let (status, _) =
            call(&app, "DELETE", "/api/friends/request/cancel", Some("alice"), cancel.clone()).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) =
            call(&app, "DELETE", "/api/friends/request/cancel", Some("alice"), cancel).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, sent) = call(
            &app,
            "POST",
            "/api/friends/request",
            Some("bob"),
            Some(json!({ "targetId": "alice" })),
        )
        .await;
        call(
            &app,
            "POST",
            "/api/friends/accept",
            Some("alice"),
            Some(json!({ "requestId": sent["request"]["id"] })),
        )
        .await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/friends/unfriend",
            Some("alice"),
            Some(json!({ "friendId": "bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Unfriended successfully");

        let (_, list) = call(&app, "GET", "/api/friends/list", Some("bob"), None).await;
        assert_eq!(list, json!([]));
        let (status, _) =
            call(&app, "POST", "/api/calls", Some("alice"), Some(json!({ "peerId": "bob" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}

//! WebSocket gateway: authenticates the upgrade, then pumps frames between
//! the socket and the relay hub.
//!
//! Each connection gets one writer task draining its outbox and one reader
//! loop that handles inbound events in arrival order.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use skillswap_shared::protocol::ClientEvent;
use skillswap_shared::UserId;

use crate::api::AppState;
use crate::auth::bearer_token;

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// The handshake credential: `?token=` wins over the bearer header.
fn handshake_token<'a>(params: &'a WsParams, headers: &'a HeaderMap) -> Option<&'a str> {
    params
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(headers))
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let Some(token) = handshake_token(&params, &headers) else {
        debug!("WebSocket handshake without credential");
        return (StatusCode::UNAUTHORIZED, "Missing access token").into_response();
    };
    let Some(user) = state.auth.verify_and_resolve_user(token).await else {
        warn!("WebSocket handshake with invalid credential");
        return (StatusCode::UNAUTHORIZED, "Invalid access token").into_response();
    };

    let Some(ws) = ws else {
        return (StatusCode::UPGRADE_REQUIRED, "Expected a WebSocket upgrade").into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

async fn handle_socket(socket: WebSocket, state: AppState, user: UserId) {
    let hub = state.hub;
    let (mut sender, mut receiver) = socket.split();

    let (outbox, mut rx) = hub.outbox();
    let ctx = hub.connect(user, outbox);
    info!(user = %ctx.user, conn = %ctx.connection.short(), "WebSocket connected");

    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match event.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to encode server event");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(conn = %ctx.connection.short(), error = %e, "WebSocket read failed");
                break;
            }
        };

        match ClientEvent::from_json(&text) {
            Ok(event) => hub.handle(&ctx, event).await,
            Err(e) => {
                debug!(conn = %ctx.connection.short(), error = %e, "Dropping malformed frame");
            }
        }
    }

    hub.disconnect(&ctx);
    send_task.abort();
    info!(user = %ctx.user, conn = %ctx.connection.short(), "WebSocket disconnected");
}

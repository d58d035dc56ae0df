//! WebSocket handler for conversation presence.
//!
//! DESIGN
//! ======
//! The upgrade is authorized from the `token` query parameter, since browser
//! websockets cannot set headers. After upgrade the client joins its
//! conversation room and the connection runs a `select!` loop:
//! - inbound `scroll_position_update` → stamped with the authenticated user
//!   and broadcast to the room as `user_scroll_position`, sender excluded
//! - frames relayed from peers → forwarded to this client
//!
//! Malformed or unknown inbound frames are logged and dropped; they never
//! close the socket.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → verify token (401 when missing or unknown)
//! 2. Join room
//! 3. Relay until the socket closes
//! 4. Part room (evicting it when empty)

#[cfg(test)]
#[path = "ws_test.rs"]
mod ws_test;

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use frames::ServerFrame;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{AuthError, Identity};
use crate::services;
use crate::state::{AppState, ConversationId};

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = params.get("token").filter(|t| !t.is_empty()) else {
        return (StatusCode::UNAUTHORIZED, "token required").into_response();
    };

    let identity = match state.verifier.verify(token).await {
        Ok(identity) => identity,
        Err(AuthError::UnknownToken) => {
            info!(conversation_id, "ws: rejected unknown token");
            return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
        }
        Err(e) => {
            error!(conversation_id, error = %e, "ws: token verification failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "token verification error").into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, conversation_id, identity))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, conversation_id: ConversationId, identity: Identity) {
    let client_id = Uuid::new_v4();
    let (client_tx, mut client_rx) = mpsc::channel::<ServerFrame>(state.client_queue);

    services::room::join_room(&state, conversation_id, client_id, &identity, client_tx).await;
    info!(%client_id, conversation_id, user_id = identity.user_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        process_inbound_text(&state, conversation_id, client_id, &identity, text.as_str()).await;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    services::room::part_room(&state, conversation_id, client_id).await;
    info!(%client_id, conversation_id, "ws: client disconnected");
}

/// Handle one inbound text frame. Returns how many peers received the
/// relayed update, or `None` when the frame was dropped.
async fn process_inbound_text(
    state: &AppState,
    conversation_id: ConversationId,
    client_id: Uuid,
    identity: &Identity,
    text: &str,
) -> Option<usize> {
    let frame = match frames::decode_client_frame(text) {
        Ok(Some(frame)) => frame,
        Ok(None) => {
            debug!(%client_id, conversation_id, "ws: ignoring frame with unknown type");
            return None;
        }
        Err(e) => {
            warn!(%client_id, conversation_id, error = %e, "ws: invalid inbound frame");
            return None;
        }
    };

    let frame_type = frame.frame_type();
    let relayed = frame.into_user_scroll(identity.user_id, identity.username.clone());
    let delivered = services::room::broadcast(state, conversation_id, &relayed, Some(client_id)).await;
    debug!(%client_id, conversation_id, frame_type, delivered, "ws: relayed frame");
    Some(delivered)
}

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> Result<(), ()> {
    let json = match frames::encode_server_frame(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(frame_type = frame.frame_type(), error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

//! Room service: join, part and fan-out for one conversation.
//!
//! Relayed frames are ephemeral. A client whose queue is full simply misses
//! that update; the next scroll supersedes it anyway.

#[cfg(test)]
#[path = "room_test.rs"]
mod room_test;

use frames::ServerFrame;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::Identity;
use crate::state::{AppState, ConnectedClient, ConversationId};

/// Add a client to a conversation room, creating the room if needed.
/// Returns the room size after joining.
pub async fn join_room(
    state: &AppState,
    conversation_id: ConversationId,
    client_id: Uuid,
    identity: &Identity,
    tx: mpsc::Sender<ServerFrame>,
) -> usize {
    let mut rooms = state.rooms.write().await;
    let room = rooms.entry(conversation_id).or_default();
    room.clients.insert(
        client_id,
        ConnectedClient { user_id: identity.user_id, username: identity.username.clone(), tx },
    );
    let size = room.clients.len();
    info!(conversation_id, %client_id, user_id = identity.user_id, size, "client joined conversation");
    size
}

/// Remove a client; the room is evicted once empty.
pub async fn part_room(state: &AppState, conversation_id: ConversationId, client_id: Uuid) {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(&conversation_id) else {
        return;
    };

    room.clients.remove(&client_id);
    info!(conversation_id, %client_id, remaining = room.clients.len(), "client left conversation");

    if room.clients.is_empty() {
        rooms.remove(&conversation_id);
        info!(conversation_id, "evicted empty room");
    }
}

/// Send `frame` to every client in the room except `exclude`. Returns how
/// many clients accepted it.
pub async fn broadcast(
    state: &AppState,
    conversation_id: ConversationId,
    frame: &ServerFrame,
    exclude: Option<Uuid>,
) -> usize {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(&conversation_id) else {
        return 0;
    };

    let mut delivered = 0;
    for (client_id, client) in &room.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        if client.tx.try_send(frame.clone()).is_ok() {
            delivered += 1;
        } else {
            debug!(conversation_id, %client_id, "client queue full or closed; update skipped");
        }
    }
    delivered
}

/// Number of clients connected to a conversation.
pub async fn room_size(state: &AppState, conversation_id: ConversationId) -> usize {
    state.rooms.read().await.get(&conversation_id).map_or(0, |room| room.clients.len())
}

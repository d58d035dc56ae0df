//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the token verifier and a map of live conversation rooms. A room
//! only exists while at least one client is connected to it.

use std::collections::HashMap;
use std::sync::Arc;

use frames::ServerFrame;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::auth::TokenVerifier;

pub type ConversationId = i64;

/// One connected websocket client.
#[derive(Debug, Clone)]
pub struct ConnectedClient {
    pub user_id: i64,
    pub username: String,
    /// Sender for frames relayed to this client.
    pub tx: mpsc::Sender<ServerFrame>,
}

/// Clients currently viewing one conversation, keyed by `client_id`.
#[derive(Debug, Default)]
pub struct Room {
    pub clients: HashMap<Uuid, ConnectedClient>,
}

/// Clone is required by Axum; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<ConversationId, Room>>>,
    pub verifier: Arc<dyn TokenVerifier>,
    /// Capacity of each client's outbound queue.
    pub client_queue: usize,
}

impl AppState {
    #[must_use]
    pub fn new(verifier: Arc<dyn TokenVerifier>, client_queue: usize) -> Self {
        Self { rooms: Arc::new(RwLock::new(HashMap::new())), verifier, client_queue }
    }
}

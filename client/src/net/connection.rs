//! Connection manager: one duplex connection per conversation view.
//!
//! DESIGN
//! ======
//! `open` spawns a connection task that owns the transport. The task runs a
//! `select!` loop between outbound text (from the handle) and inbound frames
//! (from the transport), reporting every transition on a shared event
//! channel tagged with the connection id. Callers ignore events whose id no
//! longer matches their live handle, so a superseded connection can never
//! leak state into its successor.
//!
//! LIFECYCLE
//! =========
//! `Connecting` → `Open` → `Closed`. Every close ends in `Closed`; the
//! clean/error distinction only travels in [`CloseCause`]. Dropping a
//! [`ConnectionHandle`] aborts the task, which releases the transport even
//! when the handshake is still in flight.

#[cfg(test)]
#[path = "connection_test.rs"]
mod connection_test;

use std::sync::Arc;

use frames::{ClientFrame, ServerFrame};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::transport::{Connector, Transport};
use crate::error::ConnectError;

pub type ConversationId = i64;

/// Externally observable connection lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// No connection has been attempted.
    #[default]
    Idle,
    /// Transport handshake in flight.
    Connecting,
    /// Frames flow both ways.
    Open,
    /// Closed for any reason, local or remote, clean or not.
    Closed,
}

/// Why a connection ended. Only the reconnect policy looks at this.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseCause {
    /// The peer ended the stream.
    Clean,
    /// Connect failure or transport error.
    Error(String),
}

#[derive(Debug)]
pub enum ConnectionEventKind {
    Opened,
    Frame(ServerFrame),
    Closed(CloseCause),
}

/// A state transition or inbound frame from one connection.
#[derive(Debug)]
pub struct ConnectionEvent {
    pub connection_id: u64,
    pub kind: ConnectionEventKind,
}

// =============================================================================
// MANAGER
// =============================================================================

/// Opens connections and funnels their events into one channel.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    base_url: String,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    next_id: u64,
}

impl ConnectionManager {
    /// Create a manager and the receiver its connections report to.
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        base_url: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { connector, base_url: base_url.into(), events, next_id: 1 }, rx)
    }

    /// Start connecting to `conversation_id` with `token`.
    ///
    /// Every call produces an independent transport.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] without attempting anything when the
    /// conversation or token is absent, or the base URL has no http(s)/ws(s)
    /// scheme.
    pub fn open(
        &mut self,
        conversation_id: Option<ConversationId>,
        token: Option<&str>,
    ) -> Result<ConnectionHandle, ConnectError> {
        let Some(conversation_id) = conversation_id else {
            return Err(ConnectError::MissingConversation);
        };
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Err(ConnectError::MissingToken);
        };
        let url = endpoint_url(&self.base_url, conversation_id, token)?;

        let id = self.next_id;
        self.next_id += 1;

        let state = Arc::new(watch::Sender::new(ConnectionState::Connecting));
        let (outbound, outbound_rx) = mpsc::unbounded_channel::<String>();
        let task = tokio::spawn(run_connection(ConnectionTask {
            id,
            conversation_id,
            url,
            connector: self.connector.clone(),
            state: state.clone(),
            outbound: outbound_rx,
            events: self.events.clone(),
        }));

        debug!(conversation_id, connection_id = id, "ws: connecting");
        Ok(ConnectionHandle { id, conversation_id, state, outbound, task })
    }

    /// Release a connection unconditionally, whatever its state.
    pub fn close(&self, handle: ConnectionHandle) {
        info!(conversation_id = handle.conversation_id, connection_id = handle.id, "ws: closing");
        drop(handle);
    }
}

/// Build `ws(s)://<host>/api/ws/conversations/{id}?token=...` from an
/// http(s) or ws(s) base URL. The token is percent-encoded.
///
/// # Errors
///
/// Returns [`ConnectError::InvalidBaseUrl`] for any other scheme.
pub fn endpoint_url(base_url: &str, conversation_id: ConversationId, token: &str) -> Result<String, ConnectError> {
    let trimmed = base_url.trim_end_matches('/');
    let token = urlencoding::encode(token);
    let path = format!("/api/ws/conversations/{conversation_id}?token={token}");

    if let Some(rest) = trimmed.strip_prefix("http://") {
        return Ok(format!("ws://{rest}{path}"));
    }
    if let Some(rest) = trimmed.strip_prefix("https://") {
        return Ok(format!("wss://{rest}{path}"));
    }
    if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        return Ok(format!("{trimmed}{path}"));
    }

    Err(ConnectError::InvalidBaseUrl(base_url.to_owned()))
}

// =============================================================================
// HANDLE
// =============================================================================

/// Exclusive owner of one live connection.
pub struct ConnectionHandle {
    id: u64,
    conversation_id: ConversationId,
    state: Arc<watch::Sender<ConnectionState>>,
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Queue a frame for sending. Advisory: returns `false` instead of
    /// failing when the connection is not `Open` or the frame cannot be
    /// encoded.
    pub fn send(&self, frame: &ClientFrame) -> bool {
        if self.state() != ConnectionState::Open {
            return false;
        }
        match frames::encode_client_frame(frame) {
            Ok(text) => self.outbound.send(text).is_ok(),
            Err(e) => {
                warn!(conversation_id = self.conversation_id, frame_type = frame.frame_type(), error = %e, "ws: failed to encode frame");
                false
            }
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.task.abort();
        self.state.send_replace(ConnectionState::Closed);
    }
}

// =============================================================================
// CONNECTION TASK
// =============================================================================

struct ConnectionTask {
    id: u64,
    conversation_id: ConversationId,
    url: String,
    connector: Arc<dyn Connector>,
    state: Arc<watch::Sender<ConnectionState>>,
    outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ConnectionTask {
    fn emit(&self, kind: ConnectionEventKind) {
        let _ = self.events.send(ConnectionEvent { connection_id: self.id, kind });
    }

    fn finish(&self, cause: CloseCause) {
        self.state.send_replace(ConnectionState::Closed);
        self.emit(ConnectionEventKind::Closed(cause));
    }
}

async fn run_connection(mut task: ConnectionTask) {
    let conversation_id = task.conversation_id;

    let transport = match task.connector.connect(&task.url).await {
        Ok(t) => t,
        Err(e) => {
            warn!(conversation_id, error = %e, "ws: connect failed");
            task.finish(CloseCause::Error(e.to_string()));
            return;
        }
    };

    task.state.send_replace(ConnectionState::Open);
    task.emit(ConnectionEventKind::Opened);
    info!(conversation_id, connection_id = task.id, "ws: connected");

    let Transport { mut sink, mut stream } = transport;
    let cause = loop {
        tokio::select! {
            text = task.outbound.recv() => {
                let Some(text) = text else {
                    let _ = sink.close().await;
                    break CloseCause::Clean;
                };
                if let Err(e) = sink.send(text).await {
                    warn!(conversation_id, error = %e, "ws: send failed");
                    break CloseCause::Error(e.to_string());
                }
            }
            msg = stream.next() => match msg {
                Some(Ok(text)) => {
                    if let Some(frame) = parse_inbound(conversation_id, &text) {
                        task.emit(ConnectionEventKind::Frame(frame));
                    }
                }
                Some(Err(e)) => {
                    warn!(conversation_id, error = %e, "ws: recv failed");
                    break CloseCause::Error(e.to_string());
                }
                None => break CloseCause::Clean,
            },
        }
    };

    info!(conversation_id, connection_id = task.id, ?cause, "ws: disconnected");
    task.finish(cause);
}

/// Decode one inbound text frame. Malformed and unknown frames are dropped
/// here and never reach the view.
fn parse_inbound(conversation_id: ConversationId, text: &str) -> Option<ServerFrame> {
    match frames::decode_server_frame(text) {
        Ok(Some(frame)) => Some(frame),
        Ok(None) => {
            debug!(conversation_id, "ws: ignoring frame with unknown type");
            None
        }
        Err(e) => {
            warn!(conversation_id, error = %e, "ws: dropping malformed frame");
            None
        }
    }
}

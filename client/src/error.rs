//! Error taxonomy for the presence core.
//!
//! None of these are fatal to a view. Transport errors feed the reconnect
//! policy, geometry errors mean "no resolution yet", and protocol errors
//! (`frames::CodecError`) drop a single frame.

/// Failure establishing or using the duplex transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The websocket handshake failed.
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    /// The websocket failed after it was established.
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
    /// A connector refused to produce a transport.
    #[error("connection refused: {0}")]
    Refused(String),
    /// The transport is already closed.
    #[error("transport closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(e))
    }
}

/// Reasons the connection manager declines to open a connection at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("no conversation selected")]
    MissingConversation,
    #[error("no bearer token available")]
    MissingToken,
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Why a viewport resolution produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("scroll container is not mounted")]
    ContainerUnmounted,
    #[error("scroll container has no visible height")]
    ZeroSizedContainer,
    #[error("no registered messages to resolve against")]
    NoMessages,
}

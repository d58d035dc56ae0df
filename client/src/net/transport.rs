//! Duplex text transport used by the connection manager.
//!
//! DESIGN
//! ======
//! A transport is a boxed sink/stream pair of JSON text messages. The
//! production [`WsConnector`] adapts a `tokio-tungstenite` socket; binary and
//! ping/pong messages never reach the connection manager.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::TransportError;

pub type TextSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// An established duplex connection. Dropping both halves releases it.
pub struct Transport {
    pub sink: TextSink,
    pub stream: TextStream,
}

/// Opens transports for a fully-formed endpoint URL.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Transport, TransportError>;
}

/// Websocket connector over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Transport, TransportError> {
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(Box::new(e)))?;
        let (write, read) = socket.split();

        let sink = write
            .sink_map_err(TransportError::from)
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::text(text))));
        let stream = read.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::from(e))),
            })
        });

        Ok(Transport { sink: Box::pin(sink), stream: Box::pin(stream) })
    }
}

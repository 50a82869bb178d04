//! Transport-neutral handles for the two relayed connections.
//!
//! Both connections are exchanged as streams and sinks of JSON text frames.
//! The service adapts its WebSocket types into these; tests use channels.

use crate::error::RelayError;
use async_trait::async_trait;
use futures::{Sink, Stream};
use std::pin::Pin;

/// Inbound text frames. The stream ends when the peer closes.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, RelayError>> + Send>>;

/// Outbound text frames.
pub type TextSink = Pin<Box<dyn Sink<String, Error = RelayError> + Send>>;

/// One side of a relayed call, split into its read and write halves.
pub struct Connection {
    pub sink: TextSink,
    pub stream: TextStream,
}

impl Connection {
    pub fn new<K, S>(sink: K, stream: S) -> Self
    where
        K: Sink<String, Error = RelayError> + Send + 'static,
        S: Stream<Item = Result<String, RelayError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

/// Opens the connection to the realtime AI service.
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    async fn connect(&self) -> Result<Connection, RelayError>;
}

//! Streaming chat over a Socket.IO connection.
//!
//! [`StreamingSession`] drives one exchange through a [`StreamTransport`]:
//! connect, send the request, assemble partial content, run requested
//! tools and resume, until the reply completes, fails or times out.

mod events;
mod observer;
mod protocol;
mod session;
#[cfg(feature = "streaming")]
mod socket;

pub use events::{
    ChatResponseEvent, ErrorPayload, InboundEvent, StreamChatRequest, ToolCompleteEvent,
};
pub use observer::{NoopObserver, StreamObserver};
pub use protocol::{Packet, SocketPacket, stream_url};
pub use session::{
    Completion, SessionConfig, StreamState, StreamingSession, TurnSignal, detect_tool_request,
};
#[cfg(feature = "streaming")]
pub use socket::SocketIoTransport;

pub mod event_names {
    pub use super::events::{
        CHAT_MESSAGE_RESPONSE, DATA_TABLE, ERROR, SCRUBBED_MESSAGE, SEND_CHAT_MESSAGE,
        TOOL_COMPLETE,
    };
}

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Fault in the streaming transport itself.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not establish the connection.
    #[error("{0}")]
    Connect(String),

    /// No connect acknowledgement within the wait window.
    #[error("no connect acknowledgement within {0:?}")]
    ConnectTimeout(Duration),

    /// The server refused the namespace connection.
    #[error("connection rejected: {0}")]
    Rejected(String),

    /// Operation on a transport that is not connected.
    #[error("not connected")]
    NotConnected,

    /// WebSocket-level failure.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Frame that does not follow the protocol.
    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(feature = "streaming")]
impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::WebSocket(e.to_string())
    }
}

/// A duplex event connection.
#[async_trait]
pub trait StreamTransport: Send {
    /// Open the connection. Succeeds only once the server has acknowledged
    /// it, within `wait`.
    async fn connect(&mut self, wait: Duration) -> Result<(), TransportError>;

    /// Send one named event.
    async fn emit(&mut self, event: &str, data: Value) -> Result<(), TransportError>;

    /// Next consumable event. `Ok(None)` once the server has closed.
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, TransportError>;

    /// Tear the connection down. Safe to call when not connected.
    async fn disconnect(&mut self);
}

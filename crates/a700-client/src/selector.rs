//! Choosing between the streaming and blocking transports.
//!
//! Streaming is preferred when requested and compiled in. A streaming
//! attempt that cannot connect (or panics) is retried once over the
//! blocking call; any other streaming failure is returned as-is.

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::client::A700Client;
use crate::conversation::ConversationLog;
use crate::error::{ExchangeError, ExchangeResult};
use crate::stream::{SessionConfig, StreamObserver};
use crate::types::{ExchangeRequest, TransportKind};

/// Whether this build carries the streaming transport.
pub const STREAMING_AVAILABLE: bool = cfg!(feature = "streaming");

/// One way of running a chat exchange.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    async fn exchange(
        &self,
        request: &ExchangeRequest,
        log: &mut dyn ConversationLog,
        observer: &dyn StreamObserver,
        cancel: &CancellationToken,
    ) -> ExchangeResult;
}

// ─────────────────────────────────────────────────────────────────────────────
// Blocking
// ─────────────────────────────────────────────────────────────────────────────

/// Single `POST /chat` per exchange.
pub struct BlockingTransport {
    client: A700Client,
}

impl BlockingTransport {
    pub fn new(client: A700Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChatTransport for BlockingTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Blocking
    }

    async fn exchange(
        &self,
        request: &ExchangeRequest,
        log: &mut dyn ConversationLog,
        _observer: &dyn StreamObserver,
        cancel: &CancellationToken,
    ) -> ExchangeResult {
        let chat = self.client.chat();
        let reply = tokio::select! {
            _ = cancel.cancelled() => return Err(ExchangeError::Cancelled),
            reply = chat.send(&request.agent_id, &request.messages) => reply?,
        };

        log.add_user_message(&request.user_message);
        log.add_agent_message(&reply.content);
        Ok(reply)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Streaming
// ─────────────────────────────────────────────────────────────────────────────

/// Socket.IO streaming session per exchange, with client-side tool
/// execution.
#[cfg(feature = "streaming")]
pub struct StreamingTransport {
    client: A700Client,
    config: SessionConfig,
}

#[cfg(feature = "streaming")]
impl StreamingTransport {
    pub fn new(client: A700Client, config: SessionConfig) -> Self {
        Self { client, config }
    }
}

#[cfg(feature = "streaming")]
#[async_trait]
impl ChatTransport for StreamingTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Streaming
    }

    async fn exchange(
        &self,
        request: &ExchangeRequest,
        log: &mut dyn ConversationLog,
        observer: &dyn StreamObserver,
        cancel: &CancellationToken,
    ) -> ExchangeResult {
        use crate::stream::{SocketIoTransport, StreamingSession};
        use crate::tools::ToolExecutor;

        let token = self.client.access_token().unwrap_or_default();
        let transport = SocketIoTransport::new(self.client.base_url(), token)
            .map_err(|e| ExchangeError::Connection(e.to_string()))?;
        let tools = ToolExecutor::new(self.client.clone(), request.agent_id.clone())
            .with_timeout(self.client.timeout());

        StreamingSession::new(transport, token, &tools, observer, self.config.clone())
            .run(request, log, cancel)
            .await
    }
}

#[cfg(feature = "streaming")]
fn streaming_transport(
    client: &A700Client,
    config: SessionConfig,
) -> Option<Box<dyn ChatTransport>> {
    Some(Box::new(StreamingTransport::new(client.clone(), config)))
}

#[cfg(not(feature = "streaming"))]
fn streaming_transport(
    _client: &A700Client,
    _config: SessionConfig,
) -> Option<Box<dyn ChatTransport>> {
    tracing::warn!("streaming requested but not compiled in, using blocking chat");
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Selector
// ─────────────────────────────────────────────────────────────────────────────

/// Routes each exchange to streaming or blocking, with fallback.
pub struct TransportSelector {
    streaming: Option<Box<dyn ChatTransport>>,
    blocking: Box<dyn ChatTransport>,
}

impl TransportSelector {
    /// Selector for `client`. Streaming is used only when requested and
    /// available.
    pub fn new(client: &A700Client, streaming: bool, config: SessionConfig) -> Self {
        let streaming = if streaming {
            streaming_transport(client, config)
        } else {
            None
        };
        Self {
            streaming,
            blocking: Box::new(BlockingTransport::new(client.clone())),
        }
    }

    /// Selector over explicit transports.
    pub fn with_transports(
        streaming: Option<Box<dyn ChatTransport>>,
        blocking: Box<dyn ChatTransport>,
    ) -> Self {
        Self {
            streaming,
            blocking,
        }
    }

    pub fn streaming_enabled(&self) -> bool {
        self.streaming.is_some()
    }

    /// Run one exchange.
    pub async fn exchange(
        &self,
        request: &ExchangeRequest,
        log: &mut dyn ConversationLog,
        observer: &dyn StreamObserver,
        cancel: &CancellationToken,
    ) -> ExchangeResult {
        let Some(streaming) = &self.streaming else {
            return self.blocking.exchange(request, log, observer, cancel).await;
        };

        let attempt = AssertUnwindSafe(streaming.exchange(request, &mut *log, observer, cancel))
            .catch_unwind()
            .await;

        let reason = match attempt {
            Ok(Err(e)) if e.is_connection_failure() => e.to_string(),
            Ok(result) => return result,
            Err(_) => {
                tracing::error!("streaming session panicked");
                "streaming session panicked".to_string()
            }
        };

        tracing::warn!(%reason, "streaming unavailable, falling back to blocking chat");
        observer.on_notice("Streaming connection failed, falling back to HTTP");
        observer.on_fallback();
        self.blocking.exchange(request, log, observer, cancel).await
    }
}

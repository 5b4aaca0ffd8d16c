//! Blocking chat API.

use crate::client::A700Client;
use crate::error::{ExchangeError, ExchangeResult};
use crate::types::{AgentReply, ChatMessage, ChatRequest, ChatResponse, TransportKind};

/// Chat API client.
pub struct ChatApi {
    client: A700Client,
}

impl ChatApi {
    pub(crate) fn new(client: A700Client) -> Self {
        Self { client }
    }

    /// Send a message list and wait for the whole reply.
    ///
    /// Uses the client's chat timeout. Never returns a raw transport error:
    /// every failure is mapped into [`ExchangeError`].
    pub async fn send(&self, agent_id: &str, messages: &[ChatMessage]) -> ExchangeResult {
        let body = ChatRequest {
            agent_id,
            messages,
            stream_responses: false,
        };

        let response = self
            .client
            .post_raw("chat", &body, self.client.chat_timeout())
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "chat request failed");
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data: ChatResponse = response.json().await?;
        if let Some(error) = data.error_text() {
            return Err(ExchangeError::Api(error));
        }

        let content = data.text().ok_or(ExchangeError::EmptyResponse)?.to_string();

        Ok(AgentReply {
            content,
            citations: data.citations,
            transport: TransportKind::Blocking,
            ..Default::default()
        })
    }
}

//! CLI command handlers.

pub mod ask;
pub mod auth;
pub mod chat;
pub mod history;
pub mod repl;

use a700_client::{AgentReply, ExchangeError, ExchangeRequest, SessionConfig, TransportSelector};
use a700_config::A700Config;
use a700_session::ConversationStore;
use tokio_util::sync::CancellationToken;

use crate::client::Connection;
use crate::render::ConsoleObserver;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Resolved configuration.
    pub config: A700Config,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            connect_wait: self.config.connect_wait,
            response_timeout: self.config.response_timeout,
            max_tool_rounds: self.config.max_tool_rounds,
        }
    }

    pub fn selector(&self, conn: &Connection, streaming: bool) -> TransportSelector {
        TransportSelector::new(&conn.client, streaming, self.session_config())
    }
}

/// Run one exchange against the agent, recording it in `conversation`.
///
/// Ctrl-C cancels the exchange. When the blocking chat call rejects the
/// access token, the token is renewed and the exchange runs once more.
pub async fn send_message(
    ctx: &Context,
    conn: &mut Connection,
    selector: &mut TransportSelector,
    conversation: &mut ConversationStore,
    message: &str,
    observer: &ConsoleObserver,
) -> Result<AgentReply, ExchangeError> {
    let request = ExchangeRequest::new(
        &conn.agent_id,
        conn.agent.clone(),
        &conversation.history(),
        message,
        ctx.config.max_history_chars,
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut result = exchange(selector, &request, conversation, observer, &cancel).await;

    if matches!(result, Err(ExchangeError::Status { status: 401, .. })) {
        tracing::info!("chat rejected the access token, refreshing");
        match conn.reauthenticate(&ctx.config).await {
            Ok(()) => {
                *selector = ctx.selector(conn, selector.streaming_enabled());
                result = exchange(selector, &request, conversation, observer, &cancel).await;
            }
            Err(e) => tracing::warn!(error = %e, "token renewal failed"),
        }
    }

    interrupt.abort();
    result
}

/// One attempt, with the typing indicator up while a blocking call runs.
async fn exchange(
    selector: &TransportSelector,
    request: &ExchangeRequest,
    conversation: &mut ConversationStore,
    observer: &ConsoleObserver,
    cancel: &CancellationToken,
) -> Result<AgentReply, ExchangeError> {
    if !selector.streaming_enabled() {
        observer.start_indicator();
    }
    let result = selector
        .exchange(request, conversation, observer, cancel)
        .await;
    observer.stop_indicator().await;
    result
}

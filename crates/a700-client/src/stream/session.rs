//! The streaming exchange state machine.
//!
//! ```text
//! connecting ─► awaiting_response ─► complete
//!                  │      ▲        ├► error
//!                  ▼      │        └► timed out
//!               tool_pending
//! ```

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::events::{
    ChatResponseEvent, ErrorPayload, InboundEvent, SEND_CHAT_MESSAGE, StreamChatRequest,
    ToolCompleteEvent,
};
use super::observer::StreamObserver;
use super::StreamTransport;
use crate::conversation::ConversationLog;
use crate::error::{ExchangeError, ExchangeResult};
use crate::tools::{ToolCall, ToolResult, ToolRunner, has_tool_use, parse_tool_use_blocks};
use crate::types::{AgentReply, ChatMessage, ExchangeRequest, TransportKind};

const FINISH_TOOL_CALLS: &str = "tool_calls";

/// Timing and limits for one streaming exchange.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long the connection may take to be acknowledged.
    pub connect_wait: Duration,
    /// Budget for the whole reply, tool rounds included.
    pub response_timeout: Duration,
    /// Client-side tool rounds allowed before giving up.
    pub max_tool_rounds: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_wait: Duration::from_secs(10),
            response_timeout: Duration::from_secs(300),
            max_tool_rounds: 5,
        }
    }
}

/// Terminal status of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Completion {
    #[default]
    Pending,
    Complete,
    Error(ExchangeError),
}

/// Everything assembled so far. Owned by a single session.
#[derive(Debug, Default)]
pub struct StreamState {
    pub accumulated_text: String,
    pub citations: Vec<String>,
    pub tool_results: Vec<Value>,
    pub usage: Option<Value>,
    pub completion: Completion,
    pub tool_call_pending: bool,
    /// Offset into `accumulated_text` where the current turn began.
    turn_start: usize,
}

impl StreamState {
    /// Text produced since the last tool resume.
    pub fn turn_text(&self) -> &str {
        &self.accumulated_text[self.turn_start..]
    }
}

/// What a finish signal means for the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnSignal {
    pub tool_call_pending: bool,
    pub response_complete: bool,
}

/// Decide whether a turn ended, and whether tools must run first.
///
/// An explicit `"tool_calls"` wins; otherwise a well-formed inline
/// `<tool_use>` block in the turn's text also means tools are pending.
/// No finish reason means the turn is still streaming.
pub fn detect_tool_request(finish_reason: Option<&str>, turn_text: &str) -> TurnSignal {
    match finish_reason {
        None => TurnSignal {
            tool_call_pending: false,
            response_complete: false,
        },
        Some(FINISH_TOOL_CALLS) => TurnSignal {
            tool_call_pending: true,
            response_complete: false,
        },
        Some(_) if has_tool_use(turn_text) => TurnSignal {
            tool_call_pending: true,
            response_complete: false,
        },
        Some(_) => TurnSignal {
            tool_call_pending: false,
            response_complete: true,
        },
    }
}

/// What the receive loop does after an event.
enum Step {
    Continue,
    DispatchTools,
    Done,
}

/// One streaming exchange over a [`StreamTransport`].
pub struct StreamingSession<'a, T> {
    transport: T,
    access_token: String,
    tools: &'a dyn ToolRunner,
    observer: &'a dyn StreamObserver,
    config: SessionConfig,
    state: StreamState,
    /// Outbound message list, grown by each tool round.
    messages: Vec<ChatMessage>,
    tool_rounds: usize,
}

impl<'a, T: StreamTransport> StreamingSession<'a, T> {
    pub fn new(
        transport: T,
        access_token: impl Into<String>,
        tools: &'a dyn ToolRunner,
        observer: &'a dyn StreamObserver,
        config: SessionConfig,
    ) -> Self {
        Self {
            transport,
            access_token: access_token.into(),
            tools,
            observer,
            config,
            state: StreamState::default(),
            messages: Vec::new(),
            tool_rounds: 0,
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Run the exchange to a terminal state.
    ///
    /// The connection is torn down exactly once on every path. Once
    /// connected, the user message is logged once and the agent text once
    /// (when any arrived), whatever the outcome. A failed connect logs
    /// nothing, leaving the exchange to whichever transport retries it.
    pub async fn run(
        mut self,
        request: &ExchangeRequest,
        log: &mut dyn ConversationLog,
        cancel: &CancellationToken,
    ) -> ExchangeResult {
        self.messages = request.messages.clone();

        let connected = tokio::select! {
            _ = cancel.cancelled() => Err(ExchangeError::Cancelled),
            res = self.transport.connect(self.config.connect_wait) => {
                res.map_err(|e| ExchangeError::Connection(e.to_string()))
            }
        };
        if let Err(e) = connected {
            tracing::warn!(error = %e, "streaming connect failed");
            self.transport.disconnect().await;
            self.state.completion = Completion::Error(e.clone());
            return Err(e);
        }
        tracing::debug!(agent_id = %request.agent_id, "streaming connection established");
        self.observer.on_connected();

        let deadline = Instant::now() + self.config.response_timeout;
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(ExchangeError::Cancelled),
            res = tokio::time::timeout_at(deadline, self.exchange(request)) => {
                res.unwrap_or(Err(ExchangeError::Timeout))
            }
        };

        self.transport.disconnect().await;

        log.add_user_message(&request.user_message);
        if !self.state.accumulated_text.is_empty() {
            log.add_agent_message(&self.state.accumulated_text);
        }

        match outcome {
            Ok(()) => {
                self.state.completion = Completion::Complete;
                Ok(self.into_reply())
            }
            Err(e) => {
                tracing::warn!(error = %e, "streaming exchange failed");
                self.state.completion = Completion::Error(e.clone());
                Err(e)
            }
        }
    }

    async fn exchange(&mut self, request: &ExchangeRequest) -> Result<(), ExchangeError> {
        self.send(request).await?;

        loop {
            let event = match self.transport.next_event().await {
                Ok(Some(event)) => event,
                Ok(None) => return Err(ExchangeError::Incomplete),
                Err(e) => return Err(ExchangeError::Transport(e.to_string())),
            };

            match self.handle_event(event)? {
                Step::Continue => {}
                Step::DispatchTools => self.dispatch_tools(request).await?,
                Step::Done => return Ok(()),
            }
        }
    }

    async fn send(&mut self, request: &ExchangeRequest) -> Result<(), ExchangeError> {
        let body = StreamChatRequest::new(
            &request.agent_id,
            &self.access_token,
            &self.messages,
            &request.agent,
        );
        let data = serde_json::to_value(&body)
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        self.transport
            .emit(SEND_CHAT_MESSAGE, data)
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event handlers
    // ─────────────────────────────────────────────────────────────────────────

    fn handle_event(&mut self, event: InboundEvent) -> Result<Step, ExchangeError> {
        match event {
            InboundEvent::ChatResponse(ev) => Ok(self.on_chat_response(ev)),
            InboundEvent::ToolComplete(ev) => {
                self.on_tool_complete(ev);
                Ok(Step::Continue)
            }
            InboundEvent::Error(payload) => Err(self.on_error(payload)),
            InboundEvent::DataTable(content) => {
                self.state
                    .tool_results
                    .push(serde_json::json!({ "type": "data_table", "content": content }));
                Ok(Step::Continue)
            }
            InboundEvent::Scrubbed(data) => {
                let notice = data
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| "Sensitive data was scrubbed from the message".to_string());
                self.observer.on_notice(&notice);
                Ok(Step::Continue)
            }
            InboundEvent::Other(name) => {
                tracing::debug!(event = %name, "ignoring stream event");
                Ok(Step::Continue)
            }
        }
    }

    fn on_chat_response(&mut self, event: ChatResponseEvent) -> Step {
        if !event.content.is_empty() {
            self.observer.on_text(&event.content);
            self.state.accumulated_text.push_str(&event.content);
        }
        self.state.citations.extend(event.citations);
        if event.usage.is_some() {
            self.state.usage = event.usage;
        }

        let signal = detect_tool_request(event.finish_reason.as_deref(), self.state.turn_text());
        self.state.tool_call_pending = signal.tool_call_pending;

        if signal.response_complete {
            tracing::debug!(finish_reason = ?event.finish_reason, "response complete");
            Step::Done
        } else if signal.tool_call_pending {
            Step::DispatchTools
        } else {
            Step::Continue
        }
    }

    fn on_tool_complete(&mut self, event: ToolCompleteEvent) {
        let result = event.result();
        self.observer.on_server_tool_complete(&result);
        self.state.tool_results.push(result);
    }

    fn on_error(&mut self, payload: ErrorPayload) -> ExchangeError {
        let err = payload.into_exchange_error();
        tracing::error!(error = %err, "stream reported an error");
        err
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tool rounds
    // ─────────────────────────────────────────────────────────────────────────

    /// Run the turn's tool calls in order, relay the results and resume.
    async fn dispatch_tools(&mut self, request: &ExchangeRequest) -> Result<(), ExchangeError> {
        let calls = parse_tool_use_blocks(self.state.turn_text());
        if calls.is_empty() {
            // The service runs its own tools and keeps streaming.
            tracing::debug!("tool_calls without inline blocks, awaiting service tools");
            return Ok(());
        }

        self.tool_rounds += 1;
        if self.tool_rounds > self.config.max_tool_rounds {
            return Err(ExchangeError::ToolLoop(self.config.max_tool_rounds));
        }

        self.observer.on_tool_pending(&calls);
        let mut relay = String::new();
        for call in &calls {
            let result = self.tools.execute(call).await;
            self.observer.on_tool_result(call, &result);
            relay.push_str(&format_tool_result(call, &result));
            self.state.tool_results.push(Value::Object(result));
        }

        let turn = self.state.turn_text().to_string();
        self.messages.push(ChatMessage::assistant(turn));
        self.messages.push(ChatMessage::user(relay));
        self.state.turn_start = self.state.accumulated_text.len();
        self.state.tool_call_pending = false;

        tracing::debug!(round = self.tool_rounds, calls = calls.len(), "resuming after tools");
        self.send(request).await
    }

    fn into_reply(self) -> AgentReply {
        AgentReply {
            content: self.state.accumulated_text,
            citations: self.state.citations,
            tool_results: self.state.tool_results,
            usage: self.state.usage,
            transport: TransportKind::Streaming,
        }
    }
}

/// `<tool_result>` block relayed to the agent for one call.
fn format_tool_result(call: &ToolCall, result: &ToolResult) -> String {
    let id = call
        .id
        .as_deref()
        .map(|id| format!("<id>{}</id>", id))
        .unwrap_or_default();
    let body = serde_json::to_string(result).unwrap_or_default();
    format!(
        "<tool_result><server>{}</server><tool>{}</tool>{}<result>{}</result></tool_result>\n",
        call.server, call.tool, id, body
    )
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::conversation::MemoryLog;
    use crate::stream::NoopObserver;
    use crate::stream::events::{CHAT_MESSAGE_RESPONSE, TOOL_COMPLETE};
    use crate::stream::TransportError;
    use crate::tools::error_result;
    use crate::types::{AgentConfig, Role};

    enum Scripted {
        Event(InboundEvent),
        Close,
    }

    #[derive(Default, Clone)]
    struct Tally {
        emitted: Arc<Mutex<Vec<(String, Value)>>>,
        disconnects: Arc<AtomicUsize>,
    }

    /// Replays a fixed script, then stalls forever.
    struct ScriptedTransport {
        connect_error: Option<String>,
        script: VecDeque<Scripted>,
        tally: Tally,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Scripted>) -> (Self, Tally) {
            let tally = Tally::default();
            (
                Self {
                    connect_error: None,
                    script: script.into(),
                    tally: tally.clone(),
                },
                tally,
            )
        }

        fn refusing(message: &str) -> (Self, Tally) {
            let (mut transport, tally) = Self::new(vec![]);
            transport.connect_error = Some(message.to_string());
            (transport, tally)
        }
    }

    #[async_trait]
    impl StreamTransport for ScriptedTransport {
        async fn connect(&mut self, _wait: Duration) -> Result<(), TransportError> {
            match &self.connect_error {
                Some(message) => Err(TransportError::Connect(message.clone())),
                None => Ok(()),
            }
        }

        async fn emit(&mut self, event: &str, data: Value) -> Result<(), TransportError> {
            self.tally.emitted.lock().unwrap().push((event.to_string(), data));
            Ok(())
        }

        async fn next_event(&mut self) -> Result<Option<InboundEvent>, TransportError> {
            match self.script.pop_front() {
                Some(Scripted::Event(event)) => Ok(Some(event)),
                Some(Scripted::Close) => Ok(None),
                None => std::future::pending().await,
            }
        }

        async fn disconnect(&mut self) {
            self.tally.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<ToolCall>>,
    }

    #[async_trait]
    impl ToolRunner for RecordingRunner {
        async fn execute(&self, call: &ToolCall) -> ToolResult {
            self.calls.lock().unwrap().push(call.clone());
            if call.tool == "fail" {
                return error_result("HTTP 500");
            }
            json!({"forecast": "sunny"}).as_object().cloned().unwrap()
        }
    }

    fn chunk(text: &str) -> Scripted {
        Scripted::Event(InboundEvent::ChatResponse(ChatResponseEvent::chunk(text)))
    }

    fn finish(text: &str, reason: &str) -> Scripted {
        Scripted::Event(InboundEvent::ChatResponse(ChatResponseEvent::finished(
            text, reason,
        )))
    }

    fn request() -> ExchangeRequest {
        ExchangeRequest::new("agent-1", AgentConfig::default(), &[], "What's the weather?", 1000)
    }

    fn config(timeout_ms: u64) -> SessionConfig {
        SessionConfig {
            connect_wait: Duration::from_millis(100),
            response_timeout: Duration::from_millis(timeout_ms),
            max_tool_rounds: 5,
        }
    }

    const WEATHER_CALL: &str = r#"<tool_use><server>weather</server><tool>today</tool><arguments>{"city": "Oslo"}</arguments></tool_use>"#;

    async fn run(
        transport: ScriptedTransport,
        runner: &RecordingRunner,
        config: SessionConfig,
        log: &mut MemoryLog,
    ) -> ExchangeResult {
        let cancel = CancellationToken::new();
        StreamingSession::new(transport, "tok", runner, &NoopObserver, config)
            .run(&request(), log, &cancel)
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // detect_tool_request
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_tool_calls_always_pending() {
        for text in ["", "plain text", WEATHER_CALL] {
            let signal = detect_tool_request(Some("tool_calls"), text);
            assert!(signal.tool_call_pending);
            assert!(!signal.response_complete);
        }
    }

    #[test]
    fn test_end_turn_with_inline_block_is_pending() {
        let signal = detect_tool_request(Some("end_turn"), &format!("Let me check. {WEATHER_CALL}"));
        assert!(signal.tool_call_pending);
        assert!(!signal.response_complete);
    }

    #[test]
    fn test_end_turn_without_block_completes() {
        let signal = detect_tool_request(Some("end_turn"), "It is sunny.");
        assert!(!signal.tool_call_pending);
        assert!(signal.response_complete);

        let signal = detect_tool_request(Some("stop"), "<tool_use><server>x</server></tool_use>");
        assert!(signal.response_complete);
    }

    #[test]
    fn test_no_finish_reason_keeps_streaming() {
        let signal = detect_tool_request(None, WEATHER_CALL);
        assert!(!signal.tool_call_pending);
        assert!(!signal.response_complete);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_plain_reply_assembles_chunks() {
        let (transport, tally) = ScriptedTransport::new(vec![
            chunk("It is "),
            Scripted::Event(InboundEvent::ChatResponse(ChatResponseEvent {
                content: "sunny.".into(),
                finish_reason: Some("end_turn".into()),
                citations: vec!["https://weather.example".into()],
                usage: Some(json!({"total_tokens": 12})),
            })),
        ]);
        let runner = RecordingRunner::default();
        let mut log = MemoryLog::new();

        let reply = run(transport, &runner, config(1000), &mut log).await.unwrap();

        assert_eq!(reply.content, "It is sunny.");
        assert_eq!(reply.citations, vec!["https://weather.example".to_string()]);
        assert_eq!(reply.usage, Some(json!({"total_tokens": 12})));
        assert_eq!(reply.transport, TransportKind::Streaming);
        assert!(reply.tool_results.is_empty());
        assert!(runner.calls.lock().unwrap().is_empty());

        assert_eq!(tally.disconnects.load(Ordering::SeqCst), 1);
        let emitted = tally.emitted.lock().unwrap();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].0, SEND_CHAT_MESSAGE);
        assert_eq!(emitted[0].1["streamResponses"], true);
        assert_eq!(emitted[0].1["Authorization"], "Bearer tok");

        assert_eq!(
            log.messages(),
            &[
                ChatMessage::user("What's the weather?"),
                ChatMessage::assistant("It is sunny.")
            ]
        );
    }

    #[tokio::test]
    async fn test_timeout_tears_down_once() {
        let (transport, tally) = ScriptedTransport::new(vec![]);
        let runner = RecordingRunner::default();
        let mut log = MemoryLog::new();

        let err = run(transport, &runner, config(50), &mut log).await.unwrap_err();

        assert_eq!(err, ExchangeError::Timeout);
        assert_eq!(err.to_string(), "Response timed out");
        assert!(!err.is_connection_failure());
        assert_eq!(tally.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(log.messages(), &[ChatMessage::user("What's the weather?")]);
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_text_in_log() {
        let (transport, tally) = ScriptedTransport::new(vec![chunk("Partial")]);
        let runner = RecordingRunner::default();
        let mut log = MemoryLog::new();

        let err = run(transport, &runner, config(50), &mut log).await.unwrap_err();

        assert_eq!(err, ExchangeError::Timeout);
        assert_eq!(tally.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(log.len(), 2);
        assert_eq!(log.messages()[1], ChatMessage::assistant("Partial"));
    }

    #[tokio::test]
    async fn test_connect_failure_is_fallback_signal() {
        let (transport, tally) = ScriptedTransport::refusing("refused");
        let runner = RecordingRunner::default();
        let mut log = MemoryLog::new();

        let err = run(transport, &runner, config(1000), &mut log).await.unwrap_err();

        assert!(err.is_connection_failure());
        assert_eq!(err.to_string(), "Connection failed: refused");
        assert_eq!(tally.disconnects.load(Ordering::SeqCst), 1);
        assert!(tally.emitted.lock().unwrap().is_empty());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_error_event_codes() {
        let cases = [
            (json!({"code": 401, "error": "expired"}), ExchangeError::Auth),
            (
                json!({"code": 400, "error": "Agent not publically shared"}),
                ExchangeError::Access("Agent not publically shared".into()),
            ),
            (json!("rate limited"), ExchangeError::Protocol("rate limited".into())),
        ];

        for (payload, expected) in cases {
            let payload: ErrorPayload = serde_json::from_value(payload).unwrap();
            let (transport, tally) =
                ScriptedTransport::new(vec![Scripted::Event(InboundEvent::Error(payload))]);
            let runner = RecordingRunner::default();
            let mut log = MemoryLog::new();

            let err = run(transport, &runner, config(1000), &mut log).await.unwrap_err();
            assert_eq!(err, expected);
            assert_eq!(tally.disconnects.load(Ordering::SeqCst), 1);
            assert_eq!(log.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_close_before_finish_is_incomplete() {
        let (transport, tally) = ScriptedTransport::new(vec![chunk("Half"), Scripted::Close]);
        let runner = RecordingRunner::default();
        let mut log = MemoryLog::new();

        let err = run(transport, &runner, config(1000), &mut log).await.unwrap_err();

        assert_eq!(err, ExchangeError::Incomplete);
        assert_eq!(tally.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_tool_round_relays_result_and_resumes() {
        let (transport, tally) = ScriptedTransport::new(vec![
            chunk("Checking. "),
            finish(WEATHER_CALL, "tool_calls"),
            finish("It is sunny in Oslo.", "end_turn"),
        ]);
        let runner = RecordingRunner::default();
        let mut log = MemoryLog::new();

        let reply = run(transport, &runner, config(1000), &mut log).await.unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].server, "weather");
        assert_eq!(calls[0].arguments["city"], "Oslo");

        assert_eq!(reply.tool_results, vec![json!({"forecast": "sunny"})]);
        assert!(reply.content.ends_with("It is sunny in Oslo."));

        let emitted = tally.emitted.lock().unwrap();
        assert_eq!(emitted.len(), 2);
        let resumed: Vec<ChatMessage> =
            serde_json::from_value(emitted[1].1["messages"].clone()).unwrap();
        let n = resumed.len();
        assert_eq!(resumed[n - 2].role, Role::Assistant);
        assert!(resumed[n - 2].content.contains("<tool_use>"));
        assert_eq!(resumed[n - 1].role, Role::User);
        assert!(resumed[n - 1].content.contains("<tool_result>"));
        assert!(resumed[n - 1].content.contains(r#""forecast":"sunny""#));

        assert_eq!(tally.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_inline_block_with_end_turn_runs_tools() {
        let (transport, tally) = ScriptedTransport::new(vec![
            finish(WEATHER_CALL, "end_turn"),
            finish("Done.", "end_turn"),
        ]);
        let runner = RecordingRunner::default();
        let mut log = MemoryLog::new();

        let reply = run(transport, &runner, config(1000), &mut log).await.unwrap();

        assert_eq!(runner.calls.lock().unwrap().len(), 1);
        assert_eq!(reply.tool_results.len(), 1);
        assert_eq!(tally.emitted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_tool_failure_is_recorded_not_fatal() {
        let failing = r#"<tool_use><server>weather</server><tool>fail</tool></tool_use>"#;
        let (transport, _tally) = ScriptedTransport::new(vec![
            finish(failing, "tool_calls"),
            finish("Sorry, no data.", "end_turn"),
        ]);
        let runner = RecordingRunner::default();
        let mut log = MemoryLog::new();

        let reply = run(transport, &runner, config(1000), &mut log).await.unwrap();

        assert_eq!(reply.tool_results, vec![json!({"error": "HTTP 500"})]);
    }

    #[tokio::test]
    async fn test_service_side_tools_are_awaited() {
        let (transport, tally) = ScriptedTransport::new(vec![
            finish("Searching...", "tool_calls"),
            Scripted::Event(InboundEvent::ToolComplete(ToolCompleteEvent::new(json!([
                "search",
                "{\"hits\": 3}"
            ])))),
            Scripted::Event(InboundEvent::DataTable(json!({"rows": []}))),
            finish(" Found 3.", "end_turn"),
        ]);
        let runner = RecordingRunner::default();
        let mut log = MemoryLog::new();

        let reply = run(transport, &runner, config(1000), &mut log).await.unwrap();

        assert!(runner.calls.lock().unwrap().is_empty());
        assert_eq!(tally.emitted.lock().unwrap().len(), 1);
        assert_eq!(reply.content, "Searching... Found 3.");
        assert_eq!(
            reply.tool_results,
            vec![
                json!({"hits": 3}),
                json!({"type": "data_table", "content": {"rows": []}})
            ]
        );
    }

    #[tokio::test]
    async fn test_non_object_tool_completion_is_recorded_raw() {
        let payload = json!(["search", "{\"hits\": 3}"]);
        let (transport, _tally) = ScriptedTransport::new(vec![
            finish("Searching...", "tool_calls"),
            Scripted::Event(InboundEvent::from_event(TOOL_COMPLETE, payload.clone()).unwrap()),
            finish(" Done.", "end_turn"),
        ]);
        let runner = RecordingRunner::default();
        let mut log = MemoryLog::new();

        let reply = run(transport, &runner, config(1000), &mut log).await.unwrap();

        assert_eq!(reply.tool_results, vec![json!({ "raw": payload })]);
        assert_eq!(reply.content, "Searching... Done.");
    }

    #[tokio::test]
    async fn test_odd_final_chunk_still_completes() {
        let last = InboundEvent::from_event(
            CHAT_MESSAGE_RESPONSE,
            json!({"content": "Done.", "finish_reason": "end_turn", "citations": {"url": "x.example"}}),
        )
        .unwrap();
        let (transport, tally) = ScriptedTransport::new(vec![chunk("All "), Scripted::Event(last)]);
        let runner = RecordingRunner::default();
        let mut log = MemoryLog::new();

        // A dropped terminal chunk would run into the 200ms deadline instead.
        let reply = run(transport, &runner, config(200), &mut log).await.unwrap();

        assert_eq!(reply.content, "All Done.");
        assert_eq!(reply.citations, vec![r#"{"url":"x.example"}"#.to_string()]);
        assert_eq!(tally.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tool_loop_is_bounded() {
        let (transport, tally) = ScriptedTransport::new(vec![
            finish(WEATHER_CALL, "tool_calls"),
            finish(WEATHER_CALL, "tool_calls"),
        ]);
        let runner = RecordingRunner::default();
        let mut log = MemoryLog::new();
        let config = SessionConfig {
            max_tool_rounds: 1,
            ..config(1000)
        };

        let err = run(transport, &runner, config, &mut log).await.unwrap_err();

        assert_eq!(err, ExchangeError::ToolLoop(1));
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
        assert_eq!(tally.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_tears_down() {
        let (transport, tally) = ScriptedTransport::new(vec![chunk("Hel")]);
        let runner = RecordingRunner::default();
        let mut log = MemoryLog::new();
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = StreamingSession::new(transport, "tok", &runner, &NoopObserver, config(5000))
            .run(&request(), &mut log, &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, ExchangeError::Cancelled);
        assert_eq!(tally.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_format_tool_result() {
        let call = ToolCall::new("s", "t").with_id("c1");
        let result = json!({"ok": true}).as_object().cloned().unwrap();
        assert_eq!(
            format_tool_result(&call, &result),
            "<tool_result><server>s</server><tool>t</tool><id>c1</id><result>{\"ok\":true}</result></tool_result>\n"
        );
    }
}

//! Progress callbacks for a running exchange.

use serde_json::Value;

use crate::tools::{ToolCall, ToolResult};

/// Receives progress while an exchange runs. Every method defaults to a
/// no-op.
pub trait StreamObserver: Send + Sync {
    fn on_connected(&self) {}

    /// A partial-content chunk arrived.
    fn on_text(&self, _chunk: &str) {}

    /// The agent asked for these tools to be run locally.
    fn on_tool_pending(&self, _calls: &[ToolCall]) {}

    fn on_tool_result(&self, _call: &ToolCall, _result: &ToolResult) {}

    /// A tool ran on the service side.
    fn on_server_tool_complete(&self, _result: &Value) {}

    /// Informational message for the user (PII scrubbing, fallback, ...).
    fn on_notice(&self, _notice: &str) {}

    /// Streaming could not connect; the blocking call runs next.
    fn on_fallback(&self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StreamObserver for NoopObserver {}

//! Remote tool execution via `POST /mcp/execute`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{ToolCall, ToolResult, ToolRunner};
use crate::client::A700Client;

/// Per-call execution budget.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Body of `POST /mcp/execute`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolExecutionRequest<'a> {
    agent_id: &'a str,
    server: &'a str,
    tool: &'a str,
    arguments: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

/// Executes tool calls on behalf of one agent.
#[derive(Clone)]
pub struct ToolExecutor {
    client: A700Client,
    agent_id: String,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(client: A700Client, agent_id: impl Into<String>) -> Self {
        Self {
            client,
            agent_id: agent_id.into(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Run `call` remotely and normalize the outcome.
    ///
    /// - 200 with an object body: the object.
    /// - 200 with any other body: `{"result": <body>}`.
    /// - other status: `{"error": "HTTP <code>", "detail": <body text>}`.
    /// - transport fault: `{"error": <description>}`.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        tracing::info!(server = %call.server, tool = %call.tool, "executing tool");

        let body = ToolExecutionRequest {
            agent_id: &self.agent_id,
            server: &call.server,
            tool: &call.tool,
            arguments: &call.arguments,
            tool_call_id: call.id.as_deref(),
        };

        let response = match self.client.post_raw("mcp/execute", &body, self.timeout).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(server = %call.server, tool = %call.tool, error = %e, "tool request failed");
                return error_result(e.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(server = %call.server, tool = %call.tool, status = status.as_u16(), "tool execution returned error status");
            let mut result = error_result(format!("HTTP {}", status.as_u16()));
            result.insert("detail".to_string(), Value::String(detail));
            return result;
        }

        match response.json::<Value>().await {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                let mut result = Map::new();
                result.insert("result".to_string(), other);
                result
            }
            Err(e) => error_result(e.to_string()),
        }
    }
}

#[async_trait]
impl ToolRunner for ToolExecutor {
    async fn execute(&self, call: &ToolCall) -> ToolResult {
        ToolExecutor::execute(self, call).await
    }
}

/// `{"error": message}`.
pub fn error_result(message: impl Into<String>) -> ToolResult {
    let mut result = Map::new();
    result.insert("error".to_string(), Value::String(message.into()));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let args = json!({"query": "rust"}).as_object().cloned().unwrap();
        let body = ToolExecutionRequest {
            agent_id: "agent-1",
            server: "brave-search",
            tool: "search",
            arguments: &args,
            tool_call_id: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "agentId": "agent-1",
                "server": "brave-search",
                "tool": "search",
                "arguments": {"query": "rust"}
            })
        );

        let body = ToolExecutionRequest {
            tool_call_id: Some("c1"),
            ..body
        };
        assert_eq!(serde_json::to_value(&body).unwrap()["toolCallId"], "c1");
    }

    #[test]
    fn test_error_result() {
        assert_eq!(Value::Object(error_result("boom")), json!({"error": "boom"}));
    }
}

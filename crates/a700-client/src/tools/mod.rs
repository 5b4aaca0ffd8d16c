//! Inline tool invocations: parsing `<tool_use>` markup and running the
//! resulting calls against the remote execution endpoint.

mod executor;
mod parser;

pub use executor::{DEFAULT_TOOL_TIMEOUT, ToolExecutor, error_result};
pub use parser::{has_tool_use, parse_tool_use_blocks};

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Normalized outcome of one tool execution.
///
/// Failures are ordinary results carrying an `"error"` key.
pub type ToolResult = Map<String, Value>;

/// One parsed tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Tool provider identifier.
    pub server: String,
    /// Operation name.
    pub tool: String,
    /// Argument object. Empty when absent.
    pub arguments: Map<String, Value>,
    /// Caller-supplied correlation id.
    pub id: Option<String>,
}

impl ToolCall {
    pub fn new(server: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            tool: tool.into(),
            arguments: Map::new(),
            id: None,
        }
    }

    pub fn with_arguments(mut self, arguments: Map<String, Value>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Something that can execute a [`ToolCall`].
///
/// Implementations never fail: faults are reported inside the result.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn execute(&self, call: &ToolCall) -> ToolResult;
}

//! Typed payloads of the chat streaming events.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ExchangeError;
use crate::types::{AgentConfig, ChatMessage, citation_list, text_or_json};

/// Outbound event that starts (or resumes) generation.
pub const SEND_CHAT_MESSAGE: &str = "send_chat_message";
/// Partial content, optionally with a finish reason.
pub const CHAT_MESSAGE_RESPONSE: &str = "chat_message_response";
/// A server-side tool finished.
pub const TOOL_COMPLETE: &str = "mcp_tool_complete_in_content";
pub const ERROR: &str = "error";
pub const DATA_TABLE: &str = "data_table";
/// The service redacted PII from the prompt.
pub const SCRUBBED_MESSAGE: &str = "scrubbed_message";

// ─────────────────────────────────────────────────────────────────────────────
// Outbound
// ─────────────────────────────────────────────────────────────────────────────

/// Body of `send_chat_message`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChatRequest<'a> {
    pub agent_id: &'a str,
    #[serde(rename = "Authorization")]
    pub authorization: String,
    pub messages: &'a [ChatMessage],
    pub stream_responses: bool,
    pub master_prompt: &'a str,
    pub model: &'a str,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub image_dimensions: &'a str,
    pub scrub_pii: bool,
    pub pii_threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_mcp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp_server_names: Option<&'a [String]>,
}

impl<'a> StreamChatRequest<'a> {
    pub fn new(
        agent_id: &'a str,
        access_token: &str,
        messages: &'a [ChatMessage],
        agent: &'a AgentConfig,
    ) -> Self {
        let tools = agent.tools_enabled();
        Self {
            agent_id,
            authorization: format!("Bearer {}", access_token),
            messages,
            stream_responses: true,
            master_prompt: &agent.master_prompt,
            model: &agent.model,
            temperature: agent.temperature,
            max_tokens: agent.max_tokens,
            top_p: agent.top_p,
            image_dimensions: &agent.image_dimensions,
            scrub_pii: agent.scrub_pii,
            pii_threshold: agent.pii_threshold,
            revision_id: agent.revision_id,
            enable_mcp: tools.then_some(true),
            mcp_server_names: tools.then_some(agent.mcp_server_names.as_slice()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────────────────────────────────────

/// One event received from the service.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    ChatResponse(ChatResponseEvent),
    ToolComplete(ToolCompleteEvent),
    Error(ErrorPayload),
    DataTable(Value),
    Scrubbed(Value),
    /// Anything this client does not consume.
    Other(String),
}

impl InboundEvent {
    pub fn from_event(name: &str, data: Value) -> Result<Self, serde_json::Error> {
        Ok(match name {
            CHAT_MESSAGE_RESPONSE => InboundEvent::ChatResponse(serde_json::from_value(data)?),
            TOOL_COMPLETE => InboundEvent::ToolComplete(ToolCompleteEvent::from_payload(data)),
            ERROR => InboundEvent::Error(serde_json::from_value(data)?),
            DATA_TABLE => InboundEvent::DataTable(data),
            SCRUBBED_MESSAGE => InboundEvent::Scrubbed(data),
            other => InboundEvent::Other(other.to_string()),
        })
    }
}

/// `chat_message_response` payload.
///
/// Every field decodes leniently so a chunk with an odd `content` or
/// `citations` value still delivers its `finish_reason`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatResponseEvent {
    #[serde(default, deserialize_with = "text_or_json")]
    pub content: String,
    #[serde(default, deserialize_with = "reason_text")]
    pub finish_reason: Option<String>,
    #[serde(default, deserialize_with = "citation_list")]
    pub citations: Vec<String>,
    #[serde(default)]
    pub usage: Option<Value>,
}

impl ChatResponseEvent {
    pub fn chunk(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn finished(content: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

fn reason_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// `mcp_tool_complete_in_content` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCompleteEvent {
    pub result_block: Value,
    /// The whole payload, when it was not an object.
    pub unstructured: Option<Value>,
}

impl ToolCompleteEvent {
    pub fn new(result_block: Value) -> Self {
        Self {
            result_block,
            unstructured: None,
        }
    }

    /// Event for whatever the service sent. Only an object carries a
    /// `result_block`; any other payload is kept whole.
    pub fn from_payload(data: Value) -> Self {
        match data {
            Value::Object(mut fields) => {
                Self::new(fields.remove("result_block").unwrap_or(Value::Null))
            }
            other => Self {
                result_block: Value::Null,
                unstructured: Some(other),
            },
        }
    }

    /// Decoded tool result.
    ///
    /// The block is normally `[header, "<json>", ...]`; a bare JSON string is
    /// also accepted. Anything else, and any non-object payload, is kept as
    /// `{"raw": ...}`.
    pub fn result(&self) -> Value {
        if let Some(payload) = &self.unstructured {
            return serde_json::json!({ "raw": payload });
        }
        let decoded = match &self.result_block {
            Value::Array(items) if items.len() > 1 => items[1]
                .as_str()
                .and_then(|s| serde_json::from_str::<Value>(s).ok()),
            Value::String(s) => serde_json::from_str::<Value>(s).ok(),
            _ => None,
        };
        decoded.unwrap_or_else(|| serde_json::json!({ "raw": self.result_block }))
    }
}

/// `error` payload: a bare string or `{code, error}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    Message(String),
    Detailed {
        #[serde(default)]
        code: Option<Value>,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    Other(Value),
}

impl ErrorPayload {
    pub fn code(&self) -> Option<i64> {
        match self {
            ErrorPayload::Detailed {
                code: Some(code), ..
            } => code
                .as_i64()
                .or_else(|| code.as_str().and_then(|s| s.trim().parse().ok())),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ErrorPayload::Message(s) => s.clone(),
            ErrorPayload::Detailed { error, message, .. } => error
                .clone()
                .or_else(|| message.clone())
                .unwrap_or_else(|| "Unknown error".to_string()),
            ErrorPayload::Other(v) => v.to_string(),
        }
    }

    /// Classify into auth, access and generic faults by the numeric code.
    pub fn into_exchange_error(self) -> ExchangeError {
        let message = self.message();
        match self.code() {
            Some(401) => ExchangeError::Auth,
            Some(400) if message.contains("not publically shared") => {
                ExchangeError::Access(message)
            }
            _ => ExchangeError::Protocol(message),
        }
    }
}

//! Request and response types for the Agent700 API.
//!
//! Payload shapes follow what the service actually sends. Optional fields
//! are an `Option` or carry a serde default, and an explicit `null` reads
//! the same as a missing key.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Lenient field decoding
// ─────────────────────────────────────────────────────────────────────────────

/// `null` decodes to the type's default.
pub(crate) fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Strings as-is, `null` as empty, anything else as its JSON text.
pub(crate) fn text_or_json<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Citations are usually a list of strings. Other entries are kept as their
/// JSON text and a lone non-list value becomes a single citation.
pub(crate) fn citation_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let as_text = |v: Value| match v {
        Value::String(s) => s,
        other => other.to_string(),
    };
    Ok(match Value::deserialize(d)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().map(as_text).collect(),
        other => vec![as_text(other)],
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `{role, content}` entry of the outbound message list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Build the message list sent with a chat request.
///
/// The list always starts with a system message (the master prompt, or an
/// empty one), followed by as much prior history as fits under
/// `max_history_chars` (newest messages win), followed by the new user
/// message.
pub fn build_messages(
    master_prompt: &str,
    history: &[ChatMessage],
    new_message: &str,
    max_history_chars: usize,
) -> Vec<ChatMessage> {
    let mut total = 0usize;
    let mut kept = Vec::new();
    for message in history.iter().rev() {
        let len = message.content.chars().count();
        if total + len >= max_history_chars {
            break;
        }
        total += len;
        kept.push(message.clone());
    }
    kept.reverse();

    let mut messages = Vec::with_capacity(kept.len() + 2);
    messages.push(ChatMessage::system(master_prompt));
    messages.extend(kept);
    messages.push(ChatMessage::user(new_message));
    messages
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

/// Login request body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token-bearing response from login and refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
}

/// Credentials obtained from a successful login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token for API calls.
    pub access_token: String,
    /// `name=value` pairs from `Set-Cookie`, replayed on token refresh.
    #[serde(default)]
    pub cookies: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Agents
// ─────────────────────────────────────────────────────────────────────────────

/// Agent record as returned by `GET /agents/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentDetail {
    #[serde(default, deserialize_with = "null_as_default")]
    pub revisions: Vec<AgentRevision>,
}

impl AgentDetail {
    /// The revision with the highest id.
    pub fn latest_revision(&self) -> Option<&AgentRevision> {
        self.revisions.iter().max_by_key(|r| r.id.unwrap_or(0))
    }
}

/// A single agent revision. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRevision {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub model: Option<String>,
    pub master_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub image_dimensions: Option<String>,
    pub top_p: Option<f64>,
    pub scrub_pii: Option<bool>,
    pub pii_threshold: Option<f64>,
    pub enable_mcp: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mcp_server_names: Vec<String>,
}

/// Operating parameters of the remote agent.
///
/// Read-only input to an exchange; passed through into the outbound
/// request untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub agent_name: String,
    pub revision_id: Option<i64>,
    pub model: String,
    pub master_prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub image_dimensions: String,
    pub top_p: f64,
    pub scrub_pii: bool,
    pub pii_threshold: f64,
    pub enable_mcp: bool,
    pub mcp_server_names: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_name: "Unknown Agent".to_string(),
            revision_id: None,
            model: "gpt-4o".to_string(),
            master_prompt: String::new(),
            temperature: 0.7,
            max_tokens: 4000,
            image_dimensions: "1024x1024".to_string(),
            top_p: 1.0,
            scrub_pii: false,
            pii_threshold: 0.5,
            enable_mcp: false,
            mcp_server_names: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// Whether tool-enablement fields go into the outbound request.
    pub fn tools_enabled(&self) -> bool {
        self.enable_mcp && !self.mcp_server_names.is_empty()
    }
}

impl From<&AgentRevision> for AgentConfig {
    fn from(rev: &AgentRevision) -> Self {
        let d = AgentConfig::default();
        Self {
            agent_name: rev.name.clone().unwrap_or(d.agent_name),
            revision_id: rev.id,
            model: rev.model.clone().unwrap_or(d.model),
            master_prompt: rev.master_prompt.clone().unwrap_or(d.master_prompt),
            temperature: rev.temperature.unwrap_or(d.temperature),
            max_tokens: rev.max_tokens.unwrap_or(d.max_tokens),
            image_dimensions: rev.image_dimensions.clone().unwrap_or(d.image_dimensions),
            top_p: rev.top_p.unwrap_or(d.top_p),
            scrub_pii: rev.scrub_pii.unwrap_or(d.scrub_pii),
            pii_threshold: rev.pii_threshold.unwrap_or(d.pii_threshold),
            enable_mcp: rev.enable_mcp.unwrap_or(d.enable_mcp),
            mcp_server_names: rev.mcp_server_names.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat
// ─────────────────────────────────────────────────────────────────────────────

/// Body of the blocking `POST /chat` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest<'a> {
    pub agent_id: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream_responses: bool,
}

/// Response of the blocking chat call.
///
/// The service has returned the reply under several keys over time, so all
/// of them are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<Value>,
    #[serde(default, deserialize_with = "citation_list")]
    pub citations: Vec<String>,
}

impl ChatResponse {
    /// Reply text, checked in the order `content`, `message`, `response`,
    /// then the last entry of `messages`.
    pub fn text(&self) -> Option<&str> {
        [&self.content, &self.message, &self.response]
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .find(|s| !s.is_empty())
            .or_else(|| {
                self.messages
                    .last()
                    .and_then(|m| m.get("content"))
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            })
    }

    /// Error reported inside a 200 response, if any.
    pub fn error_text(&self) -> Option<String> {
        match &self.error {
            None | Some(Value::Null) | Some(Value::Bool(false)) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Which transport produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    Streaming,
    Blocking,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Streaming => f.write_str("streaming"),
            TransportKind::Blocking => f.write_str("blocking"),
        }
    }
}

/// The assembled result of one successful exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentReply {
    /// Final agent text.
    pub content: String,
    /// Citations in receive order (duplicates kept).
    pub citations: Vec<String>,
    /// One entry per completed tool execution, in completion order.
    pub tool_results: Vec<Value>,
    /// Token usage reported by the service, if any.
    pub usage: Option<Value>,
    pub transport: TransportKind,
}

/// Everything needed to run one exchange over any transport.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub agent_id: String,
    /// The new user message, as typed.
    pub user_message: String,
    /// Full outbound list: system prompt, trimmed history, new message.
    pub messages: Vec<ChatMessage>,
    pub agent: AgentConfig,
}

impl ExchangeRequest {
    pub fn new(
        agent_id: impl Into<String>,
        agent: AgentConfig,
        history: &[ChatMessage],
        user_message: impl Into<String>,
        max_history_chars: usize,
    ) -> Self {
        let user_message = user_message.into();
        let messages = build_messages(
            &agent.master_prompt,
            history,
            &user_message,
            max_history_chars,
        );
        Self {
            agent_id: agent_id.into(),
            user_message,
            messages,
            agent,
        }
    }
}

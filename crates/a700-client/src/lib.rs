//! Client SDK and chat core for the Agent700 platform.
//!
//! This crate provides a typed HTTP client for the Agent700 API plus the
//! machinery for one chat exchange: history trimming, the Socket.IO
//! streaming session, inline `<tool_use>` parsing and execution, and
//! fallback to the blocking chat call.
//!
//! # Example
//!
//! ```no_run
//! use a700_client::{A700Client, ExchangeRequest, MemoryLog, SessionConfig, TransportSelector};
//! use a700_client::stream::NoopObserver;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let agent_id = "00000000-0000-0000-0000-000000000000";
//! let client = A700Client::builder()
//!     .base_url("https://api.agent700.ai")
//!     .access_token("secret")
//!     .build()?;
//!
//! let agent = client.agents().get(agent_id).await?;
//! let request = ExchangeRequest::new(agent_id, agent, &[], "Hello!", 300_000);
//!
//! let selector = TransportSelector::new(&client, true, SessionConfig::default());
//! let mut log = MemoryLog::new();
//! let reply = selector
//!     .exchange(&request, &mut log, &NoopObserver, &CancellationToken::new())
//!     .await?;
//! println!("{}", reply.content);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod conversation;
pub mod error;
pub mod fingerprint;
pub mod selector;
pub mod stream;
pub mod tools;
pub mod types;

pub use client::{A700Client, ClientBuilder};
pub use conversation::{ConversationLog, MemoryLog};
pub use error::{Error, ExchangeError, ExchangeResult, Result};
pub use selector::{BlockingTransport, ChatTransport, STREAMING_AVAILABLE, TransportSelector};
#[cfg(feature = "streaming")]
pub use selector::StreamingTransport;
pub use stream::{SessionConfig, StreamObserver};
pub use tools::{ToolCall, ToolExecutor, ToolResult, ToolRunner, parse_tool_use_blocks};
pub use types::*;

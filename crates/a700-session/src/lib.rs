//! Local state for the Agent700 CLI.
//!
//! - [`ConversationStore`]: per-agent message history, persisted after
//!   every append. Implements [`a700_client::ConversationLog`].
//! - [`SessionStore`]: the saved access token and refresh cookies.
//!
//! # Example
//!
//! ```rust,ignore
//! use a700_session::{ConversationStore, SessionStore};
//!
//! let data_dir = a700_config::default_data_dir();
//! let session = SessionStore::new(&data_dir).load_or_default();
//! let conversation = ConversationStore::open(&data_dir, "agent-id");
//! ```

mod conversation;
mod error;
mod fs;
mod store;

pub use conversation::{
    ConversationEntry, ConversationStore, ConversationSummary, Speaker, file_name_for,
};
pub use error::{Error, Result};
pub use store::{SESSION_FILE, SessionData, SessionStore};

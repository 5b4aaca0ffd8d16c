//! Per-agent conversation history on disk.
//!
//! One JSON array per agent, rewritten after every append:
//!
//! ```json
//! [
//!   {"role": "user", "content": "Hi", "timestamp": "2025-01-01T10:00:00+01:00"},
//!   {"role": "agent", "content": "Hello!", "timestamp": "2025-01-01T10:00:02+01:00"}
//! ]
//! ```

use std::path::{Path, PathBuf};

use a700_client::{ChatMessage, ConversationLog};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::fs::{remove_if_exists, write_atomic};

/// Who wrote an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
}

/// One stored message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Speaker,
    pub content: String,
    pub timestamp: DateTime<Local>,
}

impl ConversationEntry {
    fn now(role: Speaker, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            timestamp: Local::now(),
        }
    }

    pub fn to_message(&self) -> ChatMessage {
        match self.role {
            Speaker::User => ChatMessage::user(&self.content),
            Speaker::Agent => ChatMessage::assistant(&self.content),
        }
    }
}

/// Counts shown by `history show`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversationSummary {
    pub messages: usize,
    pub user_messages: usize,
    pub agent_messages: usize,
    pub characters: usize,
}

/// Append-only conversation file for one agent.
#[derive(Debug)]
pub struct ConversationStore {
    path: PathBuf,
    entries: Vec<ConversationEntry>,
}

impl ConversationStore {
    /// Open the conversation for `agent_id` under `data_dir`.
    ///
    /// A missing or unreadable file starts an empty conversation.
    pub fn open(data_dir: &Path, agent_id: &str) -> Self {
        Self::open_at(data_dir.join(file_name_for(agent_id)))
    }

    /// Open a conversation file at an explicit path.
    pub fn open_at(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match load_entries(&path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not load conversation, starting empty");
                Vec::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prior messages in request form, oldest first.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.entries.iter().map(ConversationEntry::to_message).collect()
    }

    /// Append and persist.
    pub fn append(&mut self, role: Speaker, content: &str) -> Result<()> {
        self.entries.push(ConversationEntry::now(role, content));
        self.save()
    }

    /// Forget everything and delete the file.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        remove_if_exists(&self.path)
    }

    pub fn summary(&self) -> ConversationSummary {
        let mut summary = ConversationSummary {
            messages: self.entries.len(),
            ..Default::default()
        };
        for entry in &self.entries {
            match entry.role {
                Speaker::User => summary.user_messages += 1,
                Speaker::Agent => summary.agent_messages += 1,
            }
            summary.characters += entry.content.chars().count();
        }
        summary
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.entries)?;
        write_atomic(&self.path, &json, false)
    }

    fn append_logged(&mut self, role: Speaker, content: &str) {
        if let Err(e) = self.append(role, content) {
            tracing::warn!(path = %self.path.display(), error = %e, "could not save conversation");
        }
    }
}

impl ConversationLog for ConversationStore {
    fn add_user_message(&mut self, text: &str) {
        self.append_logged(Speaker::User, text);
    }

    fn add_agent_message(&mut self, text: &str) {
        self.append_logged(Speaker::Agent, text);
    }
}

/// `conversation_<first 8 hex of sha256(agent id)>.json`
pub fn file_name_for(agent_id: &str) -> String {
    let digest = hex::encode(Sha256::digest(agent_id.as_bytes()));
    format!("conversation_{}.json", &digest[..8])
}

fn load_entries(path: &Path) -> Result<Vec<ConversationEntry>> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io("failed to read", path, e)),
    };
    serde_json::from_slice(&data).map_err(|source| Error::Corrupt {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const AGENT: &str = "6f1c2a34-0b7e-4c55-9d0e-2f3a4b5c6d7e";

    #[test]
    fn test_file_name_is_stable_per_agent() {
        let a = file_name_for(AGENT);
        assert_eq!(a, file_name_for(AGENT));
        assert_ne!(a, file_name_for("another-agent"));
        assert!(a.starts_with("conversation_") && a.ends_with(".json"));
        assert_eq!(a.len(), "conversation_".len() + 8 + ".json".len());
    }

    #[test]
    fn test_append_persists_immediately() {
        let dir = TempDir::new().unwrap();
        let mut store = ConversationStore::open(dir.path(), AGENT);
        store.add_user_message("Hi");
        store.add_agent_message("Hello!");

        let reopened = ConversationStore::open(dir.path(), AGENT);
        assert_eq!(
            reopened.history(),
            vec![ChatMessage::user("Hi"), ChatMessage::assistant("Hello!")]
        );

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw[1]["role"], "agent");
        assert!(raw[0]["timestamp"].is_string());
    }

    #[test]
    fn test_conversations_are_separate_per_agent() {
        let dir = TempDir::new().unwrap();
        ConversationStore::open(dir.path(), AGENT).add_user_message("for agent one");

        let other = ConversationStore::open(dir.path(), "other");
        assert!(other.is_empty());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conversation.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut store = ConversationStore::open_at(&path);
        assert!(store.is_empty());

        store.append(Speaker::User, "fresh").unwrap();
        assert_eq!(ConversationStore::open_at(&path).entries().len(), 1);
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let mut store = ConversationStore::open(dir.path(), AGENT);
        store.append(Speaker::User, "x").unwrap();
        assert!(store.path().exists());

        store.clear().unwrap();
        assert!(store.is_empty());
        assert!(!store.path().exists());
        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[test]
    fn test_summary() {
        let dir = TempDir::new().unwrap();
        let mut store = ConversationStore::open(dir.path(), AGENT);
        store.append(Speaker::User, "héllo").unwrap();
        store.append(Speaker::Agent, "hi").unwrap();
        store.append(Speaker::User, "bye").unwrap();

        assert_eq!(
            store.summary(),
            ConversationSummary {
                messages: 3,
                user_messages: 2,
                agent_messages: 1,
                characters: 10,
            }
        );
    }

    #[test]
    fn test_creates_missing_data_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let mut store = ConversationStore::open(&nested, AGENT);
        store.append(Speaker::User, "deep").unwrap();
        assert!(store.path().exists());
    }
}

//! Conversation log seam.
//!
//! An exchange appends the user's message and the final agent text exactly
//! once each, no matter how many events or tool rounds it took.

use crate::types::{ChatMessage, Role};

/// Append-only record of a conversation.
///
/// Appends are fire-and-forget: implementations persist immediately and
/// report their own failures.
pub trait ConversationLog: Send {
    fn add_user_message(&mut self, text: &str);
    fn add_agent_message(&mut self, text: &str);
}

/// In-memory log, for tests and one-shot runs that keep no history.
#[derive(Debug, Default)]
pub struct MemoryLog {
    messages: Vec<ChatMessage>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl ConversationLog for MemoryLog {
    fn add_user_message(&mut self, text: &str) {
        self.messages.push(ChatMessage::new(Role::User, text));
    }

    fn add_agent_message(&mut self, text: &str) {
        self.messages.push(ChatMessage::new(Role::Assistant, text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_appends_in_order() {
        let mut log = MemoryLog::new();
        assert!(log.is_empty());
        log.add_user_message("hi");
        log.add_agent_message("hello");
        assert_eq!(
            log.messages(),
            &[ChatMessage::user("hi"), ChatMessage::assistant("hello")]
        );
    }
}

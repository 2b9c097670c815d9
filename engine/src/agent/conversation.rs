//! Conversation Memory
//!
//! Per-session message log. The log always starts with exactly one system
//! message and keeps at most `max_turn_messages` messages after it; trimming
//! drops the oldest turn messages and never touches index 0.

use sdk::HistoryEntry;

use crate::llm::Message;

#[derive(Debug, Clone)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    max_turn_messages: usize,
}

impl ConversationMemory {
    /// Create a memory holding only the system prompt
    pub fn new(system_prompt: impl Into<String>, max_turn_messages: usize) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
            max_turn_messages,
        }
    }

    /// Append a message, trimming the oldest turn messages past the cap
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);

        let cap = 1 + self.max_turn_messages;
        if self.messages.len() > cap {
            let excess = self.messages.len() - cap;
            self.messages.drain(1..1 + excess);
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Turn messages as history entries, system prompt excluded
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.messages
            .iter()
            .skip(1)
            .map(|m| HistoryEntry {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    /// The system prompt at index 0
    pub fn system_prompt(&self) -> &Message {
        &self.messages[0]
    }
}

//! Append-only conversation log for one call.

use voxcart_core::types::{ConversationEntry, Role};

#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    entries: Vec<ConversationEntry>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.entries.push(ConversationEntry::new(role, content));
    }

    /// The last `n` entries with `role`, oldest first.
    pub fn recent(&self, role: Role, n: usize) -> Vec<ConversationEntry> {
        let mut recent: Vec<ConversationEntry> = self
            .entries
            .iter()
            .rev()
            .filter(|e| e.role == role)
            .take(n)
            .cloned()
            .collect();
        recent.reverse();
        recent
    }

    pub fn snapshot(&self) -> Vec<ConversationEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

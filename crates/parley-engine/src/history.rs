//! Bounded per-call dialogue history.

use std::collections::VecDeque;

use parley_core::{ChatMessage, Turn};

/// Ten user/assistant exchanges.
pub const DEFAULT_MAX_TURNS: usize = 20;

/// Chronological, length-bounded dialogue for one call.
///
/// The system directive is not stored here; it is prepended by
/// [`ConversationHistory::as_messages`] and never counts against the cap.
#[derive(Clone, Debug)]
pub struct ConversationHistory {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl ConversationHistory {
    pub fn new(max_turns: usize) -> Self {
        let max_turns = max_turns.max(1);
        Self {
            turns: VecDeque::with_capacity(max_turns + 1),
            max_turns,
        }
    }

    /// Append a turn, then drop the oldest turns until the cap holds.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    /// System directive followed by the capped history.
    pub fn as_messages(&self, system_directive: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        messages.push(ChatMessage::system(system_directive));
        messages.extend(self.turns.iter().map(ChatMessage::from));
        messages
    }

    /// Messages as they would read after appending `pending`, without
    /// mutating the history.
    pub fn as_messages_with(&self, system_directive: &str, pending: &Turn) -> Vec<ChatMessage> {
        let overflow = (self.turns.len() + 1).saturating_sub(self.max_turns);
        let mut messages = Vec::with_capacity(self.turns.len() + 2);
        messages.push(ChatMessage::system(system_directive));
        messages.extend(self.turns.iter().skip(overflow).map(ChatMessage::from));
        messages.push(ChatMessage::from(pending));
        messages
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }
}

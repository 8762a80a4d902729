//! Bounded per-conversation memory.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

use crate::base::types::Turn;

#[derive(Default)]
struct MemoryInner {
    turns: HashMap<String, VecDeque<Turn>>,
    /// Conversations from least to most recently active.
    recency: VecDeque<String>,
}

/// Remembers the last few exchanges per conversation.
///
/// A conversation is one user in one channel (see [`ConversationMemory::key`]),
/// so a direct message never leaks into a public channel. Holds at most
/// `max_turns` turns per conversation (oldest dropped first) and at most
/// `max_users` conversations (least recently active dropped first). A zero cap
/// disables memory. Trivially cloneable; clones share state.
#[derive(Clone)]
pub struct ConversationMemory {
    inner: Arc<Mutex<MemoryInner>>,
    max_turns: usize,
    max_users: usize,
}

impl ConversationMemory {
    pub fn new(max_turns: usize, max_users: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner::default())),
            max_turns,
            max_users,
        }
    }

    /// Conversation key for `user` speaking in `channel`.
    pub fn key(channel: &str, user: &str) -> String {
        format!("{channel}:{user}")
    }

    fn is_enabled(&self) -> bool {
        self.max_turns > 0 && self.max_users > 0
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Prior turns of `conversation`, oldest first.
    pub fn history(&self, conversation: &str) -> Vec<Turn> {
        if !self.is_enabled() {
            return Vec::new();
        }

        self.lock().turns.get(conversation).map(|turns| turns.iter().cloned().collect()).unwrap_or_default()
    }

    /// Append a turn to `conversation`.
    pub fn record(&self, conversation: &str, turn: Turn) {
        if !self.is_enabled() {
            return;
        }

        let mut inner = self.lock();

        let turns = inner.turns.entry(conversation.to_string()).or_default();
        turns.push_back(turn);
        while turns.len() > self.max_turns {
            turns.pop_front();
        }

        inner.recency.retain(|c| c != conversation);
        inner.recency.push_back(conversation.to_string());

        while inner.recency.len() > self.max_users {
            if let Some(evicted) = inner.recency.pop_front() {
                inner.turns.remove(&evicted);
            }
        }
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(n: usize) -> Turn {
        Turn {
            user: format!("q{n}"),
            assistant: format!("a{n}"),
        }
    }

    #[test]
    fn test_oldest_turns_are_dropped() {
        let memory = ConversationMemory::new(2, 10);

        for n in 0..3 {
            memory.record("U1", turn(n));
        }

        assert_eq!(memory.history("U1"), vec![turn(1), turn(2)]);
    }

    #[test]
    fn test_least_recent_conversation_is_evicted() {
        let memory = ConversationMemory::new(5, 2);

        memory.record("U1", turn(0));
        memory.record("U2", turn(1));
        memory.record("U1", turn(2));
        memory.record("U3", turn(3));

        assert_eq!(memory.history("U1"), vec![turn(0), turn(2)]);
        assert!(memory.history("U2").is_empty());
        assert_eq!(memory.history("U3"), vec![turn(3)]);
    }

    #[test]
    fn test_zero_turns_disables() {
        let memory = ConversationMemory::new(0, 10);

        memory.record("U1", turn(0));

        assert!(memory.history("U1").is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let memory = ConversationMemory::new(3, 3);
        let clone = memory.clone();

        clone.record("U1", turn(0));

        assert_eq!(memory.history("U1"), vec![turn(0)]);
    }

    #[test]
    fn test_same_user_in_two_channels_is_two_conversations() {
        let memory = ConversationMemory::new(5, 5);

        memory.record(&ConversationMemory::key("D1", "U1"), turn(0));

        assert_eq!(memory.history(&ConversationMemory::key("D1", "U1")), vec![turn(0)]);
        assert!(memory.history(&ConversationMemory::key("C1", "U1")).is_empty());
    }
}

//! Bounded chat buffers: one global channel plus one per team.

use shared::{ChatMessage, ChatUser, CHAT_CAPACITY, CHAT_MAX_LEN, TEAM_COUNT};
use std::collections::VecDeque;

/// Append-only message buffers with FIFO eviction at capacity. Message ids
/// are a single monotonic counter shared across channels.
pub struct ChatRelay {
    general: VecDeque<ChatMessage>,
    team: [VecDeque<ChatMessage>; TEAM_COUNT],
    next_id: u64,
}

impl ChatRelay {
    pub fn new() -> Self {
        Self {
            general: VecDeque::new(),
            team: Default::default(),
            next_id: 1,
        }
    }

    /// Trims and bounds raw input; empty-after-trim messages are dropped.
    fn sanitize(text: &str) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.chars().take(CHAT_MAX_LEN).collect())
    }

    fn stamp(&mut self, user: ChatUser, text: String, now: u64) -> ChatMessage {
        let id = self.next_id;
        self.next_id += 1;
        ChatMessage {
            id,
            user,
            text,
            created_at: now,
        }
    }

    fn push(buffer: &mut VecDeque<ChatMessage>, message: ChatMessage) {
        if buffer.len() >= CHAT_CAPACITY {
            buffer.pop_front();
        }
        buffer.push_back(message);
    }

    /// Appends to the global channel. Returns the stamped message to
    /// broadcast, or `None` if the text was empty after trimming.
    pub fn post_general(&mut self, user: ChatUser, text: &str, now: u64) -> Option<ChatMessage> {
        let text = Self::sanitize(text)?;
        let message = self.stamp(user, text, now);
        Self::push(&mut self.general, message.clone());
        Some(message)
    }

    /// Appends to one team's channel.
    pub fn post_team(
        &mut self,
        team_index: u8,
        user: ChatUser,
        text: &str,
        now: u64,
    ) -> Option<ChatMessage> {
        if usize::from(team_index) >= TEAM_COUNT {
            return None;
        }
        let text = Self::sanitize(text)?;
        let message = self.stamp(user, text, now);
        Self::push(&mut self.team[usize::from(team_index)], message.clone());
        Some(message)
    }

    pub fn general_history(&self) -> Vec<ChatMessage> {
        self.general.iter().cloned().collect()
    }

    pub fn team_history(&self, team_index: u8) -> Vec<ChatMessage> {
        self.team
            .get(usize::from(team_index))
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for ChatRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> ChatUser {
        ChatUser {
            id: format!("uid-{}", name),
            name: name.to_string(),
            team: "Blue".to_string(),
        }
    }

    #[test]
    fn test_post_stamps_id_and_timestamp() {
        let mut relay = ChatRelay::new();

        let first = relay.post_general(user("a"), "hello", 100).unwrap();
        let second = relay.post_general(user("b"), "world", 200).unwrap();

        assert_eq!(first.text, "hello");
        assert_eq!(first.created_at, 100);
        assert!(second.id > first.id);
        assert_eq!(relay.general_history().len(), 2);
    }

    #[test]
    fn test_whitespace_only_is_dropped() {
        let mut relay = ChatRelay::new();

        assert!(relay.post_general(user("a"), "", 0).is_none());
        assert!(relay.post_general(user("a"), "   \t\n", 0).is_none());
        assert!(relay.general_history().is_empty());
    }

    #[test]
    fn test_text_is_trimmed_and_truncated() {
        let mut relay = ChatRelay::new();

        let message = relay.post_general(user("a"), "  hi there  ", 0).unwrap();
        assert_eq!(message.text, "hi there");

        let long = "x".repeat(CHAT_MAX_LEN * 2);
        let message = relay.post_general(user("a"), &long, 0).unwrap();
        assert_eq!(message.text.chars().count(), CHAT_MAX_LEN);
    }

    #[test]
    fn test_truncation_counts_chars_not_bytes() {
        let mut relay = ChatRelay::new();

        let long = "ä".repeat(CHAT_MAX_LEN + 50);
        let message = relay.post_general(user("a"), &long, 0).unwrap();
        assert_eq!(message.text.chars().count(), CHAT_MAX_LEN);
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let mut relay = ChatRelay::new();

        for i in 0..CHAT_CAPACITY + 10 {
            relay
                .post_general(user("a"), &format!("msg {}", i), i as u64)
                .unwrap();
        }

        let history = relay.general_history();
        assert_eq!(history.len(), CHAT_CAPACITY);
        assert_eq!(history[0].text, "msg 10");
        assert_eq!(history[CHAT_CAPACITY - 1].text, format!("msg {}", CHAT_CAPACITY + 9));
    }

    #[test]
    fn test_team_channels_are_separate() {
        let mut relay = ChatRelay::new();

        relay.post_team(0, user("a"), "blue only", 0).unwrap();
        relay.post_team(2, user("b"), "red only", 0).unwrap();
        relay.post_general(user("c"), "everyone", 0).unwrap();

        assert_eq!(relay.team_history(0).len(), 1);
        assert_eq!(relay.team_history(0)[0].text, "blue only");
        assert_eq!(relay.team_history(2).len(), 1);
        assert!(relay.team_history(1).is_empty());
        assert_eq!(relay.general_history().len(), 1);
    }

    #[test]
    fn test_invalid_team_index_rejected() {
        let mut relay = ChatRelay::new();

        assert!(relay.post_team(TEAM_COUNT as u8, user("a"), "hi", 0).is_none());
        assert!(relay.team_history(TEAM_COUNT as u8).is_empty());
    }
}
